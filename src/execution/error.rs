use thiserror::Error;

use super::aggregate::AggOp;
use crate::storage;
use crate::tuple::desc;

#[derive(Debug, Error)]
pub enum Error {
    #[error("operator is not open")]
    IllegalState,
    #[error("no more tuples")]
    NoSuchElement,
    #[error("tuple desc mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
    #[error(transparent)]
    Storage(#[from] storage::Error),
    #[error("{op} failed after {count} tuples")]
    Mutation {
        op: &'static str,
        count: usize,
        #[source]
        source: storage::Error,
    },
    #[error("{0} is not supported by this aggregator")]
    UnsupportedAggregate(AggOp),
    #[error("{op} count {count} does not fit an INT")]
    CountOverflow { op: &'static str, count: usize },
    #[error("{0} of an empty input is undefined")]
    EmptyAggregate(AggOp),
    #[error("{0} overflowed")]
    AggregateOverflow(AggOp),
    #[error(transparent)]
    Desc(#[from] desc::Error),
}
