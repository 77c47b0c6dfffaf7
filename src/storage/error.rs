use std::io;

use thiserror::Error;

use super::entity::{HeapPageId, TableId};
use crate::tuple::RecordId;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("page {0} is outside its heap file")]
    InvalidPageReference(HeapPageId),
    #[error("tuple desc mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
    #[error("page {0} has no empty slot")]
    PageFull(HeapPageId),
    #[error("record {0:?} is not on page {1}")]
    NotOnPage(RecordId, HeapPageId),
    #[error("slot {slot} of page {page_id} is already empty")]
    SlotEmpty { page_id: HeapPageId, slot: usize },
    #[error("tuple has no record id")]
    MissingRecordId,
    #[error("page {0} is corrupt")]
    Corrupt(HeapPageId),
    #[error("page size {page_size} cannot hold a {tuple_size}-byte tuple")]
    PageTooSmall { page_size: usize, tuple_size: usize },
    #[error("heap file has no pages")]
    EmptyFile,
    #[error("no free buffer available in buffer pool")]
    NoFreeBuffer,
    #[error("no table with id {0}")]
    UnknownTable(TableId),
    #[error("iterator is not open")]
    IllegalState,
    #[error("no more tuples")]
    NoSuchElement,
}
