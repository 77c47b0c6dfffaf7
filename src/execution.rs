// Volcano-style operators over heap files
pub mod aggregate;
pub mod delete;
pub mod error;
pub mod filter;
pub mod insert;
pub mod join;
pub mod operator;
pub mod predicate;
pub mod project;
pub mod seq_scan;
pub mod tuple_iter;

pub use error::Error;
pub use operator::{BoxOpIterator, OpIterator, Operator};
