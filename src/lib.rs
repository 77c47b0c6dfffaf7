pub mod buffer;
pub mod catalog;
pub mod config;
pub mod execution;
pub mod storage;
pub mod tuple;

#[cfg(test)]
mod testutil;
