//! The pull-based iterator protocol shared by every operator.
//!
//! An operator is closed until `open` is called. While open, `has_next`
//! peeks without consuming and `next` hands out tuples one at a time.
//! `rewind` restarts an open operator from its first tuple, re-running
//! whatever setup `open` performs. `close` may be called at any point.
//! Opening an operator that is already open closes it first, so it starts
//! over like a fresh instance.
//!
//! Concrete operators implement [`Operator`], which only asks for "the next
//! tuple or nothing"; the blanket [`OpIterator`] impl layers the lifecycle
//! checks and one-tuple lookahead on top.

use std::sync::Arc;

use super::error::Error;
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{desc::TupleDesc, Tuple};

pub type Result<T> = std::result::Result<T, Error>;

pub type BoxOpIterator = Box<dyn OpIterator>;

pub trait OpIterator {
    fn open(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()>;
    fn has_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<bool>;
    fn next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Tuple>;
    fn rewind(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()>;
    fn close(&mut self);
    fn tuple_desc(&self) -> &Arc<TupleDesc>;
}

/// Open flag plus the tuple fetched ahead by `has_next`.
#[derive(Debug, Default)]
pub struct Lookahead {
    opened: bool,
    next: Option<Tuple>,
}

impl Lookahead {
    pub fn is_open(&self) -> bool {
        self.opened
    }

    fn open(&mut self) {
        self.opened = true;
        self.next = None;
    }

    fn close(&mut self) {
        self.opened = false;
        self.next = None;
    }

    fn check_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(Error::IllegalState)
        }
    }
}

pub trait Operator {
    fn lookahead(&mut self) -> &mut Lookahead;

    /// Opens children and resets operator-local state.
    fn open_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()>;

    /// Closes children and drops operator-local state.
    fn close_operator(&mut self);

    /// Restarts from the first tuple. Must redo everything `open_operator`
    /// computes.
    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()>;

    /// The next output tuple, or `None` once exhausted.
    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>>;

    fn desc(&self) -> &Arc<TupleDesc>;
}

impl<O: Operator> OpIterator for O {
    fn open(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        if self.lookahead().is_open() {
            self.close();
        }
        self.open_operator(bufmgr)?;
        self.lookahead().open();
        Ok(())
    }

    fn has_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<bool> {
        self.lookahead().check_open()?;
        if self.lookahead().next.is_none() {
            let next = self.fetch_next(bufmgr)?;
            self.lookahead().next = next;
        }
        Ok(self.lookahead().next.is_some())
    }

    fn next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Tuple> {
        if !self.has_next(bufmgr)? {
            return Err(Error::NoSuchElement);
        }
        self.lookahead().next.take().ok_or(Error::NoSuchElement)
    }

    fn rewind(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.lookahead().check_open()?;
        self.rewind_operator(bufmgr)?;
        self.lookahead().next = None;
        Ok(())
    }

    fn close(&mut self) {
        self.close_operator();
        self.lookahead().close();
    }

    fn tuple_desc(&self) -> &Arc<TupleDesc> {
        self.desc()
    }
}

/// Pulls every remaining tuple out of an open iterator.
pub fn collect(
    iter: &mut dyn OpIterator,
    bufmgr: &mut dyn BufferPoolManager,
) -> Result<Vec<Tuple>> {
    let mut out = vec![];
    while iter.has_next(bufmgr)? {
        out.push(iter.next(bufmgr)?);
    }
    Ok(out)
}
