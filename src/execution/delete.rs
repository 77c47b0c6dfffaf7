use std::sync::Arc;

use tracing::debug;

use super::error::Error;
use super::insert::{count_desc, count_tuple};
use super::operator::{BoxOpIterator, Lookahead, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::storage::entity::TransactionId;
use crate::tuple::{desc::TupleDesc, Tuple};

/// Deletes every child tuple from the table its record id points into, then
/// emits one tuple with the number of rows deleted.
pub struct Delete {
    tid: TransactionId,
    child: BoxOpIterator,
    desc: Arc<TupleDesc>,
    count: usize,
    emitted: bool,
    lookahead: Lookahead,
}

impl Delete {
    pub fn new(tid: TransactionId, child: BoxOpIterator) -> Result<Self> {
        Ok(Self {
            tid,
            child,
            desc: count_desc()?,
            count: 0,
            emitted: false,
            lookahead: Lookahead::default(),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn children(&self) -> [&BoxOpIterator; 1] {
        [&self.child]
    }

    pub fn set_children(&mut self, child: BoxOpIterator) {
        self.child = child;
    }
}

impl Operator for Delete {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.open(bufmgr)?;
        self.count = 0;
        self.emitted = false;
        Ok(())
    }

    fn close_operator(&mut self) {
        self.child.close();
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.rewind(bufmgr)?;
        self.count = 0;
        self.emitted = false;
        Ok(())
    }

    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        if self.emitted {
            return Ok(None);
        }
        while self.child.has_next(bufmgr)? {
            let tuple = self.child.next(bufmgr)?;
            if let Err(source) = bufmgr.delete_tuple(self.tid, &tuple) {
                self.emitted = true;
                return Err(Error::Mutation {
                    op: "delete",
                    count: self.count,
                    source,
                });
            }
            self.count += 1;
        }
        debug!(count = self.count, "delete finished");
        self.emitted = true;
        count_tuple(&self.desc, "delete", self.count).map(Some)
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
