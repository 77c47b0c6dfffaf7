use std::sync::Arc;

use super::operator::{BoxOpIterator, Lookahead, Operator, Result};
use super::predicate::Predicate;
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{desc::TupleDesc, Tuple};

/// Passes through the child tuples the predicate accepts.
pub struct Filter {
    predicate: Predicate,
    child: BoxOpIterator,
    lookahead: Lookahead,
}

impl Filter {
    pub fn new(predicate: Predicate, child: BoxOpIterator) -> Self {
        Self {
            predicate,
            child,
            lookahead: Lookahead::default(),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn children(&self) -> [&BoxOpIterator; 1] {
        [&self.child]
    }

    pub fn set_children(&mut self, child: BoxOpIterator) {
        self.child = child;
    }
}

impl Operator for Filter {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.open(bufmgr)
    }

    fn close_operator(&mut self) {
        self.child.close();
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.child.rewind(bufmgr)
    }

    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        while self.child.has_next(bufmgr)? {
            let tuple = self.child.next(bufmgr)?;
            if self.predicate.filter(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        self.child.tuple_desc()
    }
}
