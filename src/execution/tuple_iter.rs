use std::sync::Arc;
use std::vec;

use super::operator::{Lookahead, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{desc::TupleDesc, Tuple};

/// Replays a fixed list of tuples.
#[derive(Debug)]
pub struct TupleIterator {
    desc: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    cursor: vec::IntoIter<Tuple>,
    lookahead: Lookahead,
}

impl TupleIterator {
    pub fn new(desc: Arc<TupleDesc>, tuples: Vec<Tuple>) -> Self {
        debug_assert!(tuples.iter().all(|t| **t.desc() == *desc));
        Self {
            desc,
            tuples,
            cursor: Vec::new().into_iter(),
            lookahead: Lookahead::default(),
        }
    }
}

impl Operator for TupleIterator {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.cursor = self.tuples.clone().into_iter();
        Ok(())
    }

    fn close_operator(&mut self) {
        self.cursor = Vec::new().into_iter();
    }

    fn rewind_operator(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.open_operator(bufmgr)
    }

    fn fetch_next(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        Ok(self.cursor.next())
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
