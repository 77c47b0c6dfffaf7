use std::sync::Arc;

use super::operator::{BoxOpIterator, Lookahead, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::tuple::{desc::TupleDesc, Tuple};

/// Emits the listed child fields, in list order.
pub struct Project {
    fields: Vec<usize>,
    child: BoxOpIterator,
    desc: Arc<TupleDesc>,
    lookahead: Lookahead,
}

impl Project {
    pub fn new(fields: Vec<usize>, child: BoxOpIterator) -> Result<Self> {
        let child_desc = child.tuple_desc();
        let mut types = Vec::with_capacity(fields.len());
        let mut names = Vec::with_capacity(fields.len());
        for &i in &fields {
            types.push(child_desc.field_type(i)?);
            names.push(child_desc.field_name(i)?.map(str::to_owned));
        }
        Ok(Self {
            fields,
            child,
            desc: Arc::new(TupleDesc::new(types, names)?),
            lookahead: Lookahead::default(),
        })
    }
}

impl Operator for Project {
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
        if !self.child.has_next(bufmgr)? {
            return Ok(None);
        }
        let tuple = self.child.next(bufmgr)?;
        let fields = self
            .fields
            .iter()
            .map(|&i| tuple.fields()[i].clone())
            .collect();
        Ok(Some(Tuple::new(Arc::clone(&self.desc), fields)))
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
