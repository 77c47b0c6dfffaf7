use std::sync::Arc;

use tracing::debug;

use super::error::Error;
use super::operator::{BoxOpIterator, Lookahead, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::catalog::Catalog;
use crate::storage::entity::{TableId, TransactionId};
use crate::tuple::{
    desc::TupleDesc,
    field::{Field, Type},
    Tuple,
};

/// Single `INT` column holding the number of affected tuples.
pub(super) fn count_desc() -> Result<Arc<TupleDesc>> {
    Ok(Arc::new(TupleDesc::anonymous(vec![Type::Int])?))
}

pub(super) fn count_tuple(
    desc: &Arc<TupleDesc>,
    op: &'static str,
    count: usize,
) -> Result<Tuple> {
    let value = i32::try_from(count).map_err(|_| Error::CountOverflow { op, count })?;
    Ok(Tuple::new(Arc::clone(desc), vec![Field::Int(value)]))
}

/// Inserts every child tuple into a table through the page cache, then emits
/// one tuple with the number of rows inserted.
pub struct Insert {
    tid: TransactionId,
    child: BoxOpIterator,
    table_id: TableId,
    table_desc: Arc<TupleDesc>,
    desc: Arc<TupleDesc>,
    count: usize,
    emitted: bool,
    lookahead: Lookahead,
}

impl Insert {
    pub fn new(
        tid: TransactionId,
        catalog: &Catalog,
        child: BoxOpIterator,
        table_id: TableId,
    ) -> Result<Self> {
        let table_desc = catalog.tuple_desc(table_id)?;
        if **child.tuple_desc() != *table_desc {
            return Err(Error::SchemaMismatch {
                expected: table_desc.to_string(),
                found: child.tuple_desc().to_string(),
            });
        }
        Ok(Self {
            tid,
            child,
            table_id,
            table_desc,
            desc: count_desc()?,
            count: 0,
            emitted: false,
            lookahead: Lookahead::default(),
        })
    }

    /// Rows inserted by the current pass, including a pass cut short by a
    /// storage failure.
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

impl Operator for Insert {
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
            let mut tuple = self.child.next(bufmgr)?.with_desc(Arc::clone(&self.table_desc));
            tuple.set_record_id(None);
            if let Err(source) = bufmgr.insert_tuple(self.tid, self.table_id, tuple) {
                self.emitted = true;
                return Err(Error::Mutation {
                    op: "insert",
                    count: self.count,
                    source,
                });
            }
            self.count += 1;
        }
        debug!(table = %self.table_id, count = self.count, "insert finished");
        self.emitted = true;
        count_tuple(&self.desc, "insert", self.count).map(Some)
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}
