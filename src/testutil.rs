// Fixtures shared by unit tests.

use std::rc::Rc;
use std::sync::Arc;

use tempfile::TempDir;

use crate::buffer::{clocksweep::ClockSweepManager, manager::BufferPoolManager};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::storage::{
    entity::{TableId, TransactionId},
    heap::HeapFile,
};
use crate::tuple::{
    desc::TupleDesc,
    field::{Field, Type},
    Tuple,
};

pub(crate) fn int_desc(names: &[&str]) -> TupleDesc {
    TupleDesc::named(names.iter().map(|&n| (Type::Int, n))).unwrap()
}

pub(crate) fn int_tuple(desc: &Arc<TupleDesc>, values: &[i32]) -> Tuple {
    Tuple::new(
        Arc::clone(desc),
        values.iter().map(|&v| Field::Int(v)).collect(),
    )
}

/// Integer columns of each tuple, in order.
pub(crate) fn values(tuples: &[Tuple]) -> Vec<Vec<i32>> {
    tuples
        .iter()
        .map(|t| t.fields().iter().map(|f| f.as_int().unwrap()).collect())
        .collect()
}

pub(crate) struct TestDb {
    pub dir: TempDir,
    pub config: Config,
    pub catalog: Rc<Catalog>,
    pub bufmgr: ClockSweepManager,
}

impl TestDb {
    pub fn new(config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Rc::new(Catalog::new());
        let bufmgr = ClockSweepManager::new(Rc::clone(&catalog), config.pool_size);
        Self {
            dir,
            config,
            catalog,
            bufmgr,
        }
    }

    pub fn create_table(&mut self, name: &str, desc: TupleDesc) -> Rc<HeapFile> {
        let path = self.dir.path().join(format!("{}.dat", name));
        let file = Rc::new(HeapFile::open(path, desc, self.config.page_size).unwrap());
        self.catalog.add_table(Rc::clone(&file), name, None);
        file
    }

    pub fn insert_rows(&mut self, table_id: TableId, rows: &[Vec<i32>]) {
        let desc = self.catalog.tuple_desc(table_id).unwrap();
        let tid = TransactionId::new();
        for row in rows {
            self.bufmgr
                .insert_tuple(tid, table_id, int_tuple(&desc, row))
                .unwrap();
        }
    }

    /// Every stored tuple of `file`, with record ids.
    pub fn scan(&mut self, file: &Rc<HeapFile>) -> Vec<Tuple> {
        if file.num_pages().unwrap() == 0 {
            return vec![];
        }
        let mut iter = Rc::clone(file).iterator(TransactionId::new());
        iter.open().unwrap();
        let mut out = vec![];
        while iter.has_next(&mut self.bufmgr).unwrap() {
            out.push(iter.next(&mut self.bufmgr).unwrap());
        }
        out
    }
}
