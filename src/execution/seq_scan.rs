use std::rc::Rc;
use std::sync::Arc;

use super::operator::{Lookahead, Operator, Result};
use crate::buffer::manager::BufferPoolManager;
use crate::catalog::Catalog;
use crate::storage::{
    entity::{TableId, TransactionId},
    heap::HeapFileIterator,
};
use crate::tuple::{desc::TupleDesc, Tuple};

/// Reads every tuple of one table, in page and slot order.
///
/// Output fields are renamed `alias.field`; an unset alias or field name
/// renders as `null`.
#[derive(Debug)]
pub struct SeqScan {
    tid: TransactionId,
    table_id: TableId,
    table_name: String,
    alias: Option<String>,
    desc: Arc<TupleDesc>,
    iter: HeapFileIterator,
    lookahead: Lookahead,
}

impl SeqScan {
    pub fn new(
        tid: TransactionId,
        catalog: &Catalog,
        table_id: TableId,
        alias: Option<&str>,
    ) -> Result<Self> {
        let file = catalog.database_file(table_id)?;
        let table_name = catalog.table_name(table_id)?;
        Ok(Self {
            tid,
            table_id,
            table_name,
            alias: alias.map(str::to_owned),
            desc: Arc::new(file.desc().with_prefix(alias)),
            iter: file.iterator(tid),
            lookahead: Lookahead::default(),
        })
    }

    /// Scan aliased by the table's own name.
    pub fn with_table_name(tid: TransactionId, catalog: &Catalog, table_id: TableId) -> Result<Self> {
        let name = catalog.table_name(table_id)?;
        Self::new(tid, catalog, table_id, Some(&name))
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Points this scan at another table. The scan is left closed.
    pub fn reset(&mut self, catalog: &Catalog, table_id: TableId, alias: Option<&str>) -> Result<()> {
        let file = catalog.database_file(table_id)?;
        self.iter.close();
        self.lookahead = Lookahead::default();
        self.table_name = catalog.table_name(table_id)?;
        self.table_id = table_id;
        self.alias = alias.map(str::to_owned);
        self.desc = Arc::new(file.desc().with_prefix(alias));
        self.iter = Rc::clone(&file).iterator(self.tid);
        Ok(())
    }
}

impl Operator for SeqScan {
    fn lookahead(&mut self) -> &mut Lookahead {
        &mut self.lookahead
    }

    fn open_operator(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.iter.open()?;
        Ok(())
    }

    fn close_operator(&mut self) {
        self.iter.close();
    }

    fn rewind_operator(&mut self, _bufmgr: &mut dyn BufferPoolManager) -> Result<()> {
        self.iter.rewind()?;
        Ok(())
    }

    fn fetch_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Tuple>> {
        if !self.iter.has_next(bufmgr)? {
            return Ok(None);
        }
        let tuple = self.iter.next(bufmgr)?;
        Ok(Some(tuple.with_desc(Arc::clone(&self.desc))))
    }

    fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::execution::error::Error;
    use crate::execution::operator::{collect, OpIterator};
    use crate::storage;
    use crate::testutil::{values, TestDb};
    use crate::tuple::field::Type;

    fn setup() -> (TestDb, TableId) {
        let mut db = TestDb::new(Config::default().with_page_size(26));
        let desc = TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("id".to_owned()), None],
        )
        .unwrap();
        let file = db.create_table("people", desc);
        let rows: Vec<Vec<i32>> = (0..7).map(|i| vec![i, i * i]).collect();
        db.insert_rows(file.id(), &rows);
        (db, file.id())
    }

    #[test]
    fn scans_all_rows_with_aliased_names() {
        let (mut db, id) = setup();
        let mut scan = SeqScan::new(TransactionId::new(), &db.catalog, id, Some("p")).unwrap();
        assert_eq!(scan.tuple_desc().field_name(0).unwrap(), Some("p.id"));
        assert_eq!(scan.tuple_desc().field_name(1).unwrap(), Some("p.null"));
        assert_eq!(scan.table_name(), "people");
        assert_eq!(scan.alias(), Some("p"));

        scan.open(&mut db.bufmgr).unwrap();
        let rows = collect(&mut scan, &mut db.bufmgr).unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[3].fields()[1].as_int(), Some(9));
        assert!(rows.iter().all(|t| t.record_id().is_some()));
        assert_eq!(
            rows[0].desc().field_name(0).unwrap(),
            Some("p.id")
        );
    }

    #[test]
    fn default_alias_is_table_name() {
        let (db, id) = setup();
        let scan = SeqScan::with_table_name(TransactionId::new(), &db.catalog, id).unwrap();
        assert_eq!(scan.tuple_desc().field_name(0).unwrap(), Some("people.id"));
        let unaliased = SeqScan::new(TransactionId::new(), &db.catalog, id, None).unwrap();
        assert_eq!(unaliased.tuple_desc().field_name(0).unwrap(), Some("null.id"));
    }

    #[test]
    fn lifecycle_errors() {
        let (mut db, id) = setup();
        let mut scan = SeqScan::new(TransactionId::new(), &db.catalog, id, Some("p")).unwrap();
        assert!(matches!(scan.has_next(&mut db.bufmgr), Err(Error::IllegalState)));
        assert!(matches!(scan.next(&mut db.bufmgr), Err(Error::IllegalState)));
        assert!(matches!(scan.rewind(&mut db.bufmgr), Err(Error::IllegalState)));

        scan.open(&mut db.bufmgr).unwrap();
        collect(&mut scan, &mut db.bufmgr).unwrap();
        assert!(matches!(scan.next(&mut db.bufmgr), Err(Error::NoSuchElement)));

        scan.rewind(&mut db.bufmgr).unwrap();
        assert_eq!(collect(&mut scan, &mut db.bufmgr).unwrap().len(), 7);

        scan.close();
        assert!(matches!(scan.has_next(&mut db.bufmgr), Err(Error::IllegalState)));
        scan.open(&mut db.bufmgr).unwrap();
        assert_eq!(collect(&mut scan, &mut db.bufmgr).unwrap().len(), 7);
    }

    #[test]
    fn open_while_open_starts_over() {
        let (mut db, id) = setup();
        let mut scan = SeqScan::new(TransactionId::new(), &db.catalog, id, Some("p")).unwrap();
        scan.open(&mut db.bufmgr).unwrap();
        assert!(scan.has_next(&mut db.bufmgr).unwrap());
        scan.next(&mut db.bufmgr).unwrap();
        assert!(scan.has_next(&mut db.bufmgr).unwrap());

        scan.open(&mut db.bufmgr).unwrap();
        let rows = collect(&mut scan, &mut db.bufmgr).unwrap();
        assert_eq!(values(&rows), (0..7).map(|i| vec![i, i * i]).collect::<Vec<_>>());
    }

    #[test]
    fn reset_switches_table() {
        let (mut db, id) = setup();
        let other = db.create_table("other", crate::testutil::int_desc(&["x", "y"]));
        db.insert_rows(other.id(), &[vec![100, 200]]);

        let mut scan = SeqScan::new(TransactionId::new(), &db.catalog, id, Some("p")).unwrap();
        scan.open(&mut db.bufmgr).unwrap();
        scan.reset(&db.catalog, other.id(), Some("o")).unwrap();
        assert_eq!(scan.table_name(), "other");
        assert_eq!(scan.tuple_desc().field_name(1).unwrap(), Some("o.y"));
        assert!(matches!(scan.has_next(&mut db.bufmgr), Err(Error::IllegalState)));

        scan.open(&mut db.bufmgr).unwrap();
        let rows = collect(&mut scan, &mut db.bufmgr).unwrap();
        assert_eq!(values(&rows), vec![vec![100, 200]]);
    }

    #[test]
    fn empty_table_fails_to_open() {
        let mut db = TestDb::new(Config::default());
        let file = db.create_table("empty", crate::testutil::int_desc(&["x"]));
        let mut scan = SeqScan::new(TransactionId::new(), &db.catalog, file.id(), None).unwrap();
        assert!(matches!(
            scan.open(&mut db.bufmgr),
            Err(Error::Storage(storage::Error::EmptyFile))
        ));
    }
}
