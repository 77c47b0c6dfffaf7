use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{prelude::*, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::vec;

use tracing::{debug, trace};

use super::entity::{HeapPageId, Permissions, TableId, TransactionId};
use super::error::Error;
use super::page::HeapPage;
use crate::buffer::{entity::Buffer, manager::BufferPoolManager};
use crate::tuple::{desc::TupleDesc, Tuple};

/// A table stored as an unordered sequence of fixed-size pages in one file.
///
/// Page `n` lives at byte offset `n * page_size`. The heap file only does raw
/// page I/O; cached page objects belong to the buffer pool.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    file: File,
    id: TableId,
    desc: Arc<TupleDesc>,
    page_size: usize,
}

impl HeapFile {
    pub fn open(
        path: impl AsRef<Path>,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self, Error> {
        if HeapPage::num_slots_for(&desc, page_size) == 0 {
            return Err(Error::PageTooSmall {
                page_size,
                tuple_size: desc.size(),
            });
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let path = fs::canonicalize(path)?;
        let id = Self::table_id_for(&path);
        Ok(Self {
            path,
            file,
            id,
            desc: Arc::new(desc),
            page_size,
        })
    }

    // Same absolute path, same id.
    fn table_id_for(path: &Path) -> TableId {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        TableId(hasher.finish())
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Page count from the file length. A well-formed file is a whole number
    /// of pages; a trailing partial page is still counted.
    pub fn num_pages(&self) -> Result<usize, Error> {
        let len = self.file.metadata()?.len();
        let page_size = self.page_size as u64;
        Ok(((len + page_size - 1) / page_size) as usize)
    }

    /// Reads one page straight from disk.
    ///
    /// Returns `Ok(None)` when `pid` belongs to another table or lies past the
    /// end of the file.
    pub fn read_page(&self, pid: HeapPageId) -> Result<Option<HeapPage>, Error> {
        if pid.table_id != self.id || pid.page_no >= self.num_pages()? {
            return Ok(None);
        }
        let offset = (self.page_size * pid.page_no) as u64;
        let mut data = vec![0; self.page_size];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;
        HeapPage::new(pid, Arc::clone(&self.desc), &data).map(Some)
    }

    pub fn write_page(&self, page: &HeapPage) -> Result<(), Error> {
        let offset = (self.page_size * page.id().page_no) as u64;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.page_data())?;
        Ok(())
    }

    pub fn sync(&self) -> Result<(), Error> {
        let mut file = &self.file;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Inserts into the first page with a free slot, appending an empty page
    /// when every page is full. Returns the mutated page; marking it dirty is
    /// up to the caller.
    pub fn insert_tuple(
        &self,
        bufmgr: &mut dyn BufferPoolManager,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Rc<Buffer>, Error> {
        if **tuple.desc() != *self.desc {
            return Err(Error::SchemaMismatch {
                expected: self.desc.to_string(),
                found: tuple.desc().to_string(),
            });
        }

        let num_pages = self.num_pages()?;
        let mut target = None;
        for page_no in 0..num_pages {
            let pid = HeapPageId::new(self.id, page_no);
            let buffer = bufmgr.get_page(tid, pid, Permissions::ReadOnly)?;
            let free = buffer.page.borrow().num_empty_slots();
            if free > 0 {
                trace!(page = %pid, free, "found page with free slot");
                target = Some(pid);
                break;
            }
        }
        let pid = match target {
            Some(pid) => pid,
            None => {
                let pid = HeapPageId::new(self.id, num_pages);
                debug!(page = %pid, "all pages full, appending empty page");
                let page = HeapPage::empty(pid, Arc::clone(&self.desc), self.page_size)?;
                self.write_page(&page)?;
                pid
            }
        };

        let buffer = bufmgr.get_page(tid, pid, Permissions::ReadWrite)?;
        buffer.page.borrow_mut().insert_tuple(tuple)?;
        Ok(buffer)
    }

    /// Removes the tuple at its record id. Returns the mutated page.
    pub fn delete_tuple(
        &self,
        bufmgr: &mut dyn BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Rc<Buffer>, Error> {
        let pid = tuple.record_id().ok_or(Error::MissingRecordId)?.page_id;
        if pid.table_id != self.id || pid.page_no >= self.num_pages()? {
            return Err(Error::InvalidPageReference(pid));
        }
        let buffer = bufmgr.get_page(tid, pid, Permissions::ReadWrite)?;
        buffer.page.borrow_mut().delete_tuple(tuple)?;
        Ok(buffer)
    }

    /// A fresh, closed cursor over every stored tuple.
    pub fn iterator(self: Rc<Self>, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(self, tid)
    }
}

/// Lazy page-at-a-time cursor over a heap file.
///
/// Pages are fetched through the buffer pool one at a time as the cursor
/// reaches them; pages left without tuples by deletes are skipped.
#[derive(Debug)]
pub struct HeapFileIterator {
    file: Rc<HeapFile>,
    tid: TransactionId,
    opened: bool,
    next_page_no: usize,
    tuples: vec::IntoIter<Tuple>,
}

impl HeapFileIterator {
    pub fn new(file: Rc<HeapFile>, tid: TransactionId) -> Self {
        Self {
            file,
            tid,
            opened: false,
            next_page_no: 0,
            tuples: Vec::new().into_iter(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// No-op when already open. Fails on a file without pages.
    pub fn open(&mut self) -> Result<(), Error> {
        if self.opened {
            return Ok(());
        }
        if self.file.num_pages()? == 0 {
            return Err(Error::EmptyFile);
        }
        self.opened = true;
        Ok(())
    }

    /// Loads pages until one has a tuple left, without consuming it.
    pub fn has_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<bool, Error> {
        if !self.opened {
            return Err(Error::IllegalState);
        }
        loop {
            if self.tuples.len() > 0 {
                return Ok(true);
            }
            if self.next_page_no >= self.file.num_pages()? {
                return Ok(false);
            }
            let pid = HeapPageId::new(self.file.id(), self.next_page_no);
            let buffer = bufmgr.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = buffer.page.borrow().tuples().cloned().collect();
            self.tuples = tuples.into_iter();
            self.next_page_no += 1;
        }
    }

    pub fn next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Tuple, Error> {
        if !self.has_next(bufmgr)? {
            return Err(Error::NoSuchElement);
        }
        self.tuples.next().ok_or(Error::NoSuchElement)
    }

    pub fn rewind(&mut self) -> Result<(), Error> {
        if !self.opened {
            return Err(Error::IllegalState);
        }
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.next_page_no = 0;
        self.tuples = Vec::new().into_iter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::manager::BufferPoolManager;
    use crate::config::Config;
    use crate::storage::page::HeapPage;
    use crate::testutil::{int_desc, int_tuple, values, TestDb};
    use crate::tuple::{field::Field, RecordId};

    // two int columns: 3 tuples per 26-byte page
    fn small_pages() -> Config {
        Config::default().with_page_size(26)
    }

    fn drain(iter: &mut HeapFileIterator, bufmgr: &mut dyn BufferPoolManager) -> Vec<Tuple> {
        let mut out = vec![];
        while iter.has_next(bufmgr).unwrap() {
            out.push(iter.next(bufmgr).unwrap());
        }
        out
    }

    #[test]
    fn id_follows_absolute_path() {
        let db = TestDb::new(Config::default());
        let path = db.dir.path().join("t.dat");
        let a = HeapFile::open(&path, int_desc(&["a"]), 4096).unwrap();
        let b = HeapFile::open(db.dir.path().join(".").join("t.dat"), int_desc(&["a"]), 4096)
            .unwrap();
        let c = HeapFile::open(db.dir.path().join("u.dat"), int_desc(&["a"]), 4096).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn open_rejects_pages_without_a_slot() {
        let db = TestDb::new(Config::default());
        let path = db.dir.path().join("t.dat");
        for page_size in [0, 4, 8] {
            assert!(matches!(
                HeapFile::open(&path, int_desc(&["a", "b"]), page_size),
                Err(Error::PageTooSmall { tuple_size: 8, .. })
            ));
        }
        assert!(!path.exists());
        assert!(HeapFile::open(&path, int_desc(&["a", "b"]), 9).is_ok());
    }

    #[test]
    fn num_pages_rounds_up() {
        let db = TestDb::new(Config::default());
        let path = db.dir.path().join("t.dat");
        let file = HeapFile::open(&path, int_desc(&["a"]), 100).unwrap();
        assert_eq!(file.num_pages().unwrap(), 0);
        fs::write(&path, vec![0u8; 200]).unwrap();
        assert_eq!(file.num_pages().unwrap(), 2);
        fs::write(&path, vec![0u8; 201]).unwrap();
        assert_eq!(file.num_pages().unwrap(), 3);
    }

    #[test]
    fn read_page_rejects_foreign_or_missing_pages() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        db.insert_rows(file.id(), &[vec![1, 2]]);
        db.bufmgr.flush().unwrap();

        let page = file.read_page(HeapPageId::new(file.id(), 0)).unwrap().unwrap();
        assert_eq!(page.tuples().count(), 1);
        assert!(file.read_page(HeapPageId::new(file.id(), 1)).unwrap().is_none());
        assert!(file
            .read_page(HeapPageId::new(TableId(file.id().0 ^ 1), 0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn write_then_read_page() {
        let db = TestDb::new(Config::default());
        let file = HeapFile::open(db.dir.path().join("t.dat"), int_desc(&["a", "b"]), 64).unwrap();
        let desc = Arc::clone(file.desc());
        let pid = HeapPageId::new(file.id(), 0);
        let mut page = HeapPage::empty(pid, Arc::clone(&desc), 64).unwrap();
        page.insert_tuple(int_tuple(&desc, &[4, 5])).unwrap();
        file.write_page(&page).unwrap();
        assert_eq!(file.num_pages().unwrap(), 1);
        let read = file.read_page(pid).unwrap().unwrap();
        assert_eq!(read.page_data(), page.page_data());
    }

    #[test]
    fn insert_allocates_pages_on_overflow() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        let rows: Vec<Vec<i32>> = (0..10).map(|i| vec![i, i * 10]).collect();
        db.insert_rows(file.id(), &rows);

        assert_eq!(file.num_pages().unwrap(), 4);
        let scanned = db.scan(&file);
        assert_eq!(scanned.len(), 10);
        assert_eq!(values(&scanned), rows);
    }

    #[test]
    fn insert_rejects_other_schema() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        let other = Arc::new(int_desc(&["a"]));
        let res = file.insert_tuple(&mut db.bufmgr, TransactionId::new(), int_tuple(&other, &[1]));
        assert!(matches!(res, Err(Error::SchemaMismatch { .. })));
        assert_eq!(file.num_pages().unwrap(), 0);
    }

    #[test]
    fn insert_reuses_freed_slot() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        db.insert_rows(file.id(), &[vec![1, 1], vec![2, 2], vec![3, 3], vec![4, 4]]);
        let victim = db.scan(&file).remove(1);
        let tid = TransactionId::new();
        file.delete_tuple(&mut db.bufmgr, tid, &victim).unwrap();

        let buffer = file
            .insert_tuple(&mut db.bufmgr, tid, int_tuple(file.desc(), &[5, 5]))
            .unwrap();
        assert_eq!(buffer.page_id.page_no, 0);
        assert_eq!(file.num_pages().unwrap(), 2);
    }

    #[test]
    fn delete_checks_page_reference() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        db.insert_rows(file.id(), &[vec![1, 1]]);
        let tid = TransactionId::new();

        let mut beyond = int_tuple(file.desc(), &[1, 1]);
        beyond.set_record_id(Some(RecordId::new(HeapPageId::new(file.id(), 5), 0)));
        assert!(matches!(
            file.delete_tuple(&mut db.bufmgr, tid, &beyond),
            Err(Error::InvalidPageReference(_))
        ));

        let mut foreign = int_tuple(file.desc(), &[1, 1]);
        foreign.set_record_id(Some(RecordId::new(HeapPageId::new(TableId(file.id().0 ^ 1), 0), 0)));
        assert!(matches!(
            file.delete_tuple(&mut db.bufmgr, tid, &foreign),
            Err(Error::InvalidPageReference(_))
        ));

        let stored = db.scan(&file).remove(0);
        let buffer = file.delete_tuple(&mut db.bufmgr, tid, &stored).unwrap();
        assert_eq!(Some(buffer.page_id), stored.record_id().map(|r| r.page_id));
        assert!(db.scan(&file).is_empty());
    }

    #[test]
    fn iterator_lifecycle() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        let mut iter = Rc::clone(&file).iterator(TransactionId::new());
        assert!(matches!(iter.open(), Err(Error::EmptyFile)));

        db.insert_rows(file.id(), &[vec![1, 1], vec![2, 2]]);
        assert!(matches!(iter.has_next(&mut db.bufmgr), Err(Error::IllegalState)));
        assert!(matches!(iter.next(&mut db.bufmgr), Err(Error::IllegalState)));
        assert!(matches!(iter.rewind(), Err(Error::IllegalState)));

        iter.open().unwrap();
        iter.open().unwrap();
        assert_eq!(drain(&mut iter, &mut db.bufmgr).len(), 2);
        assert!(matches!(iter.next(&mut db.bufmgr), Err(Error::NoSuchElement)));

        iter.rewind().unwrap();
        let first = iter.next(&mut db.bufmgr).unwrap();
        assert_eq!(first.fields(), &[Field::Int(1), Field::Int(1)]);

        iter.close();
        assert!(matches!(iter.has_next(&mut db.bufmgr), Err(Error::IllegalState)));
    }

    #[test]
    fn has_next_does_not_consume() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        db.insert_rows(file.id(), &[vec![7, 7]]);
        let mut iter = Rc::clone(&file).iterator(TransactionId::new());
        iter.open().unwrap();
        assert!(iter.has_next(&mut db.bufmgr).unwrap());
        assert!(iter.has_next(&mut db.bufmgr).unwrap());
        assert_eq!(iter.next(&mut db.bufmgr).unwrap().fields(), &[Field::Int(7), Field::Int(7)]);
        assert!(!iter.has_next(&mut db.bufmgr).unwrap());
    }

    #[test]
    fn iterator_skips_emptied_pages() {
        let mut db = TestDb::new(small_pages());
        let file = db.create_table("t", int_desc(&["a", "b"]));
        let rows: Vec<Vec<i32>> = (0..9).map(|i| vec![i, i]).collect();
        db.insert_rows(file.id(), &rows);
        assert_eq!(file.num_pages().unwrap(), 3);

        let tid = TransactionId::new();
        for tuple in db.scan(&file) {
            if tuple.record_id().unwrap().page_id.page_no == 1 {
                db.bufmgr.delete_tuple(tid, &tuple).unwrap();
            }
        }

        let mut iter = Rc::clone(&file).iterator(tid);
        iter.open().unwrap();
        let scanned = drain(&mut iter, &mut db.bufmgr);
        assert_eq!(
            values(&scanned),
            vec![
                vec![0, 0],
                vec![1, 1],
                vec![2, 2],
                vec![6, 6],
                vec![7, 7],
                vec![8, 8]
            ]
        );
        assert!(scanned
            .iter()
            .all(|t| t.record_id().unwrap().page_id.page_no != 1));
    }
}
