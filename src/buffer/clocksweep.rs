use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::buffer::{entity::Buffer, manager::*};
use crate::catalog::Catalog;
use crate::storage::{
    entity::{HeapPageId, Permissions, TableId, TransactionId},
    Error,
};
use crate::tuple::Tuple;

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BufferId(usize);

#[derive(Debug, Default)]
struct Frame {
    usage_count: u64,
    buffer: Option<Rc<Buffer>>,
}

impl Frame {
    // Someone outside the pool still holds the buffer.
    fn is_pinned(&self) -> bool {
        matches!(&self.buffer, Some(buffer) if Rc::strong_count(buffer) > 1)
    }
}

struct BufferPool {
    buffers: Vec<Frame>,
    next_victim_id: BufferId,
}

impl Index<BufferId> for BufferPool {
    type Output = Frame;
    fn index(&self, index: BufferId) -> &Self::Output {
        &self.buffers[index.0]
    }
}

impl IndexMut<BufferId> for BufferPool {
    fn index_mut(&mut self, index: BufferId) -> &mut Self::Output {
        &mut self.buffers[index.0]
    }
}

impl BufferPool {
    pub fn new(pool_size: usize) -> Self {
        let mut buffers = vec![];
        buffers.resize_with(pool_size, Default::default);
        let next_victim_id = BufferId::default();
        Self {
            buffers,
            next_victim_id,
        }
    }

    fn size(&self) -> usize {
        self.buffers.len()
    }

    // Clock-sweep
    fn evict(&mut self) -> Option<BufferId> {
        let pool_size = self.size();
        if pool_size == 0 {
            return None;
        }
        let mut consecutive_pinned = 0;
        let victim_id = loop {
            let next_victim_id = self.next_victim_id;
            let frame = &mut self[next_victim_id];
            if frame.buffer.is_none() || (frame.usage_count == 0 && !frame.is_pinned()) {
                break self.next_victim_id;
            }
            if !frame.is_pinned() {
                frame.usage_count -= 1;
                consecutive_pinned = 0;
            } else {
                consecutive_pinned += 1;
                if consecutive_pinned >= pool_size {
                    return None;
                }
            }
            self.next_victim_id = self.increment_id(self.next_victim_id);
        };
        Some(victim_id)
    }

    fn increment_id(&self, buffer_id: BufferId) -> BufferId {
        BufferId((buffer_id.0 + 1) % self.size())
    }
}

fn write_back(catalog: &Catalog, buffer: &Buffer) -> Result<(), Error> {
    if !buffer.is_dirty.get() {
        return Ok(());
    }
    let file = catalog.database_file(buffer.page_id.table_id)?;
    file.write_page(&buffer.page.borrow())?;
    buffer.is_dirty.set(false);
    trace!(page = %buffer.page_id, "wrote back dirty page");
    Ok(())
}

/// Fixed-size page cache over the heap files registered in a catalog.
pub struct ClockSweepManager {
    catalog: Rc<Catalog>,
    pool: BufferPool,
    page_table: HashMap<HeapPageId, BufferId>,
    dirtied: HashMap<TransactionId, HashSet<HeapPageId>>,
}

impl ClockSweepManager {
    pub fn new(catalog: Rc<Catalog>, pool_size: usize) -> Self {
        let pool = BufferPool::new(pool_size);
        let page_table = HashMap::new();
        Self {
            catalog,
            pool,
            page_table,
            dirtied: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }

    pub fn is_cached(&self, page_id: HeapPageId) -> bool {
        self.page_table.contains_key(&page_id)
    }

    fn mark_dirty(&mut self, tid: TransactionId, buffer: &Buffer) {
        buffer.is_dirty.set(true);
        self.dirtied.entry(tid).or_default().insert(buffer.page_id);
    }

    /// Writes back the pages `tid` dirtied that are still cached.
    pub fn flush_pages(&mut self, tid: TransactionId) -> Result<(), Error> {
        let pages = self.dirtied.remove(&tid).unwrap_or_default();
        for page_id in pages {
            if let Some(&buffer_id) = self.page_table.get(&page_id) {
                if let Some(buffer) = &self.pool[buffer_id].buffer {
                    write_back(&self.catalog, buffer)?;
                }
            }
        }
        Ok(())
    }

    /// Drops a cached page without writing it back. A page still held by a
    /// caller stays cached.
    pub fn discard_page(&mut self, page_id: HeapPageId) -> bool {
        let buffer_id = match self.page_table.get(&page_id) {
            Some(&buffer_id) => buffer_id,
            None => return false,
        };
        let frame = &mut self.pool[buffer_id];
        if frame.is_pinned() {
            return false;
        }
        frame.buffer = None;
        frame.usage_count = 0;
        self.page_table.remove(&page_id);
        true
    }
}

impl BufferPoolManager for ClockSweepManager {
    fn get_page(
        &mut self,
        tid: TransactionId,
        page_id: HeapPageId,
        perm: Permissions,
    ) -> Result<Rc<Buffer>, Error> {
        if let Some(&buffer_id) = self.page_table.get(&page_id) {
            let frame = &mut self.pool[buffer_id];
            frame.usage_count += 1;
            if let Some(buffer) = &frame.buffer {
                trace!(page = %page_id, ?perm, tid = tid.to_u64(), "buffer hit");
                return Ok(Rc::clone(buffer));
            }
        }

        let file = self.catalog.database_file(page_id.table_id)?;
        let page = file
            .read_page(page_id)?
            .ok_or(Error::InvalidPageReference(page_id))?;

        let buffer_id = self.pool.evict().ok_or(Error::NoFreeBuffer)?;
        let frame = &mut self.pool[buffer_id];
        if let Some(victim) = &frame.buffer {
            write_back(&self.catalog, victim)?;
            debug!(victim = %victim.page_id, page = %page_id, "evicting page");
            self.page_table.remove(&victim.page_id);
        }
        let buffer = Rc::new(Buffer::new(page));
        frame.buffer = Some(Rc::clone(&buffer));
        frame.usage_count = 1;
        self.page_table.insert(page_id, buffer_id);
        trace!(page = %page_id, ?perm, tid = tid.to_u64(), "buffer miss");
        Ok(buffer)
    }

    fn insert_tuple(
        &mut self,
        tid: TransactionId,
        table_id: TableId,
        tuple: Tuple,
    ) -> Result<(), Error> {
        let file = self.catalog.database_file(table_id)?;
        let buffer = file.insert_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &buffer);
        Ok(())
    }

    fn delete_tuple(&mut self, tid: TransactionId, tuple: &Tuple) -> Result<(), Error> {
        let record_id = tuple.record_id().ok_or(Error::MissingRecordId)?;
        let file = self.catalog.database_file(record_id.page_id.table_id)?;
        let buffer = file.delete_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &buffer);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let mut tables = BTreeSet::new();
        for &buffer_id in self.page_table.values() {
            if let Some(buffer) = &self.pool[buffer_id].buffer {
                if buffer.is_dirty.get() {
                    tables.insert(buffer.page_id.table_id);
                }
                write_back(&self.catalog, buffer)?;
            }
        }
        for table_id in tables {
            self.catalog.database_file(table_id)?.sync()?;
        }
        self.dirtied.clear();
        Ok(())
    }
}
