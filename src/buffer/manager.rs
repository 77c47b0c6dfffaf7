use std::rc::Rc;

use super::entity::Buffer;
use crate::storage::{
    entity::{HeapPageId, Permissions, TableId, TransactionId},
    Error,
};
use crate::tuple::Tuple;

/// Brokers every page access made by heap files and operators.
///
/// Returned buffers must not be held across calls: a buffer that is still
/// referenced cannot be evicted.
pub trait BufferPoolManager {
    // Fetch a page, reading it from its heap file on a miss
    fn get_page(
        &mut self,
        tid: TransactionId,
        page_id: HeapPageId,
        perm: Permissions,
    ) -> Result<Rc<Buffer>, Error>;
    // Add a tuple to a table, marking the page it lands on dirty
    fn insert_tuple(&mut self, tid: TransactionId, table_id: TableId, tuple: Tuple)
        -> Result<(), Error>;
    // Remove a stored tuple, marking its page dirty
    fn delete_tuple(&mut self, tid: TransactionId, tuple: &Tuple) -> Result<(), Error>;
    // Write every dirty page back to its heap file
    fn flush(&mut self) -> Result<(), Error>;
}
