use std::cell::{Cell, RefCell};

use crate::storage::{entity::HeapPageId, page::HeapPage};

#[derive(Debug)]
pub struct Buffer {
    pub page_id: HeapPageId,
    pub page: RefCell<HeapPage>,
    pub is_dirty: Cell<bool>,
}

impl Buffer {
    pub fn new(page: HeapPage) -> Self {
        Self {
            page_id: page.id(),
            page: RefCell::new(page),
            is_dirty: Cell::new(false),
        }
    }
}
