use std::fmt;
use std::sync::Arc;

use crate::storage::entity::HeapPageId;

pub mod desc;
pub mod field;

use desc::TupleDesc;
use field::Field;

/// Where a tuple lives: a page and a slot on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: HeapPageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: HeapPageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Self {
        debug_assert_eq!(desc.num_fields(), fields.len());
        Self {
            desc,
            fields,
            record_id: None,
        }
    }

    /// Left fields followed by right fields, with no storage location.
    pub fn merge(desc: Arc<TupleDesc>, left: &Tuple, right: &Tuple) -> Self {
        let fields = left.fields.iter().chain(&right.fields).cloned().collect();
        Self::new(desc, fields)
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Same values under another (type-compatible) schema.
    pub fn with_desc(self, desc: Arc<TupleDesc>) -> Self {
        debug_assert_eq!(*self.desc, *desc);
        Self { desc, ..self }
    }
}

// Location is not part of a tuple's value.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
