//! Heap page layout.
//!
//! A page is a header bitmap followed by fixed-size tuple images:
//!
//! ```text
//! | header: ceil(slots / 8) bytes | slot 0 | slot 1 | ... | padding |
//! ```
//!
//! Bit `i % 8` of header byte `i / 8` is set when slot `i` holds a tuple.
//! A page of `page_size` bytes has `floor(page_size * 8 / (tuple_size * 8 + 1))`
//! slots, so every tuple costs its image plus one header bit.

use std::sync::Arc;

use super::entity::HeapPageId;
use super::error::Error;
use crate::tuple::{desc::TupleDesc, RecordId, Tuple};

#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: HeapPageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    page_size: usize,
}

impl HeapPage {
    pub fn num_slots_for(desc: &TupleDesc, page_size: usize) -> usize {
        (page_size * 8) / (desc.size() * 8 + 1)
    }

    fn header_size(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0; page_size]
    }

    /// Decodes a page image. The page size is the length of `data`.
    pub fn new(pid: HeapPageId, desc: Arc<TupleDesc>, data: &[u8]) -> Result<Self, Error> {
        let page_size = data.len();
        let num_slots = Self::num_slots_for(&desc, page_size);
        let header_size = Self::header_size(num_slots);
        let tuple_size = desc.size();
        let header = data[..header_size].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let mut offset = header_size + slot * tuple_size;
            let mut fields = Vec::with_capacity(desc.num_fields());
            for &ty in desc.types() {
                let field = ty
                    .parse(&data[offset..offset + ty.byte_len()])
                    .ok_or(Error::Corrupt(pid))?;
                fields.push(field);
                offset += ty.byte_len();
            }
            let mut tuple = Tuple::new(Arc::clone(&desc), fields);
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            pid,
            desc,
            header,
            slots,
            page_size,
        })
    }

    pub fn empty(pid: HeapPageId, desc: Arc<TupleDesc>, page_size: usize) -> Result<Self, Error> {
        Self::new(pid, desc, &Self::empty_page_data(page_size))
    }

    pub fn id(&self) -> HeapPageId {
        self.pid
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Stores `tuple` in the first empty slot and returns its new address.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId, Error> {
        let matches_desc = **tuple.desc() == *self.desc
            && tuple
                .fields()
                .iter()
                .zip(self.desc.types())
                .all(|(field, &ty)| field.field_type() == ty);
        if !matches_desc {
            return Err(Error::SchemaMismatch {
                expected: self.desc.to_string(),
                found: tuple.desc().to_string(),
            });
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::PageFull(self.pid))?;
        let record_id = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(record_id));
        self.slots[slot] = Some(tuple);
        self.mark_slot_used(slot, true);
        Ok(record_id)
    }

    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), Error> {
        let record_id = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if record_id.page_id != self.pid {
            return Err(Error::NotOnPage(record_id, self.pid));
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(Error::SlotEmpty {
                page_id: self.pid,
                slot: record_id.slot,
            });
        }
        self.slots[record_id.slot] = None;
        self.mark_slot_used(record_id.slot, false);
        Ok(())
    }

    /// Tuples in slot order, skipping empty slots.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }

    pub fn page_data(&self) -> Vec<u8> {
        let tuple_size = self.desc.size();
        let mut data = Vec::with_capacity(self.page_size);
        data.extend_from_slice(&self.header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.fields().iter().for_each(|f| f.serialize(&mut data)),
                None => data.resize(data.len() + tuple_size, 0),
            }
        }
        data.resize(self.page_size, 0);
        data
    }
}
