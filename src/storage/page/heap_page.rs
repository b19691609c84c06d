use std::sync::Arc;

use crate::common::{HeapDbError, PageId, RecordId, Result, SlotId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// +------------------+
/// | Header bitmap    |  ceil(num_slots / 8) bytes
/// +------------------+
/// | [slot 0]         |  record_width bytes each
/// | [slot 1]         |
/// | ...              |
/// | [slot n-1]       |
/// +------------------+
/// | unused tail      |
/// +------------------+
///
/// Bit i of the header (byte i / 8, bit i % 8, least significant bit first)
/// is set when slot i holds a record. `num_slots` is the largest n for which
/// n bits of header plus n records fit in one page:
/// `floor(page_size * 8 / (record_width * 8 + 1))`.
#[derive(Debug)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    num_slots: usize,
    header_size: usize,
    data: Vec<u8>,
}

impl HeapPage {
    /// Creates a page view over `data`, which must be exactly one page.
    pub fn new(page_id: PageId, data: Vec<u8>, schema: Arc<Schema>) -> Result<Self> {
        let num_slots = Self::slots_per_page(data.len(), schema.record_width())?;
        Ok(Self {
            page_id,
            schema,
            num_slots,
            header_size: Self::header_size(num_slots),
            data,
        })
    }

    /// Returns the bytes of a page with no records.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Number of fixed-width records that fit on one page, header included.
    pub fn slots_per_page(page_size: usize, record_width: usize) -> Result<usize> {
        let num_slots = (page_size * 8) / (record_width * 8 + 1);
        if num_slots == 0 {
            return Err(HeapDbError::InvalidSchema(format!(
                "a {}-byte record does not fit in a {}-byte page",
                record_width, page_size
            )));
        }
        if num_slots > u16::MAX as usize {
            return Err(HeapDbError::InvalidSchema(format!(
                "{} slots per page exceeds the slot id range",
                num_slots
            )));
        }
        Ok(num_slots)
    }

    /// Bytes of header bitmap needed for `num_slots` slots.
    pub fn header_size(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Returns the raw page bytes, as written to disk.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the page contents with `data` (a before-image or a re-read).
    pub fn restore(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.data.len() {
            return Err(HeapDbError::PageSizeMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data.copy_from_slice(data);
        Ok(())
    }

    /// Returns whether slot `i` holds a record.
    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        let i = slot.as_usize();
        i < self.num_slots && self.data[i / 8] & (1 << (i % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: SlotId, used: bool) {
        let i = slot.as_usize();
        if used {
            self.data[i / 8] |= 1 << (i % 8);
        } else {
            self.data[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Returns the number of empty slots.
    pub fn free_slot_count(&self) -> usize {
        (0..self.num_slots)
            .filter(|&i| !self.is_slot_used(SlotId::new(i as u16)))
            .count()
    }

    /// Returns the number of stored records.
    pub fn tuple_count(&self) -> usize {
        self.num_slots - self.free_slot_count()
    }

    fn slot_range(&self, slot: SlotId) -> std::ops::Range<usize> {
        let width = self.schema.record_width();
        let start = self.header_size + slot.as_usize() * width;
        start..start + width
    }

    /// Stores `tuple` in the lowest-numbered free slot and records where it went.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<SlotId> {
        if **tuple.schema() != *self.schema {
            return Err(HeapDbError::SchemaMismatch(format!(
                "tuple schema ({}) differs from page schema ({})",
                tuple.schema(),
                self.schema
            )));
        }

        let slot = (0..self.num_slots)
            .map(|i| SlotId::new(i as u16))
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(HeapDbError::PageFull(self.page_id))?;

        let range = self.slot_range(slot);
        self.data[range].copy_from_slice(&tuple.to_bytes());
        self.set_slot_used(slot, true);

        tuple.set_record_id(Some(RecordId::new(self.page_id, slot)));
        Ok(slot)
    }

    /// Clears the slot's bit. The record bytes are left in place.
    pub fn delete_slot(&mut self, slot: SlotId) -> Result<()> {
        if slot.as_usize() >= self.num_slots {
            return Err(HeapDbError::InvalidSlot(slot.as_u16()));
        }
        if !self.is_slot_used(slot) {
            return Err(HeapDbError::empty_slot(slot));
        }
        self.set_slot_used(slot, false);
        Ok(())
    }

    /// Deletes the record `tuple` was stored as.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(HeapDbError::MissingRecordId)?;
        if record_id.page_id != self.page_id {
            return Err(HeapDbError::ForeignRecord(record_id));
        }
        self.delete_slot(record_id.slot_id)
    }

    /// Decodes the record in `slot`.
    pub fn tuple(&self, slot: SlotId) -> Result<Tuple> {
        if slot.as_usize() >= self.num_slots {
            return Err(HeapDbError::InvalidSlot(slot.as_u16()));
        }
        if !self.is_slot_used(slot) {
            return Err(HeapDbError::empty_slot(slot));
        }

        let record_id = RecordId::new(self.page_id, slot);
        let mut tuple = Tuple::from_bytes(self.schema.clone(), &self.data[self.slot_range(slot)])
            .ok_or(HeapDbError::CorruptRecord(record_id))?;
        tuple.set_record_id(Some(record_id));
        Ok(tuple)
    }

    /// Iterates over stored records in increasing slot order.
    pub fn iter(&self) -> HeapPageIter<'_> {
        HeapPageIter {
            page: self,
            next_slot: 0,
        }
    }
}

/// Lazy iterator over the occupied slots of a [`HeapPage`].
pub struct HeapPageIter<'a> {
    page: &'a HeapPage,
    next_slot: usize,
}

impl Iterator for HeapPageIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_slot < self.page.num_slots {
            let slot = SlotId::new(self.next_slot as u16);
            self.next_slot += 1;
            if self.page.is_slot_used(slot) {
                return Some(self.page.tuple(slot));
            }
        }
        None
    }
}
