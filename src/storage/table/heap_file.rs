use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPool, Frame};
use crate::common::{HeapDbError, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::disk::PageStore;
use crate::storage::page::HeapPage;
use crate::tuple::{Schema, Tuple};

use super::TableIterator;

/// HeapFile stores the records of one table as an unordered collection of
/// heap pages in a single [`PageStore`].
///
/// The file only knows how to move pages between disk and memory. Every
/// access to a page on behalf of a transaction goes through the
/// [`BufferPool`], which takes the page lock first.
pub struct HeapFile {
    table_id: TableId,
    schema: Arc<Schema>,
    store: PageStore,
}

impl HeapFile {
    /// Opens (or creates) the heap file at `path`.
    pub fn open<P: AsRef<Path>>(
        table_id: TableId,
        path: P,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> Result<Self> {
        // Reject schemas whose records can't fit before touching the file
        HeapPage::slots_per_page(page_size, schema.record_width())?;

        Ok(Self {
            table_id,
            schema,
            store: PageStore::open(path, page_size)?,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn page_size(&self) -> usize {
        self.store.page_size()
    }

    /// Returns the number of pages currently in the file.
    pub fn num_pages(&self) -> Result<u32> {
        self.store.page_count()
    }

    /// Returns the id of page `page_no` of this table.
    pub fn page_id(&self, page_no: u32) -> PageId {
        PageId::new(self.table_id, page_no)
    }

    /// Reads a page straight from disk, bypassing the buffer pool.
    pub fn read_page(&self, page_no: u32) -> Result<HeapPage> {
        let data = self.store.read_page(page_no)?;
        HeapPage::new(self.page_id(page_no), data, self.schema.clone())
    }

    /// Writes a page straight to disk, bypassing the buffer pool.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        if page_id.table_id() != self.table_id {
            return Err(HeapDbError::PageNotFound(page_id));
        }
        self.store.write_page(page_id.page_no(), page.data())
    }

    /// Appends an empty page and returns its id.
    pub fn allocate_page(&self) -> Result<PageId> {
        let page_no = self.store.append_page()?;
        debug!(table = %self.table_id, page_no, "allocated heap page");
        Ok(self.page_id(page_no))
    }

    /// Inserts `tuple` into the first page with a free slot, growing the file
    /// when every page is full. Returns the page that was modified.
    ///
    /// Pages are probed under a shared lock. The lock is escalated only on a
    /// page with room, and a probe lock the transaction did not already hold
    /// is given back once the page turns out to be full.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Arc<Frame>> {
        if **tuple.schema() != *self.schema {
            return Err(HeapDbError::SchemaMismatch(format!(
                "tuple schema ({}) differs from table {} schema ({})",
                tuple.schema(),
                self.table_id,
                self.schema
            )));
        }

        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let page_id = self.page_id(page_no);
            let held_before = pool.holds_lock(tid, page_id);

            let frame = pool.get_page(tid, page_id, Permissions::ReadOnly)?;
            if frame.read().free_slot_count() > 0 {
                let frame = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
                match Self::insert_into(&frame, tid, tuple) {
                    Ok(()) => return Ok(frame),
                    Err(HeapDbError::PageFull(_)) => {}
                    Err(err) => return Err(err),
                }
            } else if !held_before {
                pool.unsafe_release_page(tid, page_id);
            }
        }

        loop {
            let page_id = self.allocate_page()?;
            let frame = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
            match Self::insert_into(&frame, tid, tuple) {
                Ok(()) => return Ok(frame),
                // Filled by another transaction between append and lock
                Err(HeapDbError::PageFull(_)) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn insert_into(frame: &Frame, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        frame.modify(tid, |page| page.insert_tuple(tuple).map(|_| ()))
    }

    /// Deletes the record `tuple` was stored as and returns the modified page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Arc<Frame>> {
        let record_id = tuple.record_id().ok_or(HeapDbError::MissingRecordId)?;
        if record_id.page_id.table_id() != self.table_id {
            return Err(HeapDbError::ForeignRecord(record_id));
        }
        if record_id.page_id.page_no() >= self.num_pages()? {
            return Err(HeapDbError::PageNotFound(record_id.page_id));
        }

        let frame = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        frame.modify(tid, |page| page.delete_tuple(tuple))?;
        Ok(frame)
    }

    /// Returns a scan over every stored record, in page then slot order.
    pub fn iter<'a>(
        self: &Arc<Self>,
        pool: &'a BufferPool,
        tid: TransactionId,
    ) -> TableIterator<'a> {
        TableIterator::new(pool, Arc::clone(self), tid)
    }
}
