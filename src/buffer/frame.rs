use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, Result, TransactionId};
use crate::storage::page::HeapPage;

/// Frame holds one cached page in the buffer pool.
///
/// The page lock taken by [`BufferPool::get_page`](super::BufferPool::get_page)
/// decides who may read or modify the page; the `RwLock` here only keeps
/// concurrent readers of the same bytes from observing a half-written record.
#[derive(Debug)]
pub struct Frame {
    /// The page this frame holds
    page_id: PageId,
    /// The transaction whose changes are not yet on disk, if any
    dirtied_by: Mutex<Option<TransactionId>>,
    /// The page contents
    page: RwLock<HeapPage>,
}

impl Frame {
    pub fn new(page: HeapPage) -> Self {
        Self {
            page_id: page.page_id(),
            dirtied_by: Mutex::new(None),
            page: RwLock::new(page),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a read guard to the page.
    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.page.read()
    }

    /// Returns a write guard to the page.
    pub fn write(&self) -> RwLockWriteGuard<'_, HeapPage> {
        self.page.write()
    }

    /// Returns whether the page differs from its on-disk copy.
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.lock().is_some()
    }

    /// Returns the transaction that last dirtied the page.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtied_by.lock()
    }

    pub fn mark_dirty(&self, tid: TransactionId) {
        *self.dirtied_by.lock() = Some(tid);
    }

    pub fn mark_clean(&self) {
        *self.dirtied_by.lock() = None;
    }

    /// Applies `f` to the page under the write guard and, if it succeeds,
    /// marks the page dirtied by `tid` before the guard is released.
    pub fn modify<R>(
        &self,
        tid: TransactionId,
        f: impl FnOnce(&mut HeapPage) -> Result<R>,
    ) -> Result<R> {
        let mut page = self.page.write();
        let out = f(&mut page)?;
        self.mark_dirty(tid);
        Ok(out)
    }

    /// Passes a dirty page and the transaction that dirtied it to `write`,
    /// and marks the page clean once written.
    ///
    /// The dirty check, the write and the clean mark all happen under one read
    /// guard, so a change made through [`Frame::modify`] is either part of the
    /// written bytes or leaves the page dirty. Returns the transaction that had
    /// dirtied the page, or `None` if it was already clean.
    pub fn flush_with(
        &self,
        write: impl FnOnce(TransactionId, &HeapPage) -> Result<()>,
    ) -> Result<Option<TransactionId>> {
        let page = self.page.read();
        let Some(tid) = self.dirtied_by() else {
            return Ok(None);
        };
        write(tid, &page)?;
        self.mark_clean();
        Ok(Some(tid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::tuple::{DataType, Schema};

    fn frame() -> Frame {
        let schema = Schema::builder()
            .column("id", DataType::Integer)
            .build_arc()
            .unwrap();
        let page = HeapPage::new(
            PageId::new(TableId(4), 2),
            HeapPage::empty_page_data(64),
            schema,
        )
        .unwrap();
        Frame::new(page)
    }

    #[test]
    fn test_frame_new() {
        let frame = frame();
        assert_eq!(frame.page_id(), PageId::new(TableId(4), 2));
        assert!(!frame.is_dirty());
        assert_eq!(frame.dirtied_by(), None);
    }

    #[test]
    fn test_frame_dirty() {
        let frame = frame();
        let tid = TransactionId::new();

        frame.mark_dirty(tid);
        assert!(frame.is_dirty());
        assert_eq!(frame.dirtied_by(), Some(tid));

        frame.mark_clean();
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_modify_marks_dirty() {
        let frame = frame();
        let tid = TransactionId::new();

        let restored = frame.modify(tid, |page| {
            let mut data = page.data().to_vec();
            data[0] = 0b1;
            page.restore(&data)
        });
        assert!(restored.is_ok());
        assert_eq!(frame.dirtied_by(), Some(tid));

        // A failed change leaves the mark alone
        frame.mark_clean();
        let short = frame.modify(tid, |page| page.restore(&[0u8; 3]));
        assert!(short.is_err());
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_flush_with() {
        let frame = frame();
        let tid = TransactionId::new();

        let mut calls = 0;
        assert_eq!(
            frame
                .flush_with(|_, _| {
                    calls += 1;
                    Ok(())
                })
                .unwrap(),
            None
        );
        assert_eq!(calls, 0);

        frame.mark_dirty(tid);
        let failed = frame.flush_with(|_, _| Err(crate::common::HeapDbError::BufferPoolFull));
        assert!(failed.is_err());
        assert_eq!(frame.dirtied_by(), Some(tid));

        let mut written = Vec::new();
        let flushed = frame
            .flush_with(|dirtied_by, page| {
                assert_eq!(dirtied_by, tid);
                written = page.data().to_vec();
                Ok(())
            })
            .unwrap();
        assert_eq!(flushed, Some(tid));
        assert_eq!(written.len(), 64);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_data() {
        let frame = frame();

        let mut data = frame.read().data().to_vec();
        data[0] = 0b1;
        frame.write().restore(&data).unwrap();

        assert_eq!(frame.read().data()[0], 0b1);
        assert_eq!(frame.read().tuple_count(), 1);
    }
}
