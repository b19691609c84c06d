use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{Permissions, Result, TransactionId};
use crate::tuple::Tuple;

use super::HeapFile;

/// Sequential scan over a heap file.
///
/// Pages are fetched through the buffer pool with `ReadOnly` permission one
/// at a time, when the previous page has been drained, so the scan holds
/// shared locks only on the pages it has reached. The page count is re-read
/// whenever the scan moves on, so pages appended during the scan are visited.
pub struct TableIterator<'a> {
    pool: &'a BufferPool,
    heap_file: Arc<HeapFile>,
    tid: TransactionId,
    next_page: u32,
    buffered: VecDeque<Tuple>,
    done: bool,
}

impl<'a> TableIterator<'a> {
    pub fn new(pool: &'a BufferPool, heap_file: Arc<HeapFile>, tid: TransactionId) -> Self {
        Self {
            pool,
            heap_file,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            done: false,
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered.clear();
        self.done = false;
    }

    /// Loads the next page's records. Returns false at the end of the file.
    fn fill(&mut self) -> Result<bool> {
        while self.buffered.is_empty() {
            if self.next_page >= self.heap_file.num_pages()? {
                return Ok(false);
            }

            let page_id = self.heap_file.page_id(self.next_page);
            let frame = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
            self.next_page += 1;

            let page = frame.read();
            for tuple in page.iter() {
                self.buffered.push_back(tuple?);
            }
        }
        Ok(true)
    }
}

impl Iterator for TableIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.fill() {
            Ok(true) => self.buffered.pop_front().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::common::StorageConfig;
    use crate::tuple::{DataType, Schema, TupleBuilder};
    use tempfile::TempDir;

    const PAGE: usize = 128;

    fn ids(iter: impl Iterator<Item = Result<Tuple>>) -> Vec<i32> {
        iter.map(|t| t.unwrap().value(0).unwrap().as_integer().unwrap())
            .collect()
    }

    #[test]
    fn test_table_iterator_rewind() {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(Catalog::new(PAGE));
        let schema = Schema::builder()
            .column("id", DataType::Integer)
            .build_arc()
            .unwrap();
        let table_id = catalog
            .create_table("t", schema.clone(), dir.path().join("t.dat"), None)
            .unwrap();
        let config = StorageConfig::new()
            .with_page_size(PAGE)
            .with_pool_capacity(4);
        let pool = BufferPool::new(&config, catalog).unwrap();

        // 31 slots per page, so the rows span two pages
        let tid = TransactionId::new();
        for id in 0..40 {
            let mut tuple = TupleBuilder::new(schema.clone()).value(id).build().unwrap();
            pool.insert_tuple(tid, table_id, &mut tuple).unwrap();
        }

        let heap_file = pool.catalog().heap_file(table_id).unwrap();
        assert_eq!(heap_file.num_pages().unwrap(), 2);

        let mut iter = heap_file.iter(&pool, tid);
        assert_eq!(ids(iter.by_ref()), (0..40).collect::<Vec<_>>());
        assert!(iter.next().is_none());

        iter.rewind();
        assert_eq!(ids(iter.by_ref().take(3)), vec![0, 1, 2]);

        // Rewinding mid-scan starts over, not from the buffered page
        iter.rewind();
        assert_eq!(ids(iter.by_ref()), (0..40).collect::<Vec<_>>());

        pool.transaction_complete(tid, true).unwrap();
    }
}
