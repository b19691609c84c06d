use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::common::{
    HeapDbError, PageId, Permissions, Result, StorageConfig, TableId, TransactionId,
};
use crate::concurrency::LockManager;
use crate::storage::table::TableIterator;
use crate::tuple::Tuple;

use super::{Frame, LruReplacer};

/// Cached pages and their recency, kept under one mutex so capacity
/// accounting and eviction see a consistent picture. Disk I/O never happens
/// while this mutex is held.
struct CacheState {
    /// Page table: resident pages
    frames: HashMap<PageId, Arc<Frame>>,
    /// LRU replacer for eviction decisions
    replacer: LruReplacer,
    /// Slots reserved by misses whose page is still being read
    loading: usize,
}

/// Contents of a page before a transaction first wrote to it.
struct BeforeImage {
    data: Vec<u8>,
    /// The transaction's changes reached disk before it finished
    stolen: bool,
}

/// BufferPool caches table pages in memory and is the only way transactions
/// reach them.
///
/// Every access takes the matching page lock first. At most `capacity` pages
/// are resident; when the pool is full the least recently used page that is
/// clean and unlocked is evicted, and if there is none the request fails with
/// [`HeapDbError::BufferPoolFull`] rather than dropping unwritten changes.
///
/// Commit writes the transaction's dirty pages to disk. Abort puts back the
/// page contents recorded when the transaction first got write access.
pub struct BufferPool {
    /// Maximum number of resident pages
    capacity: usize,
    /// Bytes per page
    page_size: usize,
    /// Resolves table ids to heap files
    catalog: Arc<Catalog>,
    /// Page-level locks
    lock_manager: LockManager,
    /// Resident pages
    cache: Mutex<CacheState>,
    /// Before-images per transaction, for abort
    journal: Mutex<HashMap<TransactionId, HashMap<PageId, BeforeImage>>>,
}

impl BufferPool {
    /// Creates a pool over the tables of `catalog`.
    pub fn new(config: &StorageConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        if catalog.page_size() != config.page_size {
            return Err(HeapDbError::PageSizeMismatch {
                expected: config.page_size,
                actual: catalog.page_size(),
            });
        }

        Ok(Self {
            capacity: config.pool_capacity,
            page_size: config.page_size,
            catalog,
            lock_manager: LockManager::new(config.lock_timeout),
            cache: Mutex::new(CacheState {
                frames: HashMap::with_capacity(config.pool_capacity),
                replacer: LruReplacer::new(),
                loading: 0,
            }),
            journal: Mutex::new(HashMap::new()),
        })
    }

    /// Fetches a page on behalf of `tid`, locking it first.
    ///
    /// May block on the lock, and fails with an abort if waiting would
    /// deadlock or times out.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<Arc<Frame>> {
        self.lock_manager.acquire(tid, page_id, perm)?;
        let frame = self.fetch(page_id)?;
        if perm == Permissions::ReadWrite {
            self.record_before_image(tid, &frame);
        }
        Ok(frame)
    }

    /// Returns the cached frame for `page_id`, reading it from disk on a miss.
    ///
    /// A miss reserves a slot under the cache mutex, reads the page with the
    /// mutex released and then installs it. If another reader of the same page
    /// installed it first, that frame wins.
    fn fetch(&self, page_id: PageId) -> Result<Arc<Frame>> {
        {
            let mut cache = self.cache.lock();
            if let Some(frame) = cache.frames.get(&page_id).cloned() {
                cache.replacer.record_access(page_id);
                return Ok(frame);
            }
            if cache.frames.len() + cache.loading >= self.capacity {
                self.evict(&mut cache)?;
            }
            cache.loading += 1;
        }

        let loaded = self
            .catalog
            .heap_file(page_id.table_id())
            .and_then(|heap_file| heap_file.read_page(page_id.page_no()));

        let mut cache = self.cache.lock();
        cache.loading -= 1;
        let page = loaded?;
        let frame = Arc::clone(
            cache
                .frames
                .entry(page_id)
                .or_insert_with(|| Arc::new(Frame::new(page))),
        );
        cache.replacer.record_access(page_id);
        Ok(frame)
    }

    /// Evicts the least recently used clean page whose lock can be reclaimed.
    fn evict(&self, cache: &mut CacheState) -> Result<()> {
        let frames = &cache.frames;
        let lock_manager = &self.lock_manager;
        let victim = cache.replacer.evict_with(|page_id| {
            frames.get(&page_id).is_some_and(|frame| !frame.is_dirty())
                && lock_manager.force_reclaim(page_id)
        });

        match victim {
            Some(page_id) => {
                cache.frames.remove(&page_id);
                debug!(%page_id, "evicted page");
                Ok(())
            }
            None => Err(HeapDbError::BufferPoolFull),
        }
    }

    fn record_before_image(&self, tid: TransactionId, frame: &Frame) {
        let page_id = frame.page_id();
        let journaled = self
            .journal
            .lock()
            .get(&tid)
            .is_some_and(|pages| pages.contains_key(&page_id));
        if journaled {
            return;
        }

        // Only `tid` can change the page now that it holds the exclusive lock
        let data = frame.read().data().to_vec();
        self.journal
            .lock()
            .entry(tid)
            .or_default()
            .entry(page_id)
            .or_insert(BeforeImage {
                data,
                stolen: false,
            });
    }

    /// Adds `tuple` to table `table_id` on behalf of `tid`.
    ///
    /// On success the tuple carries its new record id, and the page it went to
    /// is dirty and exclusively locked by `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let heap_file = self.catalog.heap_file(table_id)?;
        heap_file.insert_tuple(self, tid, tuple)?;
        Ok(())
    }

    /// Removes `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(HeapDbError::MissingRecordId)?;
        let heap_file = self.catalog.heap_file(record_id.page_id.table_id())?;
        heap_file.delete_tuple(self, tid, tuple)?;
        Ok(())
    }

    /// Scans table `table_id` under shared locks held by `tid`.
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> Result<TableIterator<'_>> {
        let heap_file = self.catalog.heap_file(table_id)?;
        Ok(heap_file.iter(self, tid))
    }

    /// Writes `frame` to disk if dirty. Caller must not hold the cache mutex.
    fn flush_frame(&self, frame: &Frame) -> Result<()> {
        let page_id = frame.page_id();
        let heap_file = self.catalog.heap_file(page_id.table_id())?;
        let flushed = frame.flush_with(|tid, page| {
            // Marked before the write, while the page is held, so an abort
            // restoring this page sees it
            self.mark_stolen(tid, page_id);
            heap_file.write_page(page)
        })?;
        let Some(dirtied_by) = flushed else {
            return Ok(());
        };

        debug!(%page_id, tid = %dirtied_by, "flushed page");
        Ok(())
    }

    fn mark_stolen(&self, tid: TransactionId, page_id: PageId) {
        if let Some(image) = self
            .journal
            .lock()
            .get_mut(&tid)
            .and_then(|pages| pages.get_mut(&page_id))
        {
            image.stolen = true;
        }
    }

    fn is_stolen(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.journal
            .lock()
            .get(&tid)
            .and_then(|pages| pages.get(&page_id))
            .is_some_and(|image| image.stolen)
    }

    /// Writes one page to disk if it is cached and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame = self.cache.lock().frames.get(&page_id).cloned();
        match frame {
            Some(frame) => self.flush_frame(&frame),
            None => Ok(()),
        }
    }

    /// Snapshot of resident frames matching `filter`, ordered by page id.
    fn resident_frames(&self, filter: impl Fn(&Frame) -> bool) -> Vec<Arc<Frame>> {
        let mut frames: Vec<_> = self
            .cache
            .lock()
            .frames
            .values()
            .filter(|frame| filter(frame))
            .cloned()
            .collect();
        frames.sort_by_key(|frame| frame.page_id());
        frames
    }

    /// Writes every dirty page to disk.
    ///
    /// This also writes changes of transactions that have not committed. An
    /// abort afterwards still undoes them, on disk as well as in memory.
    pub fn flush_all_pages(&self) -> Result<()> {
        for frame in self.resident_frames(Frame::is_dirty) {
            self.flush_frame(&frame)?;
        }
        Ok(())
    }

    /// Writes every page dirtied by `tid` to disk.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for frame in self.resident_frames(|frame| frame.dirtied_by() == Some(tid)) {
            self.flush_frame(&frame)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let mut cache = self.cache.lock();
        cache.frames.remove(&page_id);
        cache.replacer.remove(page_id);
    }

    /// Drops every cached page of `table_id` without writing it.
    ///
    /// Needed after [`Catalog::add_table`] replaces a table under the same id,
    /// since frames read from the old file would otherwise keep being served.
    pub fn discard_table(&self, table_id: TableId) {
        let mut cache = self.cache.lock();
        let CacheState {
            frames, replacer, ..
        } = &mut *cache;
        frames.retain(|&page_id, _| {
            let keep = page_id.table_id() != table_id;
            if !keep {
                replacer.remove(page_id);
            }
            keep
        });
        debug!(%table_id, "discarded cached pages of table");
    }

    /// Ends transaction `tid`.
    ///
    /// Commit flushes the pages it dirtied. Abort restores every page it
    /// wrote to the contents recorded before its first write; a page that
    /// fails to restore does not stop the others, and the first failure is
    /// returned. Either way all of its locks are released afterwards.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let result = if commit {
            self.flush_pages(tid)
        } else {
            self.roll_back(tid)
        };

        self.journal.lock().remove(&tid);
        self.lock_manager.release_all(tid);
        debug!(%tid, commit, ok = result.is_ok(), "transaction complete");
        result
    }

    fn roll_back(&self, tid: TransactionId) -> Result<()> {
        // The journal entry stays until every page is restored, so concurrent
        // flushes can still record a steal
        let mut images: Vec<(PageId, Vec<u8>)> = match self.journal.lock().get(&tid) {
            Some(pages) => pages
                .iter()
                .map(|(&page_id, image)| (page_id, image.data.clone()))
                .collect(),
            None => return Ok(()),
        };
        images.sort_by_key(|(page_id, _)| *page_id);

        let restores: Vec<_> = {
            let cache = self.cache.lock();
            images
                .into_iter()
                .map(|(page_id, image)| {
                    let cached = cache.frames.get(&page_id).cloned();
                    (page_id, image, cached)
                })
                .collect()
        };

        let mut first_error = None;
        for (page_id, image, cached) in restores {
            match self.restore_image(tid, page_id, &image, cached.as_deref()) {
                Ok(()) => debug!(%page_id, %tid, "restored before-image"),
                Err(err) => {
                    warn!(%page_id, %tid, error = %err, "failed to restore before-image");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.journal.lock().remove(&tid);
        first_error.map_or(Ok(()), Err)
    }

    /// Puts one before-image back in the cache and, when the page was stolen
    /// or is not cached, on disk.
    fn restore_image(
        &self,
        tid: TransactionId,
        page_id: PageId,
        image: &[u8],
        cached: Option<&Frame>,
    ) -> Result<()> {
        let disk_stale = match cached {
            Some(frame) => {
                let mut page = frame.write();
                page.restore(image)?;
                frame.mark_clean();
                // No flush of this page can start or be in progress here
                self.is_stolen(tid, page_id)
            }
            None => true,
        };
        if !disk_stale {
            return Ok(());
        }

        let written = self
            .catalog
            .heap_file(page_id.table_id())
            .and_then(|heap_file| {
                heap_file
                    .store()
                    .write_page(page_id.page_no(), image)
            });
        if written.is_err() {
            if let Some(frame) = cached {
                // Restored bytes are not on disk yet; keep the page pinned as dirty
                frame.mark_dirty(tid);
            }
        }
        written
    }

    /// Releases `tid`'s lock on `page_id` before the transaction ends.
    ///
    /// Breaks two-phase locking. Only meant for pages `tid` looked at but
    /// neither read from nor wrote to.
    pub fn unsafe_release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    /// Returns true if `tid` holds a lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently in memory.
    pub fn resident_count(&self) -> usize {
        self.cache.lock().frames.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().frames.contains_key(&page_id)
    }

    /// Returns true if `page_id` is cached with changes not yet on disk.
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.cache
            .lock()
            .frames
            .get(&page_id)
            .is_some_and(|frame| frame.is_dirty())
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}
