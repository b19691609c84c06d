use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{AbortReason, HeapDbError, PageId, Permissions, Result, TransactionId};

use super::{LockMode, PageLock, WaitForGraph};

/// LockManager hands out page-level shared/exclusive locks under strict
/// two-phase locking.
///
/// Lock objects are created on first request and stay in the table until the
/// buffer pool evicts their page and reclaims them with
/// [`LockManager::force_reclaim`].
pub struct LockManager {
    /// Lock table
    locks: Mutex<HashMap<PageId, Arc<PageLock>>>,
    /// Waiting transactions, for deadlock detection
    graph: WaitForGraph,
    /// Longest a request may wait, `None` for no limit
    timeout: Option<Duration>,
}

impl LockManager {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            graph: WaitForGraph::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn wait_for_graph(&self) -> &WaitForGraph {
        &self.graph
    }

    fn lock_for(&self, page_id: PageId) -> Arc<PageLock> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(page_id)
                .or_insert_with(|| Arc::new(PageLock::new(page_id))),
        )
    }

    fn existing(&self, page_id: PageId) -> Option<Arc<PageLock>> {
        self.locks.lock().get(&page_id).cloned()
    }

    /// Acquires the lock matching `perm`: shared for reads, exclusive for writes.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, perm: Permissions) -> Result<()> {
        let lock = self.lock_for(page_id);
        lock.acquire(tid, LockMode::from(perm), &self.graph, self.timeout)
    }

    pub fn acquire_shared(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.acquire(tid, page_id, Permissions::ReadOnly)
    }

    pub fn acquire_exclusive(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.acquire(tid, page_id, Permissions::ReadWrite)
    }

    pub fn release_shared(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        match self.existing(page_id) {
            Some(lock) => lock.release_shared(tid),
            None => Err(HeapDbError::aborted(tid, page_id, AbortReason::LockNotHeld)),
        }
    }

    pub fn release_exclusive(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        match self.existing(page_id) {
            Some(lock) => lock.release_exclusive(tid),
            None => Err(HeapDbError::aborted(tid, page_id, AbortReason::LockNotHeld)),
        }
    }

    /// Releases whatever `tid` holds on `page_id` without checking.
    /// Breaks two-phase locking; returns false if nothing was held.
    pub fn release(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing(page_id)
            .map(|lock| lock.release(tid))
            .unwrap_or(false)
    }

    /// Releases every lock held by `tid`, at the end of the transaction.
    pub fn release_all(&self, tid: TransactionId) {
        let locks: Vec<_> = self.locks.lock().values().cloned().collect();
        let released = locks.iter().filter(|lock| lock.release(tid)).count();
        self.graph.remove_transaction(tid);
        debug!(%tid, released, "released all locks");
    }

    pub fn holds_shared(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing(page_id)
            .is_some_and(|lock| lock.holds_shared(tid))
    }

    pub fn holds_exclusive(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing(page_id)
            .is_some_and(|lock| lock.holds_exclusive(tid))
    }

    /// Returns true if `tid` holds the lock on `page_id` in either mode.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.existing(page_id)
            .is_some_and(|lock| lock.is_held_by(tid))
    }

    /// Pages on which `tid` holds a lock, in page order.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<_> = self
            .locks
            .lock()
            .values()
            .filter(|lock| lock.is_held_by(tid))
            .map(|lock| lock.page_id())
            .collect();
        pages.sort();
        pages
    }

    /// Drops the lock object for `page_id` so its page can leave the cache.
    ///
    /// Succeeds only when no transaction holds the lock and no one else has a
    /// reference to it (a waiter, or a pending request). Returns true if the
    /// page has no lock object afterwards.
    pub fn force_reclaim(&self, page_id: PageId) -> bool {
        let mut locks = self.locks.lock();
        match locks.get(&page_id) {
            None => true,
            Some(lock) if Arc::strong_count(lock) == 1 && lock.is_idle() => {
                locks.remove(&page_id);
                true
            }
            Some(_) => false,
        }
    }

    /// Number of lock objects in the table.
    pub fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }
}
