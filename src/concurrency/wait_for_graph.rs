use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{AbortReason, HeapDbError, PageId, Result, TransactionId};

use super::{LockMode, PageLock};

struct WaitEdge {
    page_id: PageId,
    lock: Arc<PageLock>,
    mode: LockMode,
}

/// Records which lock each blocked transaction is waiting for.
///
/// Edges point from a waiting transaction to a lock, not to other
/// transactions: the transactions it waits for are read off the lock's
/// current holders during detection, so the graph never goes stale when
/// holders come and go. All edges sit behind one mutex so a detection pass
/// sees a consistent graph.
pub struct WaitForGraph {
    edges: Mutex<HashMap<TransactionId, Vec<WaitEdge>>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self {
            edges: Mutex::new(HashMap::new()),
        }
    }

    /// Records that `tid` is about to wait on `lock` and checks for a cycle.
    ///
    /// If waiting would deadlock the edge is removed again and `tid` is
    /// refused with a deadlock abort.
    pub fn wait_on(&self, tid: TransactionId, lock: &Arc<PageLock>, mode: LockMode) -> Result<()> {
        let page_id = lock.page_id();
        let mut edges = self.edges.lock();

        let waits = edges.entry(tid).or_default();
        if !waits.iter().any(|e| e.page_id == page_id && e.mode == mode) {
            waits.push(WaitEdge {
                page_id,
                lock: Arc::clone(lock),
                mode,
            });
        }

        if Self::reaches(&edges, tid) {
            Self::remove_edge_locked(&mut edges, tid, page_id);
            return Err(HeapDbError::aborted(tid, page_id, AbortReason::Deadlock));
        }
        Ok(())
    }

    /// Depth-first search over "waits for" from `start`; true if it leads back.
    fn reaches(edges: &HashMap<TransactionId, Vec<WaitEdge>>, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            let Some(waits) = edges.get(&node) else {
                continue;
            };
            for edge in waits {
                for blocker in edge.lock.blockers(node, edge.mode) {
                    if blocker == start {
                        return true;
                    }
                    if visited.insert(blocker) {
                        stack.push(blocker);
                    }
                }
            }
        }
        false
    }

    /// Removes the edge from `tid` to the lock on `page_id`, if any.
    pub fn remove_edge(&self, tid: TransactionId, page_id: PageId) {
        Self::remove_edge_locked(&mut self.edges.lock(), tid, page_id);
    }

    fn remove_edge_locked(
        edges: &mut HashMap<TransactionId, Vec<WaitEdge>>,
        tid: TransactionId,
        page_id: PageId,
    ) {
        if let Some(waits) = edges.get_mut(&tid) {
            waits.retain(|e| e.page_id != page_id);
            if waits.is_empty() {
                edges.remove(&tid);
            }
        }
    }

    /// Drops every edge out of `tid`.
    pub fn remove_transaction(&self, tid: TransactionId) {
        self.edges.lock().remove(&tid);
    }

    /// Pages `tid` is currently recorded as waiting for.
    pub fn waiting_on(&self, tid: TransactionId) -> Vec<PageId> {
        self.edges
            .lock()
            .get(&tid)
            .map(|waits| waits.iter().map(|e| e.page_id).collect())
            .unwrap_or_default()
    }

    /// Returns true if `tid` is part of a wait cycle right now.
    pub fn has_cycle_from(&self, tid: TransactionId) -> bool {
        Self::reaches(&self.edges.lock(), tid)
    }
}

impl Default for WaitForGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use std::time::Duration;

    fn page_lock(page_no: u32) -> Arc<PageLock> {
        Arc::new(PageLock::new(PageId::new(TableId(1), page_no)))
    }

    #[test]
    fn test_no_cycle_without_holders() {
        let graph = WaitForGraph::new();
        let lock = page_lock(0);
        let t1 = TransactionId::new();

        graph.wait_on(t1, &lock, LockMode::Exclusive).unwrap();
        assert_eq!(graph.waiting_on(t1), vec![lock.page_id()]);
        assert!(!graph.has_cycle_from(t1));

        graph.remove_edge(t1, lock.page_id());
        assert!(graph.waiting_on(t1).is_empty());
    }

    #[test]
    fn test_two_party_cycle_is_refused() {
        let graph = WaitForGraph::new();
        let (a, b) = (page_lock(0), page_lock(1));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let none = Some(Duration::ZERO);

        a.acquire_exclusive(t1, &graph, none).unwrap();
        b.acquire_exclusive(t2, &graph, none).unwrap();

        // t1 waits for b (held by t2)
        graph.wait_on(t1, &b, LockMode::Exclusive).unwrap();

        // t2 waiting for a (held by t1) closes the cycle
        let err = graph.wait_on(t2, &a, LockMode::Shared).unwrap_err();
        assert!(matches!(
            err,
            HeapDbError::Aborted {
                reason: AbortReason::Deadlock,
                ..
            }
        ));
        assert!(graph.waiting_on(t2).is_empty());
        assert_eq!(graph.waiting_on(t1), vec![b.page_id()]);

        graph.remove_transaction(t1);
        assert!(graph.waiting_on(t1).is_empty());
    }

    #[test]
    fn test_shared_requests_do_not_wait_on_readers() {
        let graph = WaitForGraph::new();
        let (a, b) = (page_lock(0), page_lock(1));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let none = Some(Duration::ZERO);

        a.acquire_shared(t1, &graph, none).unwrap();
        b.acquire_shared(t2, &graph, none).unwrap();

        graph.wait_on(t1, &b, LockMode::Shared).unwrap();
        graph.wait_on(t2, &a, LockMode::Shared).unwrap();
        assert!(!graph.has_cycle_from(t1));
    }
}
