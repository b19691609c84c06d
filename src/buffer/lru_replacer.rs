use std::collections::HashMap;

use crate::common::PageId;

/// Logical clock value of an access
pub type Timestamp = u64;

/// LRU Replacement Policy
///
/// Tracks the last access time of every resident page. A victim is the least
/// recently used page that the caller agrees can leave the cache; ties (only
/// possible for pages recorded with the same timestamp) go to the lowest
/// `PageId`. The replacer has no lock of its own: the buffer pool keeps it
/// next to its page table, under the same mutex.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Current timestamp (monotonically increasing)
    current_timestamp: Timestamp,
    /// Last access of each tracked page
    last_access: HashMap<PageId, Timestamp>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `page_id` was just accessed.
    pub fn record_access(&mut self, page_id: PageId) {
        self.current_timestamp += 1;
        self.last_access.insert(page_id, self.current_timestamp);
    }

    /// Picks and forgets the least recently used page for which `evictable`
    /// returns true. Pages are offered oldest first; returns None if every
    /// page is refused.
    pub fn evict_with<F>(&mut self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(PageId) -> bool,
    {
        let mut candidates: Vec<_> = self
            .last_access
            .iter()
            .map(|(&page_id, &ts)| (ts, page_id))
            .collect();
        candidates.sort_unstable();

        let victim = candidates
            .into_iter()
            .map(|(_, page_id)| page_id)
            .find(|&page_id| evictable(page_id))?;
        self.last_access.remove(&victim);
        Some(victim)
    }

    /// Removes a page from the replacer entirely.
    pub fn remove(&mut self, page_id: PageId) {
        self.last_access.remove(&page_id);
    }

    /// Returns the number of tracked pages.
    pub fn size(&self) -> usize {
        self.last_access.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(page_no: u32) -> PageId {
        PageId::new(TableId(1), page_no)
    }

    #[test]
    fn test_lru_replacer_evict_empty() {
        let mut replacer = LruReplacer::new();
        assert_eq!(replacer.evict_with(|_| true), None);
    }

    #[test]
    fn test_lru_replacer_basic() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));
        assert_eq!(replacer.size(), 3);

        // Touching page 0 makes page 1 the oldest
        replacer.record_access(pid(0));
        assert_eq!(replacer.evict_with(|_| true), Some(pid(1)));
        assert_eq!(replacer.evict_with(|_| true), Some(pid(2)));
        assert_eq!(replacer.evict_with(|_| true), Some(pid(0)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_replacer_skips_refused_pages() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        let mut offered = Vec::new();
        let victim = replacer.evict_with(|p| {
            offered.push(p);
            p != pid(0)
        });
        assert_eq!(victim, Some(pid(1)));
        assert_eq!(offered, vec![pid(0), pid(1)]);

        assert_eq!(replacer.evict_with(|_| false), None);
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_lru_replacer_remove() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(pid(0));
        replacer.remove(pid(0));

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict_with(|_| true), None);
    }
}
