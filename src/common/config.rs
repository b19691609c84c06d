use std::time::Duration;

use super::error::{HeapDbError, Result};

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity (number of cached pages)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

/// Maximum byte length of a `string` column declared in a catalog file
pub const DEFAULT_STRING_LEN: u16 = 128;

/// Default upper bound on a single lock wait
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings fixed for the lifetime of a [`crate::Database`].
///
/// The page size is shared by every table; it can only be changed by building
/// a new configuration, which is what tests do to get small pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Bytes per page, header included
    pub page_size: usize,
    /// Maximum number of resident pages in the buffer pool
    pub pool_capacity: usize,
    /// How long a lock request may block; `None` waits until granted or deadlocked
    pub lock_timeout: Option<Duration>,
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(HeapDbError::InvalidConfig(
                "page size must be non-zero".to_string(),
            ));
        }
        if self.pool_capacity == 0 {
            return Err(HeapDbError::InvalidConfig(
                "buffer pool capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_capacity: DEFAULT_BUFFER_POOL_SIZE,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }
}
