//! heapdb - the storage and concurrency core of a small relational database
//!
//! Tables are heap files of fixed-size pages holding fixed-width records.
//! Transactions reach pages only through a capacity-bounded buffer pool that
//! takes page-level shared/exclusive locks under strict two-phase locking and
//! breaks deadlocks by refusing the request that would close a wait cycle.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): Disk I/O and page organization
//!   - `PageStore`: Reads, writes and appends whole pages of one file
//!   - `HeapPage`: Bitmap-slotted page of fixed-width records
//!   - `HeapFile`: A table's pages, insert placement and table scans
//!
//! - **Concurrency** (`concurrency`): Page locks and transactions
//!   - `PageLock`: Reader/writer lock with shared-to-exclusive upgrade
//!   - `WaitForGraph`: Deadlock detection before every wait
//!   - `LockManager`: The lock table
//!   - `Transaction`: Commit/abort handle
//!
//! - **Buffer Pool** (`buffer`): The transactional page cache
//!   - `BufferPool`: Lock, fetch, evict, flush, commit and abort
//!   - `LruReplacer`: Least-recently-used victim selection
//!   - `Frame`: A cached page and its dirty state
//!
//! - **Catalog** (`catalog`): Table names, schemas and heap files
//!
//! - **Tuples** (`tuple`): Schemas, values and the fixed record encoding
//!
//! # Example
//!
//! ```rust,no_run
//! use heapdb::tuple::{DataType, Schema, TupleBuilder};
//! use heapdb::{Database, StorageConfig};
//!
//! let db = Database::new(StorageConfig::default()).unwrap();
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Text(32))
//!     .build_arc()
//!     .unwrap();
//! let table_id = db.create_table("users", schema.clone(), "users.dat").unwrap();
//!
//! let txn = db.begin();
//! let mut tuple = TupleBuilder::new(schema)
//!     .value(1)
//!     .value("alice")
//!     .build()
//!     .unwrap();
//! db.buffer_pool()
//!     .insert_tuple(txn.id(), table_id, &mut tuple)
//!     .unwrap();
//! txn.commit().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod database;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{
    HeapDbError, PageId, Permissions, RecordId, Result, SlotId, StorageConfig, TableId,
    TransactionId,
};
pub use database::Database;
