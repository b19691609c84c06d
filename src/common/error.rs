use std::fmt;

use thiserror::Error;

use super::types::{PageId, RecordId, SlotId, TableId, TransactionId};

/// Why a transaction's lock request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Waiting would close a cycle in the wait-for graph
    Deadlock,
    /// The lock was not granted within the configured timeout
    Timeout,
    /// Release of a lock the transaction does not hold
    LockNotHeld,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => write!(f, "deadlock"),
            AbortReason::Timeout => write!(f, "lock wait timed out"),
            AbortReason::LockNotHeld => write!(f, "lock not held"),
        }
    }
}

/// Coarse classification of [`HeapDbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transaction must abort; retrying it may succeed
    Aborted,
    /// Underlying file I/O failed; not retried
    IoFailure,
    /// No evictable page, or no free slot
    CapacityExhausted,
    /// A page, table or tuple reference did not resolve
    NotFound,
    /// Malformed schema, catalog entry or configuration
    InvalidArgument,
}

/// Database error types
#[derive(Error, Debug)]
pub enum HeapDbError {
    #[error("{tid} aborted on {page_id}: {reason}")]
    Aborted {
        tid: TransactionId,
        page_id: PageId,
        reason: AbortReason,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {page_no} is beyond the end of the file ({num_pages} pages)")]
    PageOutOfBounds { page_no: u32, num_pages: u32 },

    #[error("Record {0} could not be decoded")]
    CorruptRecord(RecordId),

    #[error("Buffer pool is full, no evictable pages available")]
    BufferPoolFull,

    #[error("Page {0} has no free slot")]
    PageFull(PageId),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table '{0}' not found")]
    TableNameNotFound(String),

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Record {0} does not belong to this page")]
    ForeignRecord(RecordId),

    #[error("Invalid slot ID: {0}")]
    InvalidSlot(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Tuple does not match the table schema: {0}")]
    SchemaMismatch(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid catalog entry at line {line}: {message}")]
    CatalogParse { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Page size mismatch: expected {expected}, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },
}

impl HeapDbError {
    pub(crate) fn aborted(tid: TransactionId, page_id: PageId, reason: AbortReason) -> Self {
        HeapDbError::Aborted {
            tid,
            page_id,
            reason,
        }
    }

    pub(crate) fn empty_slot(slot: SlotId) -> Self {
        HeapDbError::EmptySlot(slot.as_u16())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HeapDbError::Aborted { .. } => ErrorKind::Aborted,
            HeapDbError::Io(_)
            | HeapDbError::PageOutOfBounds { .. }
            | HeapDbError::CorruptRecord(_) => ErrorKind::IoFailure,
            HeapDbError::BufferPoolFull | HeapDbError::PageFull(_) => {
                ErrorKind::CapacityExhausted
            }
            HeapDbError::PageNotFound(_)
            | HeapDbError::TableNotFound(_)
            | HeapDbError::TableNameNotFound(_)
            | HeapDbError::MissingRecordId
            | HeapDbError::ForeignRecord(_)
            | HeapDbError::InvalidSlot(_)
            | HeapDbError::EmptySlot(_) => ErrorKind::NotFound,
            HeapDbError::SchemaMismatch(_)
            | HeapDbError::InvalidSchema(_)
            | HeapDbError::CatalogParse { .. }
            | HeapDbError::InvalidConfig(_)
            | HeapDbError::PageSizeMismatch { .. } => ErrorKind::InvalidArgument,
        }
    }

    /// Returns true if the caller should abort (and may retry) the transaction.
    pub fn is_aborted(&self) -> bool {
        self.kind() == ErrorKind::Aborted
    }
}

pub type Result<T> = std::result::Result<T, HeapDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_distinguishable() {
        let tid = TransactionId::new();
        let err = HeapDbError::aborted(tid, PageId::new(TableId(1), 2), AbortReason::Deadlock);
        assert!(err.is_aborted());
        assert_eq!(err.kind(), ErrorKind::Aborted);

        assert!(!HeapDbError::BufferPoolFull.is_aborted());
        assert_eq!(
            HeapDbError::BufferPoolFull.kind(),
            ErrorKind::CapacityExhausted
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HeapDbError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_error_display() {
        let err = HeapDbError::PageOutOfBounds {
            page_no: 3,
            num_pages: 2,
        };
        assert_eq!(
            err.to_string(),
            "Page 3 is beyond the end of the file (2 pages)"
        );
    }
}
