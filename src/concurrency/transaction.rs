use std::sync::Arc;

use tracing::warn;

use crate::buffer::BufferPool;
use crate::common::{Result, TransactionId};

/// Handle for one transaction against a [`BufferPool`].
///
/// Ends with [`commit`](Transaction::commit) or
/// [`abort`](Transaction::abort). A handle dropped before either is aborted.
pub struct Transaction {
    id: TransactionId,
    pool: Arc<BufferPool>,
    finished: bool,
}

impl Transaction {
    pub fn begin(pool: &Arc<BufferPool>) -> Self {
        Self {
            id: TransactionId::new(),
            pool: Arc::clone(pool),
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn commit(mut self) -> Result<()> {
        self.complete(true)
    }

    pub fn abort(mut self) -> Result<()> {
        self.complete(false)
    }

    fn complete(&mut self, commit: bool) -> Result<()> {
        self.finished = true;
        self.pool.transaction_complete(self.id, commit)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(tid = %self.id, "transaction dropped without commit or abort, aborting");
        if let Err(err) = self.complete(false) {
            warn!(tid = %self.id, error = %err, "abort of dropped transaction failed");
        }
    }
}
