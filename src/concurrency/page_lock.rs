use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::common::{AbortReason, HeapDbError, PageId, Permissions, Result, TransactionId};

use super::WaitForGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Holders of one page lock.
///
/// `exclusive` is never also in `shared`. `upgrading` is the subset of
/// `shared` that has asked for exclusive access and is waiting for it.
#[derive(Debug, Default)]
struct LockState {
    exclusive: Option<TransactionId>,
    shared: HashSet<TransactionId>,
    upgrading: HashSet<TransactionId>,
}

impl LockState {
    fn holds(&self, tid: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.exclusive == Some(tid) || self.shared.contains(&tid),
            LockMode::Exclusive => self.exclusive == Some(tid),
        }
    }

    fn can_grant(&self, tid: TransactionId, mode: LockMode) -> bool {
        match (mode, self.exclusive) {
            (_, Some(holder)) => holder == tid,
            (LockMode::Shared, None) => true,
            (LockMode::Exclusive, None) if self.shared.contains(&tid) => self
                .shared
                .iter()
                .all(|&other| other == tid || self.upgrading.contains(&other)),
            (LockMode::Exclusive, None) => self.shared.is_empty(),
        }
    }

    fn grant(&mut self, tid: TransactionId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                if self.exclusive != Some(tid) {
                    self.shared.insert(tid);
                }
            }
            LockMode::Exclusive => {
                self.shared.remove(&tid);
                self.upgrading.remove(&tid);
                self.exclusive = Some(tid);
            }
        }
    }

    fn blockers(&self, tid: TransactionId, mode: LockMode) -> Vec<TransactionId> {
        if let Some(holder) = self.exclusive {
            return if holder == tid { Vec::new() } else { vec![holder] };
        }
        match mode {
            LockMode::Shared => Vec::new(),
            LockMode::Exclusive => {
                let upgrading = self.upgrading.contains(&tid);
                self.shared
                    .iter()
                    .copied()
                    .filter(|&other| other != tid)
                    .filter(|other| !(upgrading && self.upgrading.contains(other)))
                    .collect()
            }
        }
    }
}

/// A reader/writer lock on one page, with shared-to-exclusive upgrade.
///
/// Waiting is a condition-variable wait. Before every wait the requester
/// records itself in the [`WaitForGraph`] and is refused with a deadlock
/// abort if waiting would close a cycle.
pub struct PageLock {
    page_id: PageId,
    state: Mutex<LockState>,
    cvar: Condvar,
}

impl PageLock {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            state: Mutex::new(LockState::default()),
            cvar: Condvar::new(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn acquire_shared(
        self: &Arc<Self>,
        tid: TransactionId,
        graph: &WaitForGraph,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.acquire(tid, LockMode::Shared, graph, timeout)
    }

    /// Acquires the lock exclusively, upgrading if `tid` holds it shared.
    pub fn acquire_exclusive(
        self: &Arc<Self>,
        tid: TransactionId,
        graph: &WaitForGraph,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.acquire(tid, LockMode::Exclusive, graph, timeout)
    }

    pub fn acquire(
        self: &Arc<Self>,
        tid: TransactionId,
        mode: LockMode,
        graph: &WaitForGraph,
        timeout: Option<Duration>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.holds(tid, mode) {
                return Ok(());
            }
            if mode == LockMode::Exclusive && state.shared.contains(&tid) {
                state.upgrading.insert(tid);
            }
            if state.can_grant(tid, mode) {
                state.grant(tid, mode);
                return Ok(());
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Err(err) = graph.wait_on(tid, self, mode) {
                self.withdraw_upgrade(tid);
                debug!(%tid, page_id = %self.page_id, %mode, "deadlock, aborting requester");
                return Err(err);
            }

            let mut state = self.state.lock();
            if state.can_grant(tid, mode) {
                state.grant(tid, mode);
                drop(state);
                graph.remove_edge(tid, self.page_id);
                return Ok(());
            }

            debug!(%tid, page_id = %self.page_id, %mode, "waiting for lock");
            match deadline {
                Some(deadline) => {
                    let timed_out = self.cvar.wait_until(&mut state, deadline).timed_out();
                    if timed_out && !state.can_grant(tid, mode) {
                        state.upgrading.remove(&tid);
                        drop(state);
                        graph.remove_edge(tid, self.page_id);
                        debug!(%tid, page_id = %self.page_id, %mode, "lock wait timed out");
                        return Err(HeapDbError::aborted(
                            tid,
                            self.page_id,
                            AbortReason::Timeout,
                        ));
                    }
                }
                None => self.cvar.wait(&mut state),
            }
        }
    }

    fn withdraw_upgrade(&self, tid: TransactionId) {
        self.state.lock().upgrading.remove(&tid);
    }

    /// Gives up a shared hold. Fails if `tid` has none.
    pub fn release_shared(&self, tid: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.shared.remove(&tid) {
            return Err(self.not_held(tid));
        }
        state.upgrading.remove(&tid);
        drop(state);
        self.cvar.notify_all();
        Ok(())
    }

    /// Gives up exclusive ownership. Only the owner may release it.
    pub fn release_exclusive(&self, tid: TransactionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.exclusive != Some(tid) {
            return Err(self.not_held(tid));
        }
        state.exclusive = None;
        drop(state);
        self.cvar.notify_all();
        Ok(())
    }

    /// Drops whatever `tid` holds. Returns false if it held nothing.
    pub fn release(&self, tid: TransactionId) -> bool {
        let mut state = self.state.lock();
        let mut released = state.shared.remove(&tid);
        state.upgrading.remove(&tid);
        if state.exclusive == Some(tid) {
            state.exclusive = None;
            released = true;
        }
        drop(state);
        if released {
            self.cvar.notify_all();
        }
        released
    }

    fn not_held(&self, tid: TransactionId) -> HeapDbError {
        HeapDbError::aborted(tid, self.page_id, AbortReason::LockNotHeld)
    }

    pub fn holds_shared(&self, tid: TransactionId) -> bool {
        self.state.lock().shared.contains(&tid)
    }

    pub fn holds_exclusive(&self, tid: TransactionId) -> bool {
        self.state.lock().exclusive == Some(tid)
    }

    /// Returns true if `tid` holds the lock in any mode.
    pub fn is_held_by(&self, tid: TransactionId) -> bool {
        self.state.lock().holds(tid, LockMode::Shared)
    }

    /// Returns true if nobody holds the lock.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.exclusive.is_none() && state.shared.is_empty()
    }

    /// Transactions a `mode` request by `tid` would currently wait for.
    pub fn blockers(&self, tid: TransactionId, mode: LockMode) -> Vec<TransactionId> {
        self.state.lock().blockers(tid, mode)
    }
}

impl fmt::Debug for PageLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PageLock")
            .field("page_id", &self.page_id)
            .field("exclusive", &state.exclusive)
            .field("shared", &state.shared)
            .field("upgrading", &state.upgrading)
            .finish()
    }
}
