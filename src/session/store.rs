//! Session registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::thread::JoinHandle;

use tracing::info;

use super::state::{SessionId, SessionState, SessionStatus};
use crate::utils::warn_once;
use crate::{Error, Result};

/// Shared handle to one session.
///
/// The state lock is scoped to this session; no lock is ever held across
/// sessions while processing.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Position in creation order.
    pub sequence: u64,
    state: RwLock<SessionState>,
    cancel: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(id: SessionId, sequence: u64) -> Self {
        Self {
            id,
            sequence,
            state: RwLock::new(SessionState::new(id)),
            cancel: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Shared read access. A poisoned lock is recovered since every
    /// transition leaves the state consistent.
    pub fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access without blocking, `None` while another thread holds the lock.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, SessionState>> {
        match self.state.try_write() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.read().status()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_worker(&self, handle: JoinHandle<()>) {
        *self.worker() = Some(handle);
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker().take()
    }
}

#[derive(Debug, Default)]
struct Registry {
    by_sequence: BTreeMap<u64, Arc<SessionHandle>>,
    sequence_of: HashMap<SessionId, u64>,
    next_sequence: u64,
}

/// Bounded registry of sessions, evicting oldest first.
#[derive(Debug)]
pub struct SessionStore {
    max_sessions: usize,
    registry: Mutex<Registry>,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Create a session, then evict the oldest sessions above capacity.
    ///
    /// # Returns
    /// The new handle and the ids evicted to make room. Processing sessions,
    /// sessions whose state is locked by another thread, and the new session
    /// itself are skipped; the store may stay above capacity until a later
    /// creation.
    pub fn create(&self) -> (Arc<SessionHandle>, Vec<SessionId>) {
        let mut registry = self.registry();

        let sequence = registry.next_sequence;
        registry.next_sequence += 1;
        let handle = Arc::new(SessionHandle::new(SessionId::new(), sequence));
        registry.by_sequence.insert(sequence, Arc::clone(&handle));
        registry.sequence_of.insert(handle.id, sequence);

        let mut evicted = Vec::new();
        let mut excess = registry.by_sequence.len().saturating_sub(self.max_sessions);
        let candidates: Vec<Arc<SessionHandle>> = registry
            .by_sequence
            .values()
            .filter(|h| h.sequence != sequence)
            .cloned()
            .collect();

        for candidate in candidates {
            if excess == 0 {
                break;
            }
            // Never block on a session lock while the registry is held
            let marked = candidate
                .try_write()
                .map_or(false, |mut state| state.mark_evicted().is_ok());
            if marked {
                registry.by_sequence.remove(&candidate.sequence);
                registry.sequence_of.remove(&candidate.id);
                evicted.push(candidate.id);
                excess -= 1;
                info!(session = %candidate.id, "session_evicted");
            }
        }

        if excess > 0 {
            warn_once("session store above capacity: remaining sessions are processing or busy");
        }

        (handle, evicted)
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<SessionHandle>> {
        let registry = self.registry();
        registry
            .sequence_of
            .get(id)
            .and_then(|seq| registry.by_sequence.get(seq))
            .cloned()
            .ok_or(Error::InvalidSession(*id))
    }

    /// Remove a session. Refused while it is processing.
    pub fn evict(&self, id: &SessionId) -> Result<()> {
        let handle = self.get(id)?;
        // Marked before removal so a concurrent start sees InvalidSession
        handle.write().mark_evicted()?;

        let mut registry = self.registry();
        registry.by_sequence.remove(&handle.sequence);
        registry.sequence_of.remove(id);
        drop(registry);

        info!(session = %id, "session_evicted");
        Ok(())
    }

    /// Session ids, oldest first.
    pub fn ids(&self) -> Vec<SessionId> {
        self.registry().by_sequence.values().map(|h| h.id).collect()
    }

    pub fn len(&self) -> usize {
        self.registry().by_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
