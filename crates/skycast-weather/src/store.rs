//! Per-key fetch state with push-based snapshots.
//!
//! One [`FetchState`] per [`CityKey`]. Writes are serialized by a mutex and
//! every write publishes the full mapping on a watch channel. Entries are
//! never removed; a key that was never fetched is simply absent.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::normalize::CityKey;

/// State of the latest fetch for one key
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Pending,
    Success(T),
    Error(String),
}

impl<T> FetchState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Read-only view of every slot at one point in time
pub type Snapshot<T> = Arc<BTreeMap<CityKey, FetchState<T>>>;

/// Proof of having started a fetch; resolutions through it are dropped once
/// a newer fetch for the same key has begun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CityKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &CityKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Inner<T> {
    slots: Snapshot<T>,
    generations: HashMap<CityKey, u64>,
}

pub struct StateStore<T> {
    inner: Mutex<Inner<T>>,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T: Clone> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> StateStore<T> {
    pub fn new() -> Self {
        let slots: Snapshot<T> = Arc::new(BTreeMap::new());
        let (tx, _rx) = watch::channel(slots.clone());
        Self {
            inner: Mutex::new(Inner {
                slots,
                generations: HashMap::new(),
            }),
            tx,
        }
    }

    /// Mark `key` as Pending, overwriting whatever was there.
    pub fn begin_fetch(&self, key: CityKey) -> FetchTicket {
        let mut inner = self.inner.lock();
        let generation = {
            let counter = inner.generations.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        self.publish(&mut inner, key.clone(), FetchState::Pending);
        FetchTicket { key, generation }
    }

    /// Last-write-wins success for `key`.
    pub fn resolve_success(&self, key: CityKey, payload: T) {
        let mut inner = self.inner.lock();
        self.publish(&mut inner, key, FetchState::Success(payload));
    }

    /// Last-write-wins error for `key`.
    pub fn resolve_error(&self, key: CityKey, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        self.publish(&mut inner, key, FetchState::Error(message.into()));
    }

    /// Resolve the fetch behind `ticket`. Returns false and leaves the slot
    /// untouched if a newer fetch for the same key has started since.
    pub fn complete(&self, ticket: &FetchTicket, result: Result<T, String>) -> bool {
        let mut inner = self.inner.lock();
        let latest = inner.generations.get(&ticket.key).copied().unwrap_or(0);
        if latest != ticket.generation {
            tracing::debug!(
                "Dropping stale result for {} (generation {}, latest {})",
                ticket.key,
                ticket.generation,
                latest
            );
            return false;
        }

        let state = match result {
            Ok(payload) => FetchState::Success(payload),
            Err(message) => FetchState::Error(message),
        };
        self.publish(&mut inner, ticket.key.clone(), state);
        true
    }

    /// Current mapping, including pending slots.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.inner.lock().slots.clone()
    }

    pub fn get(&self, key: &CityKey) -> Option<FetchState<T>> {
        self.inner.lock().slots.get(key).cloned()
    }

    /// Receiver that yields the full mapping after every write.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    fn publish(&self, inner: &mut Inner<T>, key: CityKey, state: FetchState<T>) {
        Arc::make_mut(&mut inner.slots).insert(key, state);
        // send_replace keeps the value even with no receivers attached
        self.tx.send_replace(inner.slots.clone());
    }
}
