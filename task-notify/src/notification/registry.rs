//! Registry of live subscribers.
//!
//! Connect/disconnect handlers mutate the registry while broadcasts read it.
//! `DashMap` shards its locks, so a snapshot only holds one shard at a time
//! and never blocks an unrelated add or remove for longer than that.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque session identifier for a live subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a frame could not be handed to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's outbound queue is full.
    Full,
    /// The connection task is gone.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "send queue full"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

/// Handle to a connected live client.
///
/// Cloning shares the same outbound queue; the connection task owns the
/// receiving half returned by [`Subscriber::channel`].
#[derive(Clone, Debug)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Arc<str>>,
}

impl Subscriber {
    /// Create a subscriber with a bounded outbound queue.
    pub fn channel(id: SubscriberId, capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Queue a frame without waiting on the client.
    pub fn deliver(&self, frame: Arc<str>) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Set of currently connected subscribers.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    subscribers: DashMap<SubscriberId, Subscriber>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Returns `false` if a subscriber with the same id is already present;
    /// the existing registration is kept.
    pub fn add(&self, subscriber: Subscriber) -> bool {
        match self.subscribers.entry(subscriber.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(subscriber);
                true
            }
        }
    }

    /// Deregister a subscriber. No-op if absent.
    pub fn remove(&self, id: &SubscriberId) -> Option<Subscriber> {
        self.subscribers.remove(id).map(|(_, subscriber)| subscriber)
    }

    /// Subscribers registered at the time of the call.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
