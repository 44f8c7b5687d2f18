//! Event source contract
//!
//! Renderers bootstrap from `all`/`latest` and stay current through an
//! `observe` subscription. A subscription ends when the producer drops its
//! sender; the receiving side sees `None` from `recv()` and treats it as a
//! permanent stop. Reconnecting is the source's business, not the renderer's.
//!
//! [`MemorySource`] keeps a bounded per-topic history in memory and fans
//! published events out to topic-filtered subscribers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use types::events::{Event, Topic};

/// Errors returned by an event source fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("no events available for topic {0}")]
    Empty(Topic),

    #[error("event source unreachable: {0}")]
    Unreachable(String),
}

/// Upstream provider of domain events.
pub trait EventSource: Send + Sync {
    /// Most recent event published on `topic`.
    fn latest(&self, topic: Topic) -> Result<Event, SourceError>;

    /// Every retained event published on `topic`, oldest first.
    fn all(&self, topic: Topic) -> Result<Vec<Event>, SourceError>;

    /// Subscribe to events on `topics`. An empty filter subscribes to every topic.
    fn observe(&self, topics: &[Topic]) -> mpsc::Receiver<Event>;
}

/// Configuration for the in-memory event source.
#[derive(Debug, Clone)]
pub struct MemorySourceConfig {
    /// Events retained per topic for `all`/`latest`.
    pub history_per_topic: usize,
    /// Buffered events per subscriber before new events are dropped.
    pub subscriber_capacity: usize,
}

impl Default for MemorySourceConfig {
    fn default() -> Self {
        Self {
            history_per_topic: 100,
            subscriber_capacity: 100,
        }
    }
}

struct Subscriber {
    topics: Vec<Topic>,
    tx: mpsc::Sender<Event>,
}

impl Subscriber {
    fn wants(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }
}

#[derive(Default)]
struct Inner {
    history: HashMap<Topic, VecDeque<Event>>,
    subscribers: Vec<Subscriber>,
    closed: bool,
}

/// In-memory event source with bounded history and fan-out subscriptions.
pub struct MemorySource {
    inner: Mutex<Inner>,
    config: MemorySourceConfig,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
}

impl MemorySource {
    pub fn new(config: MemorySourceConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MemorySourceConfig::default())
    }

    /// Create a source whose history is primed with `events`.
    ///
    /// Seeded events are not delivered to subscribers.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let source = Self::with_defaults();
        {
            let mut inner = source.lock();
            for event in events {
                source.remember(&mut inner, event);
            }
        }
        source
    }

    /// Record an event and deliver it to every matching subscriber.
    pub fn publish(&self, event: Event) {
        let mut inner = self.lock();
        if inner.closed {
            debug!(event_id = %event.event_id, "Source closed, discarding event");
            return;
        }

        let topic = event.topic();
        self.remember(&mut inner, event.clone());
        self.events_published.fetch_add(1, Ordering::Relaxed);

        inner.subscribers.retain(|subscriber| {
            if !subscriber.wants(topic) {
                return true;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.events_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(topic = %topic, "Subscriber lagging, event dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(topic = %topic, "Subscriber gone, removing");
                    false
                }
            }
        });
    }

    /// End every subscription. Later publishes are discarded.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Events not delivered because a subscriber's buffer was full.
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    fn remember(&self, inner: &mut Inner, event: Event) {
        let history = inner.history.entry(event.topic()).or_default();
        if history.len() >= self.config.history_per_topic {
            history.pop_front();
        }
        history.push_back(event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EventSource for MemorySource {
    fn latest(&self, topic: Topic) -> Result<Event, SourceError> {
        self.lock()
            .history
            .get(&topic)
            .and_then(|events| events.back().cloned())
            .ok_or(SourceError::Empty(topic))
    }

    fn all(&self, topic: Topic) -> Result<Vec<Event>, SourceError> {
        match self.lock().history.get(&topic) {
            Some(events) if !events.is_empty() => Ok(events.iter().cloned().collect()),
            _ => Err(SourceError::Empty(topic)),
        }
    }

    fn observe(&self, topics: &[Topic]) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity.max(1));
        let mut inner = self.lock();
        if !inner.closed {
            inner.subscribers.push(Subscriber {
                topics: topics.to_vec(),
                tx,
            });
        }
        rx
    }
}
