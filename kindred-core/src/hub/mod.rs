//! Presence & push hub.
//!
//! A registry maps each user to their live sessions. Every session owns a
//! bounded [`SessionQueue`] drained by the connection task serving it, so a
//! slow client only ever costs its own queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, gauge};

pub mod events;
pub mod presence;
pub mod queue;

pub use events::{HubEvent, MatchRemovedPayload, PresencePayload, ReadReceipt, TypingPayload, WarningPayload};
pub use presence::{PresenceMirror, PresenceService};
pub use queue::{PushOutcome, SessionQueue};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_TYPING_TTL: Duration = Duration::from_secs(6);

/// A live connection's handle on its outbound queue.
pub struct Session {
    id: u64,
    user_id: i64,
    queue: Arc<SessionQueue>,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Events queued and not yet taken.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Next event for this session; `None` once the hub closed it.
    pub async fn next_event(&self) -> Option<HubEvent> {
        self.queue.recv().await
    }
}

pub struct Registration {
    pub session: Session,
    /// No other session of this user was registered.
    pub first: bool,
}

struct Entry {
    id: u64,
    queue: Arc<SessionQueue>,
}

pub struct PushHub {
    sessions: DashMap<i64, Vec<Entry>>,
    typing: DashMap<(i64, i64), u64>,
    next_id: AtomicU64,
    capacity: usize,
    typing_ttl: Duration,
}

impl PushHub {
    pub fn new(capacity: usize, typing_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            typing: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity,
            typing_ttl,
        }
    }

    pub fn register(&self, user_id: i64) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SessionQueue::new(self.capacity));
        let mut entries = self.sessions.entry(user_id).or_default();
        let first = entries.is_empty();
        entries.push(Entry { id, queue: queue.clone() });
        tracing::debug!(user_id, session_id = id, sessions = entries.len(), "hub session registered");
        drop(entries);
        gauge!("hub_sessions").set(self.session_count() as f64);
        Registration {
            session: Session { id, user_id, queue },
            first,
        }
    }

    /// Removes `session`; returns `true` when it was the user's last one.
    pub fn unregister(&self, session: &Session) -> bool {
        session.queue.close();
        let removed = self
            .sessions
            .remove_if_mut(&session.user_id, |_, entries| {
                entries.retain(|e| e.id != session.id);
                entries.is_empty()
            })
            .is_some();
        tracing::debug!(user_id = session.user_id, session_id = session.id, last = removed, "hub session unregistered");
        gauge!("hub_sessions").set(self.session_count() as f64);
        removed
    }

    /// Queues `event` on every live session of each recipient. Returns the
    /// number of sessions that accepted it.
    pub fn publish(&self, recipients: &[i64], event: HubEvent) -> usize {
        let mut delivered = 0;
        for user_id in recipients {
            let Some(entries) = self.sessions.get(user_id) else {
                continue;
            };
            for entry in entries.iter() {
                match entry.queue.push(event.clone()) {
                    PushOutcome::Queued => delivered += 1,
                    PushOutcome::EvictedOldest => {
                        delivered += 1;
                        counter!("hub_events_dropped_total").increment(1);
                    }
                    PushOutcome::Dropped => {
                        counter!("hub_events_dropped_total").increment(1);
                    }
                    PushOutcome::Overflowed => {
                        counter!("hub_sessions_disconnected_total").increment(1);
                        tracing::warn!(
                            user_id = *user_id,
                            session_id = entry.id,
                            event = event.kind(),
                            "session queue overflowed, disconnecting"
                        );
                    }
                    PushOutcome::Closed => {}
                }
            }
        }
        delivered
    }

    /// Closes every session of `user_id`. Their connection tasks unregister
    /// them on the way out.
    pub fn disconnect_user(&self, user_id: i64) -> usize {
        let Some(entries) = self.sessions.get(&user_id) else {
            return 0;
        };
        let mut closed = 0;
        for entry in entries.iter().filter(|e| !e.queue.is_closed()) {
            entry.queue.close();
            closed += 1;
        }
        closed
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.sessions
            .get(&user_id)
            .is_some_and(|entries| entries.iter().any(|e| !e.queue.is_closed()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.iter().map(|entries| entries.len()).sum()
    }

    /// Publishes `typing.start` to `recipient` unless the indicator is already
    /// up, and schedules `typing.stop` after the typing TTL unless another
    /// start or an explicit stop arrives first.
    pub fn typing_start(self: &Arc<Self>, match_id: i64, user_id: i64, recipient: i64) {
        let key = (match_id, user_id);
        let generation = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fresh = self.typing.insert(key, generation).is_none();
        let payload = TypingPayload { match_id, user_id };
        if fresh {
            self.publish(&[recipient], HubEvent::TypingStart(payload));
        }

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(hub.typing_ttl).await;
            if hub.typing.remove_if(&key, |_, g| *g == generation).is_some() {
                hub.publish(&[recipient], HubEvent::TypingStop(payload));
            }
        });
    }

    pub fn typing_stop(&self, match_id: i64, user_id: i64, recipient: i64) {
        if self.typing.remove(&(match_id, user_id)).is_some() {
            self.publish(&[recipient], HubEvent::TypingStop(TypingPayload { match_id, user_id }));
        }
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY, DEFAULT_TYPING_TTL)
    }
}
