use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::events::HubEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full and the oldest sheddable event made room.
    EvictedOldest,
    /// The queue was full and the incoming event was itself sheddable.
    Dropped,
    /// A critical event found no room; the queue is now closed.
    Overflowed,
    /// The queue was already closed.
    Closed,
}

struct State {
    events: VecDeque<HubEvent>,
    closed: bool,
}

/// Bounded single-consumer outbound buffer of one session.
pub struct SessionQueue {
    state: Mutex<State>,
    notify: Notify,
    capacity: usize,
}

impl SessionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                events: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: HubEvent) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.events.len() < self.capacity {
                state.events.push_back(event);
                PushOutcome::Queued
            } else if let Some(pos) = state.events.iter().position(|e| !e.is_critical()) {
                state.events.remove(pos);
                state.events.push_back(event);
                PushOutcome::EvictedOldest
            } else if !event.is_critical() {
                return PushOutcome::Dropped;
            } else {
                state.closed = true;
                state.events.clear();
                PushOutcome::Overflowed
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Waits for the next event. `None` once the queue is closed; pending
    /// events of a closed queue are discarded.
    pub async fn recv(&self) -> Option<HubEvent> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
