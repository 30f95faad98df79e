//! Subscriber registry and event fan-out.
//!
//! Each subscriber owns a bounded queue fed by the broker with `try_send`.
//! A full queue closes that subscriber alone; delivery of `ExitCode` closes
//! the stream after the event. Slow consumers never stall the broker, the
//! terminal model, or other subscribers.

use super::event::{Event, EventKind, EventKindSet};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Bounded delivery queue depth per subscriber
pub const SUBSCRIBER_QUEUE_SIZE: usize = 1024;

/// A registered interest in a subset of event kinds
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub kinds: EventKindSet,
    events: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Next event, in broker emission order. `None` after `ExitCode` has
    /// been delivered or the session ended.
    pub async fn next(&mut self) -> Option<Event> {
        self.events.recv().await
    }
}

struct SubscriberSlot {
    id: Uuid,
    kinds: EventKindSet,
    tx: mpsc::Sender<Event>,
}

/// The broker-owned set of subscriber slots
pub(crate) struct SubscriberSet {
    slots: Vec<SubscriberSlot>,
    queue_size: usize,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::with_queue_size(SUBSCRIBER_QUEUE_SIZE)
    }

    pub fn with_queue_size(queue_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            queue_size,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Register a subscriber. `catch_up` events are queued ahead of live
    /// traffic without kind filtering (the broker already filtered them).
    /// When `closed` is set the slot is not retained: the subscriber sees
    /// the catch-up events and then end-of-stream.
    pub fn subscribe(
        &mut self,
        kinds: EventKindSet,
        catch_up: Vec<Event>,
        closed: bool,
    ) -> Subscription {
        let (tx, events) = mpsc::channel(self.queue_size.max(catch_up.len().max(1)));
        let id = Uuid::new_v4();
        for event in catch_up {
            let _ = tx.try_send(event);
        }
        if !closed {
            self.slots.push(SubscriberSlot { id, kinds, tx });
        }
        Subscription { id, kinds, events }
    }

    /// Fan an event out to every interested subscriber.
    ///
    /// Returns the ids of subscribers dropped because their queue was full.
    /// Subscribers that received an `ExitCode` are closed afterwards; ones
    /// that went away are pruned silently.
    pub fn broadcast(&mut self, event: &Event) -> Vec<Uuid> {
        let kind = event.kind();
        let mut overrun = Vec::new();

        self.slots.retain(|slot| {
            if !slot.kinds.contains(kind) {
                return true;
            }
            match slot.tx.try_send(event.clone()) {
                Ok(()) => kind != EventKind::ExitCode,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    overrun.push(slot.id);
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });

        overrun
    }

    /// Close every subscriber stream
    pub fn close_all(&mut self) {
        self.slots.clear();
    }
}
