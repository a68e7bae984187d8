use crate::coordinator::LedgerEvent;
use findmyseat_shared::WireEvent;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Subscriber groups, by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Operator,
    Occupant,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Operator => write!(f, "operator"),
            Group::Occupant => write!(f, "occupant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    group: Group,
    id: u64,
}

impl SubscriptionId {
    pub fn group(&self) -> Group {
        self.group
    }
}

/// What a subscriber's queue carries.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Event(Arc<WireEvent>),
    Heartbeat,
}

/// A live subscription. Dropping the receiver is enough to leave the group;
/// the hub notices on its next write.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::Receiver<HubMessage>,
}

type Sinks = HashMap<u64, mpsc::Sender<HubMessage>>;

/// Fan-out of ledger changes to live subscribers.
///
/// Each subscriber owns a bounded queue. Writes never wait: a subscriber
/// whose queue is full or closed is dropped from its group. There is no
/// replay; late joiners re-read the seat list.
pub struct BroadcastHub {
    operators: RwLock<Sinks>,
    occupants: RwLock<Sinks>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            operators: RwLock::new(HashMap::new()),
            occupants: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    fn sinks(&self, group: Group) -> &RwLock<Sinks> {
        match group {
            Group::Operator => &self.operators,
            Group::Occupant => &self.occupants,
        }
    }

    pub fn subscribe(&self, group: Group) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sinks(group).write().insert(id, tx);
        debug!("New {} subscriber {}", group, id);
        Subscription {
            id: SubscriptionId { group, id },
            receiver,
        }
    }

    /// Safe to call more than once, or after the hub already dropped the sink.
    pub fn unsubscribe(&self, handle: SubscriptionId) {
        if self.sinks(handle.group).write().remove(&handle.id).is_some() {
            debug!("{} subscriber {} left", handle.group, handle.id);
        }
    }

    pub fn subscriber_count(&self, group: Group) -> usize {
        self.sinks(group).read().len()
    }

    /// Delivers `event` to every member of `group`. Returns how many accepted it.
    pub fn publish(&self, group: Group, event: WireEvent) -> usize {
        self.deliver(group, HubMessage::Event(Arc::new(event)))
    }

    /// Sends a keep-alive marker to every subscriber in both groups.
    pub fn heartbeat(&self) {
        self.deliver(Group::Operator, HubMessage::Heartbeat);
        self.deliver(Group::Occupant, HubMessage::Heartbeat);
    }

    fn deliver(&self, group: Group, message: HubMessage) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (id, sink) in self.sinks(group).read().iter() {
            match sink.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(*id),
            }
        }

        if !dead.is_empty() {
            let mut sinks = self.sinks(group).write();
            for id in dead {
                sinks.remove(&id);
                debug!("Dropped {} subscriber {} (closed or lagging)", group, id);
            }
        }

        delivered
    }

    /// Routes one committed ledger change to both groups.
    pub fn dispatch(&self, event: &LedgerEvent) {
        let delta = WireEvent::SeatDelta { delta: event.delta.clone() };
        self.publish(Group::Occupant, delta.clone());
        self.publish(Group::Operator, delta);
        self.publish(Group::Operator, WireEvent::AnalyticsUpdate { analytics: event.occupancy });
    }

    /// Drains the coordinator's outbound channel until every sender is gone.
    pub async fn relay(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<LedgerEvent>) {
        info!("Broadcast relay started");
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        info!("Broadcast relay stopped");
    }
}
