use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Event, PropertyId};

const CHANNEL_CAPACITY: usize = 256;

/// Per-property broadcast of committed changes, for calendar views that
/// want to refresh blocked dates without polling.
pub struct NotifyHub {
    channels: DashMap<PropertyId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a property's changes. Creates the channel if needed.
    pub fn subscribe(&self, property_id: PropertyId) -> broadcast::Receiver<Event> {
        self.channels
            .entry(property_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening. Channels whose last listener has gone
    /// are dropped here.
    pub fn send(&self, property_id: PropertyId, event: &Event) {
        let orphaned = match self.channels.get(&property_id) {
            Some(sender) => sender.send(event.clone()).is_err(),
            None => return,
        };
        if orphaned {
            self.channels
                .remove_if(&property_id, |_, sender| sender.receiver_count() == 0);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
