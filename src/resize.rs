// src/resize.rs
//! Viewport resize notifications.
//!
//! The window publishes sizes as they arrive; subscribers drain them when they are
//! ready to apply one, so a frame never sees half of a resize.
use crate::surface::Bounds;

#[derive(Debug, Default)]
pub struct ResizeHub {
    next_id: u64,
    subscribers: Vec<(u64, flume::Sender<Bounds>)>,
}

#[derive(Debug)]
pub struct ResizeSubscription {
    id: u64,
    receiver: flume::Receiver<Bounds>,
}

impl ResizeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> ResizeSubscription {
        self.next_id += 1;
        let (sender, receiver) = flume::unbounded();
        self.subscribers.push((self.next_id, sender));
        ResizeSubscription { id: self.next_id, receiver }
    }

    /// Sends `bounds` to every live subscriber and forgets the ones that went away.
    pub fn publish(&mut self, bounds: Bounds) {
        self.subscribers.retain(|(id, sender)| {
            let delivered = sender.send(bounds).is_ok();
            if !delivered {
                log::debug!("Dropping resize subscriber {id}");
            }
            delivered
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl ResizeSubscription {
    #[cfg(test)]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The newest pending size, discarding the ones it supersedes.
    pub fn latest(&self) -> Option<Bounds> {
        self.receiver.try_iter().last()
    }

    /// Dropping the subscription disconnects it; the hub notices on its next publish.
    pub fn unsubscribe(self) {
        log::debug!("Resize subscriber {} unsubscribed", self.id);
    }
}
