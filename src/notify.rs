use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Typed broadcast channel. Components publish here instead of relying on
/// a shared event tree; anyone interested subscribes directly.
pub struct Notifier<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Notifier<T> {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: T) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
