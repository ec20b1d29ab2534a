use tokio::sync::broadcast;

/// Capacity of the lifecycle event channel.
const LIFECYCLE_CAPACITY: usize = 16;

/// A host application lifecycle transition.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LifecycleEvent {
    /// The host is about to be suspended (for example, moved to the background).
    Suspended,
    /// The host has resumed.
    Resumed,
}

/// A source of host lifecycle events.
///
/// The host notifies transitions on a `Lifecycle` and every
/// [`Pinger`](crate::Pinger) built with it reacts to them. Hosts without a
/// notion of suspension never notify and the pinger is unaffected.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self { tx }
    }

    /// Notify that the host is being suspended.
    pub fn suspended(&self) {
        self.notify(LifecycleEvent::Suspended);
    }

    /// Notify that the host has resumed.
    pub fn resumed(&self) {
        self.notify(LifecycleEvent::Resumed);
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    fn notify(&self, event: LifecycleEvent) {
        // no subscribers is not an error
        if self.tx.send(event).is_err() {
            tracing::trace!(?event, "no lifecycle subscribers");
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
