use crate::process::ProcessId;
use crate::runtime::RuntimeState;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

/// Notifications raised by the supervisor and the transport adapters
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The game render host exited; `unexpected` is true for crashes
    ProcessExited { pid: ProcessId, unexpected: bool },
    /// A call on the runtime channel failed in a way that presumes the remote dead
    ProcessHung { pid: ProcessId },
    /// The game process announced that it is shutting itself down
    RuntimeExiting { pid: ProcessId },
    /// The game process reported a lifecycle phase change
    RuntimeStateChanged { pid: ProcessId, state: RuntimeState },
}

/// Fan-out of [`HostEvent`]s to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: HostEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(event = ?event, "No subscribers for host event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }
}

/// Something that must react synchronously when a supervised process dies
pub trait ExitHook: Send + Sync {
    fn on_process_exited(&self, pid: ProcessId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(HostEvent::ProcessHung { pid: ProcessId(7) });

        assert_eq!(
            first.recv().await.unwrap(),
            HostEvent::ProcessHung { pid: ProcessId(7) }
        );
        assert_eq!(
            second.recv().await.unwrap(),
            HostEvent::ProcessHung { pid: ProcessId(7) }
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(HostEvent::RuntimeExiting { pid: ProcessId(1) });
    }
}
