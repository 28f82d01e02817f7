//! Broadcast bus for engine events.
//!
//! Components publish [`RouterEvent`]s through a tokio broadcast channel;
//! observers (audit sinks, metrics replay, tests) subscribe independently.
//! Publishing is fire-and-forget: a bus with no subscribers drops events.

use router_types::RouterEvent;
use tokio::sync::broadcast;

pub struct EventBus {
	sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Each subscriber receives every event published after it subscribed.
	pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
		self.sender.subscribe()
	}

	pub fn publish(&self, event: RouterEvent) {
		// No subscribers is not an error.
		let _ = self.sender.send(event);
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self { sender: self.sender.clone() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_types::{RegistryEvent, SourceId, SourceKind};

	#[tokio::test]
	async fn test_subscribers_see_events() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();

		let source = SourceId::new();
		bus.publish(RouterEvent::Registry(RegistryEvent::SourceRegistered {
			source,
			kind: SourceKind::Amm,
			handle: "amm-1".into(),
		}));

		match rx.recv().await.unwrap() {
			RouterEvent::Registry(RegistryEvent::SourceRegistered { source: s, .. }) => {
				assert_eq!(s, source)
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_publish_without_subscribers_is_fine() {
		let bus = EventBus::new(16);
		bus.publish(RouterEvent::Registry(RegistryEvent::SourceDeactivated {
			source: SourceId::new(),
		}));
	}
}
