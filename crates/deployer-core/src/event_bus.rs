//! Broadcast channel for lifecycle events.

use deployer_types::LifecycleEvent;
use tokio::sync::broadcast;

/// Fan-out bus carrying [`LifecycleEvent`]s to every subscriber.
///
/// Publishing never blocks. Slow subscribers lag and miss events rather than
/// holding up the status machine.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Returns a receiver for events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}

	/// Publishes `event`. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: LifecycleEvent,
	) -> Result<usize, broadcast::error::SendError<LifecycleEvent>> {
		self.sender.send(event)
	}
}
