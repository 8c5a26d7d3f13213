//! In-process event bus carrying validated webhook deliveries to entities.

// crates.io
use tokio::sync::broadcast;
// self
use crate::{_prelude::*, auth::ClientId, model::WebhookPayload};

/// Event type under which webhook deliveries are republished.
pub const BOUNCIE_EVENT: &str = "bouncie_webhook";

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Webhook delivery accepted for a registered client.
#[derive(Clone, Debug, PartialEq)]
pub struct BouncieEvent {
	/// Client identifier that authorized the delivery.
	pub client_id: ClientId,
	/// Validated payload.
	pub payload: WebhookPayload,
}
impl BouncieEvent {
	/// Event type label, always [`BOUNCIE_EVENT`].
	pub const fn event_type(&self) -> &'static str {
		BOUNCIE_EVENT
	}

	/// Flat JSON event data: the payload fields plus `client_id`.
	pub fn data(&self) -> serde_json::Value {
		self.payload.to_event_data(&self.client_id)
	}
}

/// Broadcast bus shared by the webhook endpoint and every loaded entry.
///
/// Slow subscribers lose the oldest events instead of blocking publishers.
#[derive(Clone, Debug)]
pub struct EventBus {
	sender: broadcast::Sender<Arc<BouncieEvent>>,
}
impl EventBus {
	/// Creates a bus with the default per-subscriber capacity.
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
	}

	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn with_capacity(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));

		Self { sender }
	}

	/// Publishes an event, returning how many subscribers will see it.
	pub fn publish(&self, event: BouncieEvent) -> usize {
		tracing::debug!(
			event_type = BOUNCIE_EVENT,
			kind = %event.payload.event_type,
			vin = %event.payload.vin,
			"Firing event."
		);

		// No receivers is not an error; the event is simply dropped.
		self.sender.send(Arc::new(event)).unwrap_or(0)
	}

	/// Subscribes to every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Arc<BouncieEvent>> {
		self.sender.subscribe()
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}
impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn event(vin: &str) -> BouncieEvent {
		BouncieEvent {
			client_id: ClientId::new("spam-eggs").expect("Client identifier should be valid."),
			payload: WebhookPayload::from_value(
				json!({ "eventType": "connect", "imei": "1", "vin": vin }),
			)
			.expect("Payload should validate."),
		}
	}

	#[test]
	fn publish_without_subscribers_is_dropped() {
		let bus = EventBus::new();

		assert_eq!(bus.publish(event("A")), 0);
	}

	#[tokio::test]
	async fn subscribers_receive_events_in_order() {
		let bus = EventBus::new();
		let mut rx = bus.subscribe();

		assert_eq!(bus.subscriber_count(), 1);
		assert_eq!(bus.publish(event("A")), 1);
		assert_eq!(bus.publish(event("B")), 1);

		let first = rx.recv().await.expect("First event should arrive.");
		let second = rx.recv().await.expect("Second event should arrive.");

		assert_eq!(first.payload.vin, "A");
		assert_eq!(second.payload.vin, "B");
		assert_eq!(first.event_type(), BOUNCIE_EVENT);
		assert_eq!(first.data()["client_id"], json!("spam-eggs"));
	}
}
