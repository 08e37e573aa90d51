//! Broadcast bus for lifecycle events
//!
//! Publishing never blocks and never fails: with nobody listening the event
//! is dropped. Slow subscribers skip what they missed rather than stall
//! the engine.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{Event, EventMessage};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: Event) {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();
        metrics::counter!("kyradi_events_published_total", "event_type" => event_type).increment(1);

        let delivered = self.sender.send(message).unwrap_or(0);
        debug!(event_type, delivered, "Event published");
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let subscriber = EventSubscriber {
            receiver: self.sender.subscribe(),
        };
        debug!(subscribers = self.subscriber_count(), "Event subscriber attached");
        subscriber
    }

    /// Live subscribers (dropped ones are not counted)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
}

impl EventSubscriber {
    /// Next event, or `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::events::{PaymentStatusChangedEvent, ReservationStatusChangedEvent};
    use crate::domain::{PaymentMode, PaymentStatus, ReservationStatus};
    use uuid::Uuid;

    fn cancelled(tenant_id: Uuid) -> Event {
        Event::ReservationStatusChanged(ReservationStatusChangedEvent {
            reservation_id: Uuid::new_v4(),
            tenant_id,
            from: ReservationStatus::Reserved,
            to: ReservationStatus::Cancelled,
            storage_id: None,
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let tenant = Uuid::new_v4();

        bus.publish(cancelled(tenant));

        for subscriber in [&mut first, &mut second] {
            let received = tokio::time::timeout(Duration::from_millis(100), subscriber.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.event.event_type(), "reservation_status_changed");
            assert_eq!(received.event.tenant_id(), tenant);
        }
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        bus.publish(cancelled(Uuid::new_v4()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscribers_are_not_counted() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let _second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let bus = EventBus::with_capacity(2);
        let mut subscriber = bus.subscribe();
        let tenant = Uuid::new_v4();
        for _ in 0..4 {
            bus.publish(cancelled(tenant));
        }
        let payment_id = Uuid::new_v4();
        bus.publish(Event::PaymentStatusChanged(PaymentStatusChangedEvent {
            payment_id,
            reservation_id: Uuid::new_v4(),
            tenant_id: tenant,
            mode: PaymentMode::Cash,
            from: Some(PaymentStatus::Pending),
            to: PaymentStatus::Paid,
        }));

        let mut last = None;
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_millis(20), subscriber.recv()).await
        {
            last = Some(message);
        }
        assert_eq!(last.unwrap().event.event_type(), "payment_status_changed");
    }
}
