//! WebSocket event stream for dashboards
//!
//! Pushes lifecycle events as JSON text frames. Tenant callers only ever
//! receive their own tenant's events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::events::{EventMessage, SharedEventBus};
use crate::application::AccessScope;
use crate::interfaces::http::common::ApiError;
use crate::interfaces::http::middleware::Caller;
use crate::interfaces::http::state::AppState;

/// Query parameters narrowing the stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    /// Platform callers only; tenant callers are pinned to their tenant
    pub tenant_id: Option<Uuid>,
    pub reservation_id: Option<Uuid>,
    /// Comma-separated event types, e.g. `payment_status_changed,settlement_created`
    pub event_types: Option<String>,
}

impl EventFilter {
    /// Pin the filter to the caller's tenant
    pub fn scoped(mut self, scope: AccessScope) -> Result<Self, ApiError> {
        if let AccessScope::Tenant(own) = scope {
            if let Some(requested) = self.tenant_id {
                scope.check(requested)?;
            }
            self.tenant_id = Some(own);
        }
        Ok(self)
    }

    pub fn matches(&self, message: &EventMessage) -> bool {
        let event = &message.event;
        if self.tenant_id.is_some_and(|t| t != event.tenant_id()) {
            return false;
        }
        if self.reservation_id.is_some_and(|r| r != event.reservation_id()) {
            return false;
        }
        match &self.event_types {
            Some(types) => types
                .split(',')
                .map(str::trim)
                .any(|t| t == event.event_type()),
            None => true,
        }
    }
}

/// `GET /api/v1/events/ws`
pub async fn ws_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(filter): Query<EventFilter>,
) -> Result<Response, ApiError> {
    let filter = filter.scoped(caller.scope)?;
    info!(caller = %caller.name, ?filter, "Event stream connection");

    let event_bus = state.engine.event_bus().clone();
    Ok(ws
        .on_upgrade(move |socket| stream_events(socket, event_bus, filter))
        .into_response())
}

async fn stream_events(socket: WebSocket, event_bus: SharedEventBus, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriber = event_bus.subscribe();

    let hello = serde_json::json!({
        "type": "connected",
        "filter": {
            "tenant_id": filter.tenant_id,
            "reservation_id": filter.reservation_id,
            "event_types": filter.event_types,
        }
    });
    if let Err(e) = sender.send(Message::Text(hello.to_string().into())).await {
        error!(error = %e, "Failed to greet event stream client");
        return;
    }

    loop {
        select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(error = %e, "Event stream socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },

            event = subscriber.recv() => {
                let Some(message) = event else {
                    warn!("Event bus closed");
                    break;
                };
                if !filter.matches(&message) {
                    continue;
                }
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                        debug!(event_type = message.event.event_type(), "Event pushed");
                    }
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }

    info!("Event stream client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{Event, ReservationStatusChangedEvent};
    use crate::domain::ReservationStatus;

    fn message(tenant_id: Uuid, reservation_id: Uuid) -> EventMessage {
        EventMessage::new(Event::ReservationStatusChanged(ReservationStatusChangedEvent {
            reservation_id,
            tenant_id,
            from: ReservationStatus::Active,
            to: ReservationStatus::Completed,
            storage_id: None,
        }))
    }

    #[test]
    fn tenant_scope_is_forced() {
        let own = Uuid::new_v4();
        let filter = EventFilter::default().scoped(AccessScope::Tenant(own)).unwrap();
        assert!(filter.matches(&message(own, Uuid::new_v4())));
        assert!(!filter.matches(&message(Uuid::new_v4(), Uuid::new_v4())));

        let foreign = EventFilter {
            tenant_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(foreign.scoped(AccessScope::Tenant(own)).is_err());
    }

    #[test]
    fn event_type_list_filters() {
        let tenant = Uuid::new_v4();
        let filter = EventFilter {
            event_types: Some("payment_status_changed, reservation_status_changed".into()),
            ..Default::default()
        };
        assert!(filter.matches(&message(tenant, Uuid::new_v4())));

        let other = EventFilter {
            event_types: Some("settlement_created".into()),
            ..Default::default()
        };
        assert!(!other.matches(&message(tenant, Uuid::new_v4())));
    }

    #[test]
    fn reservation_filter() {
        let tenant = Uuid::new_v4();
        let reservation = Uuid::new_v4();
        let filter = EventFilter {
            reservation_id: Some(reservation),
            ..Default::default()
        };
        assert!(filter.matches(&message(tenant, reservation)));
        assert!(!filter.matches(&message(tenant, Uuid::new_v4())));
    }
}
