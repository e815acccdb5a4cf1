use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use events::Message;
use futures::{Stream, StreamExt};
use log::*;
use serde_json::Value;
use service::AppState;
use std::convert::Infallible;

/// GET a long-lived stream of every message broadcast by the hub
#[utoipa::path(
    get,
    path = "/notifications/stream",
    responses(
        (status = 200, description = "Server-sent event stream of notifications", content_type = "text/event-stream"),
    )
)]
pub(crate) async fn notification_stream(
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Cancelled when the client goes away (stream dropped) or the server shuts down.
    let cancel = app_state.shutdown.child_token();
    let mut subscription = app_state.hub.subscribe(cancel.clone());
    let subscriber_id = subscription.id();

    debug!("Establishing SSE connection for subscriber {subscriber_id}");

    let stream = stream! {
        let _cancel_on_drop = cancel.drop_guard();

        while let Some(message) = subscription.next().await {
            match to_event(&message) {
                Ok(event) => yield Ok(event),
                Err(e) => error!(
                    "Failed to serialize message {} for subscriber {subscriber_id}: {e}",
                    message.id()
                ),
            }
        }

        debug!("SSE connection closed for subscriber {subscriber_id}");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Frame a message as one SSE record: `id`, optional `event`, JSON `data`.
pub(crate) fn to_event(message: &Message<Value>) -> Result<Event, axum::Error> {
    let mut event = Event::default();

    // Event field setters panic on line breaks, which would end the record early anyway.
    if is_single_line(message.id()) {
        event = event.id(message.id());
    } else {
        warn!("Message id {:?} contains a line break, sent without id", message.id());
    }

    if let Some(event_type) = message.event_type() {
        if is_single_line(event_type) {
            event = event.event(event_type);
        } else {
            warn!(
                "Event type {event_type:?} of message {} contains a line break, sent without event type",
                message.id()
            );
        }
    }

    event.json_data(message.payload())
}

fn is_single_line(value: &str) -> bool {
    !value.contains(['\n', '\r'])
}
