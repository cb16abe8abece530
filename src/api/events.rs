//! Realtime rental status feed (server-sent events)

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};

use crate::AppState;

/// SSE event name carrying a `LifecycleEvent`
pub const STATUS_EVENT: &str = "rental_status";

/// Subscribe to lifecycle events
#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "events",
    responses(
        (status = 200, description = "text/event-stream of lifecycle events")
    )
)]
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.services.events.subscribe()).filter_map(|message| {
        match message {
            Ok(event) => match Event::default().event(STATUS_EVENT).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::warn!(rental_id = %event.rental_id, error = %e, "Could not encode event");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Realtime subscriber lagging, events dropped");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
