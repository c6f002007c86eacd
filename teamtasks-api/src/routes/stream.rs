/// Server-Sent Events for live subscriptions
///
/// A subscription becomes an SSE stream whose first event is the current
/// snapshot, followed by one event per change. Each event carries the whole
/// snapshot as JSON under a fixed event name.
///
/// ```text
/// event: tasks
/// data: [{"id":"...","title":"Ship report","completed":false,...}]
/// ```
///
/// The stream ends when the client disconnects, which drops and thereby
/// releases the underlying subscription.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;

/// Interval between keep-alive comments
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Wraps a snapshot stream as an SSE response
pub fn sse<S, T>(snapshots: S, event_name: &'static str) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize,
{
    let events = snapshots.map(move |snapshot| Ok(snapshot_event(event_name, &snapshot)));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn snapshot_event<T: Serialize>(event_name: &'static str, snapshot: &T) -> Event {
    match Event::default().event(event_name).json_data(snapshot) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, event = event_name, "Failed to serialize snapshot");
            Event::default().event("error").data("snapshot could not be serialized")
        }
    }
}
