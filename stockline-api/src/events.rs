use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events", get(stream_events))
}

#[derive(Debug, Deserialize)]
struct EventFilter {
    order_id: Option<String>,
}

/// Committed fulfillment events as server-sent events, optionally for one order.
async fn stream_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        // Lagged receivers skip what they missed.
        let event = result.ok()?;
        if let Some(order_id) = &filter.order_id {
            if event.order_id() != order_id {
                return None;
            }
        }
        Event::default()
            .event(event.kind())
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
