use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use vr_core::events::LiveEvent;

use crate::state::AppState;

fn to_sse(event: &LiveEvent) -> Option<Event> {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(err) => {
            warn!(kind = event.kind(), error = %err, "dropping unencodable live event");
            None
        }
    }
}

/// Streams `analysis_created` and `tally_changed` events. Slow clients skip
/// what they missed rather than stall the bus.
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(state.events.subscribe()).filter_map(|received| match received {
        Ok(event) => to_sse(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "live subscriber lagged");
            None
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
