//! HTTP handlers for the Pharmaceutical Inventory Tracker

pub mod batch;
pub mod forecast;
pub mod health;
pub mod product;
pub mod reporting;
pub mod snapshot;
pub mod usage;

pub use batch::*;
pub use forecast::*;
pub use health::*;
pub use product::*;
pub use reporting::*;
pub use snapshot::*;
pub use usage::*;

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::services::narrative::StreamFrame;
use crate::services::NarrativeService;
use crate::AppState;

/// Marker sent as the last data line of a completed stream
pub const DONE_MARKER: &str = "[DONE]";

impl From<StreamFrame> for Event {
    fn from(frame: StreamFrame) -> Self {
        match frame {
            StreamFrame::Token(token) => Event::default().data(token),
            StreamFrame::Done => Event::default().data(DONE_MARKER),
            StreamFrame::Error(message) => Event::default().event("error").data(message),
            StreamFrame::Heartbeat => Event::default().comment("keep-alive"),
        }
    }
}

/// Render relayed narrative frames as server-sent events
pub fn sse_response(
    frames: mpsc::Receiver<StreamFrame>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(ReceiverStream::new(frames).map(|frame| Ok(Event::from(frame))))
}

fn narrative_service(state: &AppState) -> NarrativeService {
    NarrativeService::new(
        state.narrative.clone(),
        Duration::from_secs(state.config.narrative.heartbeat_secs),
    )
}
