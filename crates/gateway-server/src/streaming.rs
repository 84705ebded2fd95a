//! Streaming Engine — drives a canonical [`StreamEvent`] sequence through a
//! client schema's [`SseTranslator`] and out as an Axum SSE response.
//!
//! A credential's `use_count` is incremented by
//! [`gateway_router::AccountSelector::with_credential`] the moment the
//! upstream stream is established, independent of how much of it the client
//! goes on to consume. Cancellation (the client disconnecting mid-stream)
//! needs no dedicated machinery beyond that: dropping the Axum response
//! future drops the underlying event stream, which drops the upstream HTTP
//! body — Rust's ordinary `Drop` chain closes the upstream connection
//! without the gateway having to track or cancel anything explicitly.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use gateway_core::events::StreamEvent;
use gateway_router::provider::StreamEventStream;
use tracing::warn;

use crate::schemas::SseTranslator;

/// Wrap a canonical event stream in a schema's [`SseTranslator`] and return
/// the resulting Axum SSE response.
pub fn sse_response<T>(events: StreamEventStream, mut translator: T) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: SseTranslator + Send + 'static,
{
    let frames = async_stream::stream! {
        futures::pin_mut!(events);
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "upstream stream error, emitting synthetic error event");
                    StreamEvent::Error { error: err.to_string() }
                }
            };
            for frame in translator.translate(&event) {
                yield frame;
            }
        }
        for frame in translator.finalize() {
            yield frame;
        }
    };

    let sse_events = frames.map(|frame| {
        let data = frame.data.to_string();
        Ok(match frame.event {
            Some(name) => Event::default().event(name).data(data),
            None => Event::default().data(data),
        })
    });

    Sse::new(sse_events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
