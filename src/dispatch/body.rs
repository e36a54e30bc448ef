//! Request body held across attempts.
//!
//! Bodies up to the replay limit are buffered once and cloned per attempt.
//! Anything larger, or of unknown length that turns out larger, is streamed
//! to a single origin and cannot be retried.

use axum::body::{Body, Bytes, HttpBody};
use axum::http::header;
use axum::http::request::Parts;
use futures_util::{stream, StreamExt};

pub(crate) enum ReplayBody {
    /// Fully buffered; every attempt gets a copy.
    Buffered(Bytes),
    /// Streamed once; `None` after the first attempt took it.
    Streaming(Option<Body>),
}

impl ReplayBody {
    /// Buffer `body` for replay unless it is larger than `limit` bytes.
    ///
    /// Never fails: read errors are handed on to the origin client, which
    /// reports them as a transport failure of the single attempt.
    pub(crate) async fn read(head: &Parts, body: Body, limit: usize) -> Self {
        if declared_length(head, &body).is_some_and(|len| len > limit as u64) {
            return ReplayBody::Streaming(Some(body));
        }

        let mut data = body.into_data_stream();
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut size = 0usize;

        while let Some(next) = data.next().await {
            match next {
                Ok(chunk) => {
                    size += chunk.len();
                    chunks.push(chunk);
                    if size > limit {
                        let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                        return ReplayBody::Streaming(Some(Body::from_stream(read.chain(data))));
                    }
                }
                Err(e) => {
                    let read = chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(e)))
                        .collect::<Vec<Result<Bytes, axum::Error>>>();
                    return ReplayBody::Streaming(Some(Body::from_stream(stream::iter(read))));
                }
            }
        }

        let bytes = match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.swap_remove(0),
            _ => chunks.concat().into(),
        };
        ReplayBody::Buffered(bytes)
    }

    pub(crate) fn is_replayable(&self) -> bool {
        matches!(self, ReplayBody::Buffered(_))
    }

    /// Whether another attempt can still be given a body.
    pub(crate) fn is_available(&self) -> bool {
        match self {
            ReplayBody::Buffered(_) => true,
            ReplayBody::Streaming(body) => body.is_some(),
        }
    }

    /// Body for the next attempt.
    ///
    /// A streamed body is only ever used once; the dispatcher refuses a
    /// retry once it is gone, so the empty fallback is never forwarded.
    pub(crate) fn for_attempt(&mut self) -> Body {
        match self {
            ReplayBody::Buffered(bytes) => Body::from(bytes.clone()),
            ReplayBody::Streaming(body) => body.take().unwrap_or_default(),
        }
    }
}

/// Body length from `Content-Length`, else from the body's exact size hint.
fn declared_length(head: &Parts, body: &Body) -> Option<u64> {
    head.headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| body.size_hint().exact())
}
