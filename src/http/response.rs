//! Response instrumentation.
//!
//! # Responsibilities
//! - Track the final status code of a response
//! - Count the bytes written to the client, frame by frame
//! - Report the finished record exactly once
//!
//! # Design Decisions
//! - Streaming bodies are never buffered; frames are counted as they pass
//! - Completion fires at end of stream, on a body error, or on drop,
//!   whichever comes first (a HEAD response or an aborted client never
//!   reaches end of stream)
//! - When wrapped around a compressed body the count is post-compression

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Buf;
use http_body::{Body, Frame, SizeHint};

/// Body returned for hidden paths and missing files.
pub const NOT_FOUND_BODY: &str = "404 page not found";

/// Plain-text `404 page not found` response.
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        NOT_FOUND_BODY,
    )
        .into_response()
}

/// Mutable accounting for a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseRecord {
    /// Status sent to the client. `200 OK` until the head is recorded.
    pub status: StatusCode,
    /// Bytes handed to the transport so far.
    pub bytes: u64,
    /// Whether the body was gzip encoded.
    pub compressed: bool,
}

impl ResponseRecord {
    /// Record the response head.
    pub fn record_head(&mut self, status: StatusCode, compressed: bool) {
        self.status = status;
        if compressed {
            self.compressed = true;
        }
    }

    /// Record a body write of `len` bytes.
    pub fn record_write(&mut self, len: usize) {
        self.bytes += len as u64;
    }
}

impl Default for ResponseRecord {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            bytes: 0,
            compressed: false,
        }
    }
}

type OnComplete = Box<dyn FnOnce(ResponseRecord) + Send>;

/// Body wrapper that counts data frames and reports the final record once.
pub struct InstrumentedBody<B> {
    inner: B,
    record: ResponseRecord,
    on_complete: Option<OnComplete>,
}

impl<B> InstrumentedBody<B> {
    /// Wrap `inner`, calling `on_complete` with the final record when the
    /// body finishes or is dropped.
    pub fn new<F>(inner: B, record: ResponseRecord, on_complete: F) -> Self
    where
        F: FnOnce(ResponseRecord) + Send + 'static,
    {
        Self {
            inner,
            record,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.record);
        }
    }
}

impl<B> Body for InstrumentedBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.record.record_write(data.remaining());
                }
                if this.inner.is_end_stream() {
                    this.complete();
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.complete(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for InstrumentedBody<B> {
    fn drop(&mut self) {
        self.complete();
    }
}
