//! Gzip response compression.
//!
//! # Responsibilities
//! - Detect clients that advertise `gzip` in `Accept-Encoding`
//! - Commit `Content-Encoding: gzip` on their responses
//! - Stream the body through a gzip encoder frame by frame
//!
//! # Design Decisions
//! - The encoding header is set unconditionally once negotiated; an inner
//!   handler cannot opt out or substitute another encoding
//! - The encoder is always finished when the inner body ends, so the gzip
//!   trailer is written exactly once
//! - Encoder failures end the stream quietly: the head is already on the
//!   wire and HTTP/1.1 has no channel left to report them

use std::io::Write;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::{
    body::Body as AxumBody,
    extract::Request,
    http::{
        header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, VARY},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use bytes::{Buf, Bytes};
use flate2::{write::GzEncoder, Compression};
use http_body::{Body, Frame, SizeHint};

/// Response extension marking a body as gzip encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipEncoded;

/// Returns true if the `Accept-Encoding` header mentions `gzip`.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("gzip"))
}

/// Middleware that gzip-encodes responses for clients that accept it.
pub async fn gzip_responses(request: Request, next: Next) -> Response {
    let negotiated = accepts_gzip(request.headers());
    let response = next.run(request).await;
    if !negotiated {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .append(VARY, HeaderValue::from_static("accept-encoding"));
    parts.extensions.insert(GzipEncoded);

    let body = GzipBody::new(body, Compression::default());
    Response::from_parts(parts, AxumBody::new(body))
}

enum State {
    Encoding(GzEncoder<Vec<u8>>),
    Finished(Option<HeaderMap>),
}

/// Response body that streams `inner` through a gzip encoder.
pub struct GzipBody<B> {
    inner: B,
    state: State,
}

impl<B> GzipBody<B> {
    pub fn new(inner: B, level: Compression) -> Self {
        Self {
            inner,
            state: State::Encoding(GzEncoder::new(Vec::new(), level)),
        }
    }

    fn finish(&mut self, trailers: Option<HeaderMap>) -> Option<Bytes> {
        match std::mem::replace(&mut self.state, State::Finished(trailers)) {
            State::Encoding(encoder) => match encoder.finish() {
                Ok(tail) if !tail.is_empty() => Some(Bytes::from(tail)),
                _ => None,
            },
            State::Finished(_) => None,
        }
    }
}

impl<B> Body for GzipBody<B>
where
    B: Body + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            let encoder = match &mut this.state {
                State::Finished(trailers) => {
                    return Poll::Ready(trailers.take().map(|trailers| Ok(Frame::trailers(trailers))));
                }
                State::Encoding(encoder) => encoder,
            };

            match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(mut data) => {
                        while data.has_remaining() {
                            let chunk = data.chunk();
                            let len = chunk.len();
                            if encoder.write_all(chunk).is_err() {
                                this.state = State::Finished(None);
                                return Poll::Ready(None);
                            }
                            data.advance(len);
                        }

                        let compressed = std::mem::take(encoder.get_mut());
                        if !compressed.is_empty() {
                            return Poll::Ready(Some(Ok(Frame::data(Bytes::from(compressed)))));
                        }
                    }
                    Err(frame) => {
                        let trailers = frame.into_trailers().ok();
                        if let Some(tail) = this.finish(trailers) {
                            return Poll::Ready(Some(Ok(Frame::data(tail))));
                        }
                    }
                },
                Some(Err(err)) => {
                    this.state = State::Finished(None);
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    return Poll::Ready(this.finish(None).map(|tail| Ok(Frame::data(tail))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, State::Finished(None))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}
