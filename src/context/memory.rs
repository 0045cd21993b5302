//! In-memory exchange context.
//!
//! Captures response output in a byte buffer instead of a socket. Used for
//! requests that start and end inside the process (a handler calling
//! another handler) and for exercising response-writing code without a
//! network.

use crate::context::signal::CompletionSignal;
use crate::context::{ContextError, ListenerContext};
use crate::http::headers::Headers;
use crate::http::request::RequestHead;
use crate::observability::metrics;

/// Exchange context backed by a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct MemoryContext {
    buffer: Vec<u8>,
    signal: Option<CompletionSignal>,
    request: Option<RequestHead>,
    response_headers: Headers,
    closed: bool,
}

impl MemoryContext {
    /// Context with an empty private buffer and nobody to notify.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context writing after the contents of `buffer` and completing
    /// `signal` when closed.
    pub fn with_signal(buffer: Vec<u8>, signal: CompletionSignal) -> Self {
        Self {
            buffer,
            signal: Some(signal),
            ..Self::default()
        }
    }

    /// Output captured so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

impl ListenerContext for MemoryContext {
    fn can_send_data(&self) -> bool {
        !self.closed
    }

    fn content_length(&self) -> u64 {
        self.buffer.len() as u64
    }

    async fn send_buffer(&mut self, buffer: &[u8]) {
        if self.closed {
            tracing::warn!(len = buffer.len(), "Discarding write to closed in-memory exchange");
            return;
        }
        self.buffer.extend_from_slice(buffer);
        metrics::record_bytes_sent(metrics::TRANSPORT_MEMORY, buffer.len());
    }

    async fn close_connection(&mut self) {
        if !self.closed {
            self.closed = true;
            tracing::trace!(len = self.buffer.len(), "In-memory exchange closed");
        }
        if let Some(signal) = &self.signal {
            signal.complete(self.buffer.clone());
        }
    }

    fn request(&self) -> Option<&RequestHead> {
        self.request.as_ref()
    }

    fn set_request(&mut self, head: RequestHead) -> Result<(), ContextError> {
        if self.request.is_some() {
            return Err(ContextError::RequestAlreadySet);
        }
        self.request = Some(head);
        Ok(())
    }

    fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    fn response_headers_mut(&mut self) -> &mut Headers {
        &mut self.response_headers
    }

    fn transport(&self) -> &'static str {
        metrics::TRANSPORT_MEMORY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::completion_channel;
    use http::{Method, StatusCode};

    #[tokio::test]
    async fn content_length_sums_writes() {
        let mut ctx = MemoryContext::new();
        assert_eq!(ctx.content_length(), 0);

        ctx.send_buffer(b"hello").await;
        ctx.send_buffer(b", ").await;
        ctx.send_buffer(b"world").await;

        assert_eq!(ctx.content_length(), 12);
        assert_eq!(ctx.buffer(), b"hello, world");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut ctx = MemoryContext::new();
        assert!(ctx.can_send_data());

        ctx.send_buffer(b"abc").await;
        ctx.close_connection().await;
        assert!(!ctx.can_send_data());

        ctx.close_connection().await;
        assert!(!ctx.can_send_data());
        assert_eq!(ctx.buffer(), b"abc");
    }

    #[tokio::test]
    async fn writes_after_close_are_dropped() {
        let mut ctx = MemoryContext::new();
        ctx.close_connection().await;
        ctx.send_buffer(b"late").await;
        assert_eq!(ctx.content_length(), 0);
    }

    #[tokio::test]
    async fn prefilled_buffer_is_extended() {
        let (signal, _waiter) = completion_channel();
        let mut ctx = MemoryContext::with_signal(b"prefix:".to_vec(), signal);
        ctx.send_buffer(b"body").await;
        assert_eq!(ctx.into_buffer(), b"prefix:body");
    }

    #[tokio::test]
    async fn close_completes_signal() {
        let (signal, mut waiter) = completion_channel();
        let mut ctx = MemoryContext::with_signal(Vec::new(), signal);
        ctx.send_buffer(b"payload").await;
        assert!(!waiter.is_complete());

        ctx.close_connection().await;
        assert_eq!(waiter.wait().await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn request_head_is_set_once() {
        let mut ctx = MemoryContext::new();
        assert!(ctx.request().is_none());

        ctx.set_request(RequestHead::new(Method::GET, "/first".parse().unwrap()))
            .unwrap();
        let err = ctx
            .set_request(RequestHead::new(Method::POST, "/second".parse().unwrap()))
            .unwrap_err();

        assert!(matches!(err, ContextError::RequestAlreadySet));
        let head = ctx.request().unwrap();
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.uri.path(), "/first");
    }

    #[tokio::test]
    async fn send_response_captures_preamble() {
        let mut ctx = MemoryContext::new();
        ctx.response_headers_mut().insert("Content-Type", "text/plain");

        ctx.send_response(StatusCode::OK).await.unwrap();

        assert!(!ctx.can_send_data());
        assert_eq!(ctx.buffer(), b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n");
    }

    #[tokio::test]
    async fn malformed_header_still_closes() {
        let mut ctx = MemoryContext::new();
        ctx.response_headers_mut().insert("X-Bad", "a\r\nb");

        let err = ctx.send_response(StatusCode::OK).await.unwrap_err();

        assert!(matches!(err, ContextError::MalformedHeader { .. }));
        assert!(!ctx.can_send_data());
        assert_eq!(ctx.content_length(), 0);
    }

    #[tokio::test]
    async fn body_gets_content_length() {
        let mut ctx = MemoryContext::new();
        ctx.send_response_with_body(StatusCode::NOT_FOUND, b"missing")
            .await
            .unwrap();

        assert_eq!(
            ctx.buffer(),
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 7\r\n\r\nmissing"
        );
    }
    #[test]
    fn response_is_counted_by_status_and_transport() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let mut ctx = MemoryContext::new();
                ctx.send_response(StatusCode::NOT_FOUND).await.unwrap();
            })
        });

        let rendered = handle.render();
        let line = rendered
            .lines()
            .find(|line| line.starts_with("exchange_responses_total{"))
            .unwrap();
        assert!(line.contains(r#"status="404""#));
        assert!(line.contains(r#"transport="memory""#));
        assert!(line.ends_with(" 1"));
    }
}
