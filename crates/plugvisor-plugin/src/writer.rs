// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP response writer abstraction driven by the resource stream bridge.
//!
//! [`StreamingResponseWriter`] adapts the writer calls onto a streaming
//! `axum` response: the head is committed on the first `write_header` or
//! `write`, and buffered body bytes are handed to the response on `flush`.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use plugvisor_core::{PlugvisorError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Incremental HTTP response sink.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Headers sent when the response head is committed.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the status and headers. Later calls have no effect.
    fn write_header(&mut self, status: StatusCode);

    /// Appends body bytes, committing `200 OK` first if nothing was committed.
    async fn write(&mut self, body: Bytes) -> Result<()>;

    fn supports_flush(&self) -> bool {
        false
    }

    /// Pushes buffered body bytes to the client.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes the JSON API error shape `{"message": ..., "error": ...}`.
pub async fn write_json_error(
    writer: &mut dyn ResponseWriter,
    status: StatusCode,
    message: &str,
    err: Option<&(dyn Display + Sync)>,
) -> Result<()> {
    let mut body = serde_json::json!({ "message": message });
    if let Some(err) = err {
        body["error"] = serde_json::Value::String(err.to_string());
    }
    let bytes = serde_json::to_vec(&body)
        .map_err(|e| PlugvisorError::Internal(format!("failed to encode error body: {e}")))?;

    writer
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    writer.write_header(status);
    writer.write(Bytes::from(bytes)).await?;
    if writer.supports_flush() {
        writer.flush().await?;
    }
    Ok(())
}

type ResponseHead = (StatusCode, HeaderMap);

/// Body chunks buffered in flight between the writer and the response body.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Writer half of a streaming `axum` response.
#[derive(Debug)]
pub struct StreamingResponseWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<Bytes>,
    buffer: Vec<Bytes>,
}

/// Response half, resolved once the writer commits its head.
#[derive(Debug)]
pub struct PendingResponse {
    head: oneshot::Receiver<ResponseHead>,
    body: mpsc::Receiver<Bytes>,
}

impl StreamingResponseWriter {
    pub fn channel() -> (StreamingResponseWriter, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (
            StreamingResponseWriter {
                headers: HeaderMap::new(),
                head: Some(head_tx),
                body: body_tx,
                buffer: Vec::new(),
            },
            PendingResponse {
                head: head_rx,
                body: body_rx,
            },
        )
    }

    pub fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    /// Resolves once the response body has been dropped, i.e. the client went away.
    pub fn client_gone(&self) -> impl Future<Output = ()> + Send + 'static {
        let body = self.body.clone();
        async move { body.closed().await }
    }

    /// Flushes anything buffered and ends the body.
    pub async fn finish(mut self) -> Result<()> {
        self.flush().await
    }

    fn commit(&mut self, status: StatusCode) {
        if let Some(head) = self.head.take() {
            let headers = std::mem::take(&mut self.headers);
            // receiver gone means the client went away; writes will fail on their own
            let _ = head.send((status, headers));
        }
    }
}

#[async_trait]
impl ResponseWriter for StreamingResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.is_committed() {
            debug!(status = %status, "superfluous write_header call");
            return;
        }
        self.commit(status);
    }

    async fn write(&mut self, body: Bytes) -> Result<()> {
        self.commit(StatusCode::OK);
        if !body.is_empty() {
            self.buffer.push(body);
        }
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        true
    }

    async fn flush(&mut self) -> Result<()> {
        for chunk in std::mem::take(&mut self.buffer) {
            self.body
                .send(chunk)
                .await
                .map_err(|_| PlugvisorError::Cancelled)?;
        }
        Ok(())
    }
}

impl Drop for StreamingResponseWriter {
    fn drop(&mut self) {
        self.commit(StatusCode::OK);
    }
}

impl PendingResponse {
    /// Waits for the head and returns a response whose body streams the flushed chunks.
    pub async fn into_response(self) -> Response {
        let (status, headers) = self
            .head
            .await
            .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new()));

        let chunks = futures::stream::unfold(self.body, |mut body| async move {
            body.recv()
                .await
                .map(|chunk| (Ok::<_, Infallible>(chunk), body))
        });

        let mut response = Response::new(Body::from_stream(chunks));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_commits_once_and_body_streams_on_flush() {
        let (mut writer, pending) = StreamingResponseWriter::channel();
        writer
            .headers_mut()
            .insert("x-plugin", HeaderValue::from_static("acme"));
        writer.write_header(StatusCode::CREATED);
        writer.write_header(StatusCode::BAD_GATEWAY);

        let writing = tokio::spawn(async move {
            writer.write(Bytes::from_static(b"hello ")).await.unwrap();
            writer.flush().await.unwrap();
            writer.write(Bytes::from_static(b"world")).await.unwrap();
            writer.finish().await.unwrap();
        });

        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-plugin"], "acme");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello world");
        writing.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_writer_commits_empty_ok() {
        let (writer, pending) = StreamingResponseWriter::channel();
        drop(writer);
        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn client_gone_resolves_when_body_is_dropped() {
        let (mut writer, pending) = StreamingResponseWriter::channel();
        let gone = writer.client_gone();
        writer.write_header(StatusCode::OK);

        let response = pending.into_response().await;
        drop(response);
        tokio::time::timeout(std::time::Duration::from_secs(1), gone)
            .await
            .unwrap();
        assert!(writer.flush().await.is_ok());
        writer.write(Bytes::from_static(b"late")).await.unwrap();
        assert!(matches!(writer.flush().await, Err(PlugvisorError::Cancelled)));
    }

    #[tokio::test]
    async fn json_error_shape() {
        let (mut writer, pending) = StreamingResponseWriter::channel();
        let cause = PlugvisorError::PluginUnavailable;
        write_json_error(
            &mut writer,
            StatusCode::SERVICE_UNAVAILABLE,
            "Plugin unavailable",
            Some(&cause as &(dyn Display + Sync)),
        )
        .await
        .unwrap();
        drop(writer);

        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Plugin unavailable");
        assert_eq!(json["error"], "plugin unavailable");
    }
}
