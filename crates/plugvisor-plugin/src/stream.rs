// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge from a plugin's streamed resource response to an HTTP writer.
//!
//! [`CallResourceResponseStream`] is a rendezvous: every `send` waits until
//! the drain loop has taken the chunk, so a plugin can never run ahead of the
//! client. Both sides observe the stream's cancellation token.

use async_trait::async_trait;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::HeaderValue;
use parking_lot::Mutex;
use plugvisor_core::types::{CallResourceRequest, CallResourceResponse};
use plugvisor_core::{CallResourceResponseSender, PlugvisorError, Result};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::entity::Plugin;
use crate::writer::ResponseWriter;

type Delivery = (CallResourceResponse, oneshot::Sender<()>);

pub struct CallResourceResponseStream {
    ctx: CancellationToken,
    tx: Mutex<Option<mpsc::Sender<Delivery>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Delivery>>,
}

impl CallResourceResponseStream {
    pub fn new(ctx: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            ctx,
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Waits for the next chunk. `Ok(None)` signals end-of-stream.
    pub async fn recv(&self) -> Result<Option<CallResourceResponse>> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Err(PlugvisorError::Cancelled),
            delivery = rx.recv() => Ok(delivery.map(|(response, ack)| {
                // the sender may have been cancelled while waiting
                let _ = ack.send(());
                response
            })),
        }
    }

    /// Ends the stream. Pending and future `recv` calls see end-of-stream.
    pub fn close(&self) -> Result<()> {
        self.tx
            .lock()
            .take()
            .map(drop)
            .ok_or(PlugvisorError::StreamAlreadyClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

#[async_trait]
impl CallResourceResponseSender for CallResourceResponseStream {
    async fn send(&self, response: CallResourceResponse) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or(PlugvisorError::SendOnClosedStream)?;
        let (ack_tx, ack_rx) = oneshot::channel();

        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => return Err(PlugvisorError::Cancelled),
            sent = tx.send((response, ack_tx)) => sent.map_err(|_| PlugvisorError::SendOnClosedStream)?,
        }
        drop(tx);

        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Err(PlugvisorError::Cancelled),
            acked = ack_rx => acked.map_err(|_| PlugvisorError::Cancelled),
        }
    }
}

/// Drains `stream` into `writer`.
///
/// Headers and status are taken from the first chunk only, with `Set-Cookie`
/// never forwarded and `Content-Type` defaulting to `application/json`.
pub async fn flush_stream(
    plugin_id: &str,
    stream: &CallResourceResponseStream,
    writer: &mut dyn ResponseWriter,
) -> Result<()> {
    let mut processed = 0usize;

    loop {
        let response = match stream.recv().await {
            Ok(Some(response)) => response,
            Ok(None) if processed == 0 => return Err(PlugvisorError::EmptyResourceResponse),
            Ok(None) => return Ok(()),
            Err(e) if processed == 0 => {
                return Err(PlugvisorError::ResourceReceive {
                    source: Box::new(e),
                });
            }
            Err(PlugvisorError::Cancelled) => {
                debug!(plugin_id, "resource stream cancelled after partial delivery");
                if let Err(e) = stream.close() {
                    debug!(plugin_id, error = %e, "resource stream already closed");
                }
                return Ok(());
            }
            Err(e) => {
                error!(plugin_id, error = %e, "failed to receive response from resource call");
                if let Err(e) = stream.close() {
                    debug!(plugin_id, error = %e, "resource stream already closed");
                }
                return Ok(());
            }
        };

        if processed == 0 {
            if let Some(mut headers) = response.headers {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                let out = writer.headers_mut();
                for (name, value) in headers.iter() {
                    if name == SET_COOKIE {
                        continue;
                    }
                    out.append(name.clone(), value.clone());
                }
                writer.write_header(response.status);
            }
        }

        if let Err(e) = writer.write(response.body).await {
            error!(plugin_id, error = %e, "failed to write resource response");
        }
        if writer.supports_flush() {
            if let Err(e) = writer.flush().await {
                error!(plugin_id, error = %e, "failed to flush resource response");
            }
        }
        processed += 1;
    }
}

/// Runs a plugin's resource call and drains its stream into `writer` concurrently.
///
/// Returns the plugin's error if it failed, otherwise the drain result.
pub async fn call_resource_streamed(
    plugin: &Plugin,
    ctx: &CancellationToken,
    request: &CallResourceRequest,
    writer: &mut dyn ResponseWriter,
) -> Result<()> {
    let child = ctx.child_token();
    let stream = CallResourceResponseStream::new(child.clone());

    let call = async {
        let result = plugin.call_resource(&child, request, &stream).await;
        if let Err(e) = stream.close() {
            warn!(plugin_id = %plugin.id(), error = %e, "failed to close stream");
        }
        result
    };
    let drain = async {
        let result = flush_stream(plugin.id(), &stream, writer).await;
        child.cancel();
        result
    };

    let (call_result, drain_result) = tokio::join!(call, drain);
    call_result?;
    drain_result
}
