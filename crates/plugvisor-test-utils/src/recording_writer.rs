// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response writer that records every call for assertions.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use plugvisor_core::Result;
use plugvisor_plugin::ResponseWriter;

/// One recorded writer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterEvent {
    WriteHeader(StatusCode),
    Write(Bytes),
    Flush,
}

#[derive(Debug)]
pub struct RecordingWriter {
    headers: HeaderMap,
    committed: Option<HeaderMap>,
    events: Vec<WriterEvent>,
    flushable: bool,
}

impl Default for RecordingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingWriter {
    /// A writer that supports flushing.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            committed: None,
            events: Vec::new(),
            flushable: true,
        }
    }

    pub fn without_flush() -> Self {
        Self {
            flushable: false,
            ..Self::new()
        }
    }

    pub fn events(&self) -> &[WriterEvent] {
        &self.events
    }

    /// Headers as they were when the first status was written.
    pub fn committed_headers(&self) -> Option<&HeaderMap> {
        self.committed.as_ref()
    }

    pub fn statuses(&self) -> Vec<StatusCode> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WriterEvent::WriteHeader(status) => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WriterEvent::Write(body) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, WriterEvent::Flush))
            .count()
    }

    /// All written bytes, concatenated.
    pub fn body(&self) -> Vec<u8> {
        self.writes().iter().flat_map(|b| b.iter().copied()).collect()
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body()).unwrap_or(serde_json::Value::Null)
    }
}

#[async_trait]
impl ResponseWriter for RecordingWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.committed.is_none() {
            self.committed = Some(self.headers.clone());
        }
        self.events.push(WriterEvent::WriteHeader(status));
    }

    async fn write(&mut self, body: Bytes) -> Result<()> {
        self.events.push(WriterEvent::Write(body));
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        self.flushable
    }

    async fn flush(&mut self) -> Result<()> {
        self.events.push(WriterEvent::Flush);
        Ok(())
    }
}
