//! Streaming transport against the backend HTTP API.
//!
//! [`SessionTransport::open`] issues a request and hands back a
//! [`RecordStream`]: a lazy, finite, forward-only sequence of NDJSON
//! records. Framing is chunk-boundary safe — a record split across two
//! reads is buffered until its newline arrives. A line that fails to parse
//! is logged and skipped; it never aborts the rest of the stream.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::BridgeConfig;
use crate::error::TransportError;

/// One decoded unit of a streaming response body.
///
/// A thin wrapper over the JSON object with typed accessors for the fields
/// the sessions recognize; unrecognized fields are ignored, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord(Map<String, Value>);

impl StreamRecord {
    fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Incremental answer text to append.
    pub fn answer(&self) -> Option<&str> {
        self.str_field("answer")
    }

    /// Full source list to replace the previous one.
    pub fn sources(&self) -> Option<Vec<String>> {
        self.0.get("sources").and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
    }

    /// Debug line to append.
    pub fn debug(&self) -> Option<&str> {
        self.str_field("debug")
    }

    /// Server-side failure reported inside the stream.
    pub fn error(&self) -> Option<&str> {
        self.str_field("error")
    }

    /// Status marker ("Processing", "Completed", ...).
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// File name attached to a per-file reindex error.
    pub fn file(&self) -> Option<&str> {
        self.str_field("file")
    }

    /// Progress percentage. The backend has emitted both a bare number and a
    /// `"52.17%"` string over time; accept either.
    pub fn progress(&self) -> Option<f64> {
        match self.0.get("progress")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<u64> {
        self.0.get("current").and_then(Value::as_u64)
    }

    pub fn total(&self) -> Option<u64> {
        self.0.get("total").and_then(Value::as_u64)
    }
}

/// Incremental parser for newline-delimited JSON bodies.
///
/// Buffers raw bytes and splits on `b'\n'`; only complete lines are UTF-8
/// decoded, so a multi-byte character split across two reads survives
/// intact.
#[derive(Debug, Default)]
pub struct NdjsonParser {
    buffer: Vec<u8>,
}

impl NdjsonParser {
    /// Feed arbitrary bytes and drain every record completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(bytes);
        let mut records = Vec::new();

        while let Some(split) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(0..=split).collect();
            records.extend(decode_line(&line));
        }

        records
    }

    /// Drain a trailing record that arrived without a final newline.
    pub fn finish(&mut self) -> Option<StreamRecord> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Option<StreamRecord> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match StreamRecord::parse(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, line, "skipping malformed stream record");
            None
        }
    }
}

/// HTTP client for the backend, shared by streaming sessions and the plain
/// request/response API.
#[derive(Debug, Clone)]
pub struct SessionTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SessionTransport {
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        // No global timeout: answer generation is backend-dependent and
        // sessions stay cancellable instead.
        let builder = config
            .transport
            .apply(reqwest::Client::builder(), &config.host, config.port);
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a request and expose the response body as a record stream.
    ///
    /// The status line is checked before any body read: a non-2xx response
    /// yields [`TransportError::Status`] with the body attached. The token
    /// is observed before the request is sent (a session cancelled while
    /// idle never goes on the wire) and at every subsequent read.
    pub async fn open(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cancel: CancellationToken,
    ) -> Result<RecordStream, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(TransportError::Status { status, body });
        }

        Ok(RecordStream {
            bytes: response.bytes_stream().boxed(),
            parser: NdjsonParser::default(),
            pending: std::collections::VecDeque::new(),
            cancel,
            done: false,
        })
    }
}

/// Lazy, forward-only stream of [`StreamRecord`]s from one response body.
pub struct RecordStream {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: NdjsonParser,
    pending: std::collections::VecDeque<StreamRecord>,
    cancel: CancellationToken,
    done: bool,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("pending", &self.pending.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Next record, `Ok(None)` at end of stream.
    ///
    /// The cancellation token is checked before dispatching a decoded
    /// record and while waiting on the next chunk; after cancellation no
    /// further records are yielded.
    pub async fn next_record(&mut self) -> Result<Option<StreamRecord>, TransportError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            if self.done {
                return Ok(None);
            }

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransportError::Cancelled),
                chunk = self.bytes.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => self.pending.extend(self.parser.feed(&bytes)),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    self.done = true;
                    self.pending.extend(self.parser.finish());
                }
            }
        }
    }
}
