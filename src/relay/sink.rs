//! Outward sinks for relayed records
//!
//! Every call writes exactly one frame and pushes it toward the client
//! before returning; nothing is batched across records.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The receiving side of a sink has gone away
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("client disconnected")]
pub struct SinkClosed;

/// Destination of relayed records
#[async_trait]
pub trait RecordSink: Send {
    /// Forward one raw backend record
    async fn send_record(&mut self, record: &str) -> Result<(), SinkClosed>;

    /// Emit an error marker
    async fn send_error(&mut self, kind: &str, message: &str) -> Result<(), SinkClosed>;

    /// Emit the terminal marker; nothing is sent after it
    async fn send_done(&mut self) -> Result<(), SinkClosed>;
}

/// Terminal marker understood by the browser client
pub const SSE_DONE: &str = "data: [DONE]\n\n";

/// Frame a record as a server-sent event `data:` line
pub fn sse_data(record: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", record))
}

/// Frame an error marker as a named `error` event
pub fn sse_error(kind: &str, message: &str) -> Bytes {
    let payload = serde_json::json!({ "error": message, "kind": kind });
    Bytes::from(format!("event: error\ndata: {}\n\n", payload))
}

/// Sink feeding a bounded channel whose receiver becomes an HTTP body
///
/// The channel bound gives backpressure: a slow client stalls the relay
/// instead of growing a buffer. Dropping the receiver (client disconnect)
/// makes every later send fail with [`SinkClosed`].
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the frame stream to hand to the response body
    pub fn channel(capacity: usize) -> (Self, ReceiverStream<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, ReceiverStream::new(rx))
    }

    async fn push(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(frame).await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn send_record(&mut self, record: &str) -> Result<(), SinkClosed> {
        self.push(sse_data(record)).await
    }

    async fn send_error(&mut self, kind: &str, message: &str) -> Result<(), SinkClosed> {
        self.push(sse_error(kind, message)).await
    }

    async fn send_done(&mut self) -> Result<(), SinkClosed> {
        self.push(Bytes::from_static(SSE_DONE.as_bytes())).await
    }
}

/// Sink writing newline-delimited records to any async writer
///
/// Used by the CLI to print pull progress; each record is flushed as soon as
/// it is written.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SinkClosed> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|_| SinkClosed)?;
        self.writer.write_all(b"\n").await.map_err(|_| SinkClosed)?;
        self.writer.flush().await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for WriterSink<W> {
    async fn send_record(&mut self, record: &str) -> Result<(), SinkClosed> {
        self.write_line(record).await
    }

    async fn send_error(&mut self, kind: &str, message: &str) -> Result<(), SinkClosed> {
        let payload = serde_json::json!({ "error": message, "kind": kind });
        self.write_line(&payload.to_string()).await
    }

    async fn send_done(&mut self) -> Result<(), SinkClosed> {
        self.writer.flush().await.map_err(|_| SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_channel_sink_frames_in_order() {
        let (mut sink, mut frames) = ChannelSink::channel(8);
        sink.send_record(r#"{"response":"a"}"#).await.unwrap();
        sink.send_error("truncated", "stream ended early").await.unwrap();
        sink.send_done().await.unwrap();
        drop(sink);

        let first = frames.next().await.unwrap();
        assert_eq!(&first[..], b"data: {\"response\":\"a\"}\n\n");

        let second = String::from_utf8(frames.next().await.unwrap().to_vec()).unwrap();
        assert!(second.starts_with("event: error\ndata: "));
        assert!(second.contains("\"kind\":\"truncated\""));

        let third = frames.next().await.unwrap();
        assert_eq!(&third[..], SSE_DONE.as_bytes());
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (mut sink, frames) = ChannelSink::channel(1);
        drop(frames);
        assert_eq!(sink.send_record("{}").await, Err(SinkClosed));
    }

    #[tokio::test]
    async fn test_writer_sink_writes_lines() {
        let mut out: Vec<u8> = Vec::new();
        {
            let mut sink = WriterSink::new(&mut out);
            sink.send_record(r#"{"status":"pulling"}"#).await.unwrap();
            sink.send_record(r#"{"status":"success"}"#).await.unwrap();
            sink.send_done().await.unwrap();
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"status\":\"pulling\"}\n{\"status\":\"success\"}\n"
        );
    }
}
