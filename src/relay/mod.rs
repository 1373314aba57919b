//! Stream relay between the inference backend and a waiting client
//!
//! [`relay`] reads a backend body one newline-delimited record at a time,
//! forwards each record to a [`RecordSink`] as soon as it is parsed, and
//! accumulates the text fragments so the caller can persist the full
//! answer. [`forward`] is the same loop without the accumulator, used for
//! pull progress.
//!
//! A relay starts streaming when first polled and ends in exactly one of
//! the [`RelayOutcome`] states. Every terminal state carries whatever text
//! was accumulated up to that point.
//!
//! Terminal markers (`[DONE]`, error events) are not written here: the
//! caller writes them once it knows whether persistence succeeded.

pub mod chunk;
pub mod records;
pub mod sink;

pub use chunk::Chunk;
pub use records::{records, RecordStream};
pub use sink::{ChannelSink, RecordSink, SinkClosed, WriterSink};

use crate::error::LaimError;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;

/// How a relay ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// The backend sent its completion record
    Completed,
    /// The backend stream closed without a completion record
    Truncated,
    /// The relay was cancelled before either side finished
    Aborted,
    /// The backend failed mid-stream (in-band error, broken transport or an
    /// undecodable record stream)
    Failed(LaimError),
}

impl RelayOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "completed",
            RelayOutcome::Truncated => "truncated",
            RelayOutcome::Aborted => "aborted",
            RelayOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of one relay run
#[derive(Debug)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    /// Concatenated fragments, in record order
    pub text: String,
    /// Records parsed and accepted
    pub records: usize,
    /// Records carrying a non-empty fragment
    pub fragments: usize,
    /// Lines that were not valid JSON and were dropped
    pub skipped: usize,
    /// False once a sink write failed
    pub client_connected: bool,
}

impl RelayReport {
    fn new() -> Self {
        Self {
            outcome: RelayOutcome::Truncated,
            text: String::new(),
            records: 0,
            fragments: 0,
            skipped: 0,
            client_connected: true,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RelayOutcome::Completed)
    }
}

/// Relay tuning
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Keep reading the source after the sink closes
    pub drain_on_disconnect: bool,
    /// Longest wait for the client to accept the terminal markers
    pub marker_timeout: Duration,
}

/// Default for [`RelayOptions::marker_timeout`]
pub const DEFAULT_MARKER_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            drain_on_disconnect: true,
            marker_timeout: DEFAULT_MARKER_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accumulate,
    Forward,
}

/// Relay a generate/chat stream to `sink`, accumulating its text
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use laim::backend::BodyStream;
/// use laim::relay::{relay, records, RelayOptions, WriterSink};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main] async fn main() {
/// let body: BodyStream = Box::pin(futures::stream::iter(vec![
///     Ok(Bytes::from_static(b"{\"response\":\"Hi\",\"done\":false}\n")),
///     Ok(Bytes::from_static(b"{\"response\":\"!\",\"done\":true}\n")),
/// ]));
/// let mut sink = WriterSink::new(Vec::new());
/// let report = relay(
///     records(body, 1024),
///     &mut sink,
///     &CancellationToken::new(),
///     RelayOptions::default(),
/// )
/// .await;
/// assert!(report.is_completed());
/// assert_eq!(report.text, "Hi!");
/// # }
/// ```
pub async fn relay<S, K>(
    source: S,
    sink: &mut K,
    cancel: &CancellationToken,
    options: RelayOptions,
) -> RelayReport
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
    K: RecordSink + ?Sized,
{
    run(source, sink, cancel, options, Mode::Accumulate).await
}

/// Forward a progress stream to `sink` without accumulating text
///
/// Completes on a `status: "success"` or `done: true` record.
pub async fn forward<S, K>(
    source: S,
    sink: &mut K,
    cancel: &CancellationToken,
    options: RelayOptions,
) -> RelayReport
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
    K: RecordSink + ?Sized,
{
    run(source, sink, cancel, options, Mode::Forward).await
}

async fn run<S, K>(
    mut source: S,
    sink: &mut K,
    cancel: &CancellationToken,
    options: RelayOptions,
    mode: Mode,
) -> RelayReport
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
    K: RecordSink + ?Sized,
{
    let mut report = RelayReport::new();

    report.outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break RelayOutcome::Aborted,
            next = source.next() => next,
        };

        let line = match next {
            None => break RelayOutcome::Truncated,
            Some(Err(e)) => break RelayOutcome::Failed(records::read_error(e)),
            Some(Ok(line)) => line,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let chunk: Chunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Skipping malformed backend record: {} ({})", e, line);
                report.skipped += 1;
                continue;
            }
        };
        report.records += 1;

        if let Some(message) = chunk.error {
            break RelayOutcome::Failed(LaimError::BackendRejected {
                status: 200,
                body: message,
            });
        }

        if mode == Mode::Accumulate {
            if let Some(fragment) = chunk.fragment() {
                if !fragment.is_empty() {
                    report.fragments += 1;
                    report.text.push_str(fragment);
                }
            }
        }

        // A client that stops reading blocks this write; cancellation must
        // still get through.
        let sent = if report.client_connected {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RelayOutcome::Aborted,
                sent = sink.send_record(line) => sent,
            }
        } else {
            Ok(())
        };

        if sent.is_err() {
            report.client_connected = false;
            if options.drain_on_disconnect {
                tracing::info!("Client disconnected, draining backend stream");
            } else {
                tracing::info!("Client disconnected, abandoning backend stream");
                break RelayOutcome::Aborted;
            }
        }

        let terminal = match mode {
            Mode::Accumulate => chunk.done,
            Mode::Forward => chunk.done || chunk.is_pull_success(),
        };
        if terminal {
            break RelayOutcome::Completed;
        }
    };

    tracing::debug!(
        outcome = report.outcome.name(),
        records = report.records,
        fragments = report.fragments,
        skipped = report.skipped,
        client_connected = report.client_connected,
        "Relay finished"
    );

    report
}
