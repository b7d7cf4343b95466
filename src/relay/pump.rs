//! The relay pump: pull one chunk from upstream, push it downstream, repeat.
//!
//! # States
//! ```text
//! Idle → Streaming → Draining → Closed
//!                  ↘ Failed
//! ```
//! - Idle: upstream open, response headers not yet committed
//! - Streaming: one upstream read, one downstream write, in strict alternation
//! - Draining: upstream reported end-of-stream, downstream is finished cleanly
//! - Failed: read error, client gone, idle timeout or shutdown
//!
//! The next upstream read is issued only after the response body has taken
//! the previous chunk out of the downstream channel. A slow client stalls the
//! upstream read instead of growing a buffer: at most one chunk sits between
//! the pump and the HTTP layer.
//!
//! Every failure path cancels the upstream source before returning. A client
//! that disconnects while the pump is parked on an upstream read is noticed
//! through [`ChunkSink::closed`], so a silent upstream cannot pin the session.

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::Stream;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::relay::error::RelayError;

/// Readable side of an upstream session.
#[async_trait]
pub trait ChunkSource: Send {
    /// Read the next chunk. `Ok(None)` means the upstream ended the stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError>;

    /// Release the upstream connection. Must be idempotent.
    fn cancel(&mut self);
}

/// Writable side of the downstream response.
#[async_trait]
pub trait ChunkSink: Send {
    /// Hand one chunk to the downstream. Fails with `ClientDisconnect`
    /// once the consumer is gone.
    async fn send(&mut self, chunk: Bytes) -> Result<(), RelayError>;

    /// Resolves when the downstream consumer has gone away.
    async fn closed(&mut self);

    /// End the response cleanly.
    fn finish(self);

    /// End the response without a clean terminator.
    fn abort(self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Streaming,
    Draining,
    Closed,
    Failed,
}

/// Knobs for one pump run.
#[derive(Debug, Clone, Default)]
pub struct PumpSettings {
    /// Longest allowed gap between upstream chunks.
    pub idle_timeout: Option<Duration>,
    /// Cancelled when the process shuts down.
    pub shutdown: CancellationToken,
}

/// What happened during one relay session.
#[derive(Debug)]
pub struct PumpReport {
    pub state: PumpState,
    pub chunks: u64,
    pub bytes: u64,
    pub failure: Option<RelayError>,
}

impl PumpReport {
    pub fn outcome_label(&self) -> &'static str {
        match &self.failure {
            Some(err) => err.outcome_label(),
            None => "completed",
        }
    }
}

/// Drive one relay session to completion.
pub async fn run_pump<S, K>(mut source: S, mut sink: K, settings: PumpSettings) -> PumpReport
where
    S: ChunkSource,
    K: ChunkSink,
{
    let mut state = PumpState::Idle;
    let mut chunks = 0u64;
    let mut bytes = 0u64;

    transition(&mut state, PumpState::Streaming);

    let failure = loop {
        let read = tokio::select! {
            biased;
            _ = settings.shutdown.cancelled() => Err(RelayError::Shutdown),
            _ = sink.closed() => Err(RelayError::ClientDisconnect),
            read = read_with_idle_timeout(&mut source, settings.idle_timeout) => read,
        };

        let chunk = match read {
            Ok(Some(chunk)) if chunk.is_empty() => continue,
            Ok(Some(chunk)) => chunk,
            Ok(None) => break None,
            Err(err) => break Some(err),
        };

        let len = chunk.len();
        let written = tokio::select! {
            biased;
            _ = settings.shutdown.cancelled() => Err(RelayError::Shutdown),
            written = sink.send(chunk) => written,
        };
        if let Err(err) = written {
            break Some(err);
        }

        chunks += 1;
        bytes += len as u64;
        crate::observability::metrics::record_bytes_forwarded(len);
        tracing::trace!(chunk = chunks, len, "Chunk forwarded");
    };

    match &failure {
        None => {
            transition(&mut state, PumpState::Draining);
            source.cancel();
            sink.finish();
            transition(&mut state, PumpState::Closed);
        }
        Some(err) => {
            source.cancel();
            match err {
                RelayError::ClientDisconnect => {
                    tracing::debug!(chunks, bytes, "Client disconnected, upstream released");
                    // Nobody is listening; dropping the sink is enough.
                    drop(sink);
                }
                _ => {
                    tracing::warn!(error = %err, chunks, bytes, "Relay stream aborted");
                    sink.abort();
                }
            }
            transition(&mut state, PumpState::Failed);
        }
    }

    PumpReport {
        state,
        chunks,
        bytes,
        failure,
    }
}

async fn read_with_idle_timeout<S: ChunkSource>(
    source: &mut S,
    idle: Option<Duration>,
) -> Result<Option<Bytes>, RelayError> {
    match idle {
        Some(window) => tokio::time::timeout(window, source.next_chunk())
            .await
            .map_err(|_| RelayError::IdleTimeout(window))?,
        None => source.next_chunk().await,
    }
}

fn transition(state: &mut PumpState, next: PumpState) {
    tracing::trace!(from = ?*state, to = ?next, "Pump state");
    *state = next;
}

/// Sink half of the downstream channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    aborted: CancellationToken,
}

/// Create the one-slot channel between the pump and the response body.
///
/// [`ChunkSink::send`] is a rendezvous: it returns once the body has taken
/// the chunk, not when the chunk lands in the slot.
///
/// The returned stream yields every chunk the sink accepted, in order. After
/// [`ChunkSink::abort`] it yields one error once the queue is drained, which
/// makes the HTTP layer drop the connection without a terminating chunk.
pub fn downstream_channel() -> (ChannelSink, impl Stream<Item = Result<Bytes, io::Error>>) {
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let aborted = CancellationToken::new();

    let body = futures_util::stream::unfold(Some((rx, aborted.clone())), |state| async move {
        let (mut rx, aborted) = state?;
        match rx.recv().await {
            Some(chunk) => Some((Ok(chunk), Some((rx, aborted)))),
            None if aborted.is_cancelled() => Some((
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "upstream stream aborted")),
                None,
            )),
            None => None,
        }
    });

    (ChannelSink { tx, aborted }, body)
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| RelayError::ClientDisconnect)?;
        // The slot frees up only when the body has received the chunk.
        self.tx
            .reserve()
            .await
            .map(drop)
            .map_err(|_| RelayError::ClientDisconnect)
    }

    async fn closed(&mut self) {
        self.tx.closed().await
    }

    fn finish(self) {}

    fn abort(self) {
        // Mark before the sender drops so the body sees the flag when the
        // channel reports closed.
        self.aborted.cancel();
    }
}
