// ABOUTME: Log streaming channel between pipelines and their observers.
// ABOUTME: Producers push chunks into a LogSink; any number of subscribers pull them with bounded buffering.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Default number of chunks buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// How long `emit` waits on one full subscriber before dropping the chunk for it.
pub const DEFAULT_SEND_WAIT: Duration = Duration::from_millis(250);

/// Origin of a log chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    /// Remote process standard output.
    Stdout,
    /// Remote process standard error.
    Stderr,
    /// Progress lines written by the engine itself.
    Info,
}

/// A raw chunk of text as it arrived. Chunks are not split on line boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogChunk {
    pub stream: LogStream,
    pub text: String,
}

impl LogChunk {
    pub fn new(stream: LogStream, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }
}

struct Subscriber {
    tx: mpsc::Sender<LogChunk>,
    dropped: Arc<AtomicU64>,
}

struct Inner {
    subscribers: Mutex<Vec<Subscriber>>,
    send_wait: Duration,
}

/// Producer side of the log channel.
///
/// Cloning a sink shares the subscriber list. Subscriptions end once every
/// clone of the sink has been dropped.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("subscribers", &self.subscriber_count())
            .field("send_wait", &self.inner.send_wait)
            .finish()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_send_wait(DEFAULT_SEND_WAIT)
    }

    /// Create a sink whose per-subscriber send wait is `send_wait`.
    pub fn with_send_wait(send_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                send_wait,
            }),
        }
    }

    /// Register a new subscriber buffering up to `capacity` chunks.
    pub fn subscribe(&self, capacity: usize) -> LogSubscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        self.inner.subscribers.lock().push(Subscriber {
            tx,
            dropped: Arc::clone(&dropped),
        });
        LogSubscription { rx, dropped }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Deliver a chunk to every live subscriber.
    ///
    /// Each subscriber gets at most `send_wait` to make room; a subscriber
    /// that stays full loses this chunk and its drop counter is bumped.
    /// Subscribers whose receiver is gone are removed.
    pub async fn emit(&self, chunk: LogChunk) {
        if chunk.text.is_empty() {
            return;
        }

        // Never hold the lock across an await.
        let targets: Vec<(mpsc::Sender<LogChunk>, Arc<AtomicU64>)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.tx.clone(), Arc::clone(&s.dropped)))
            .collect();

        let mut saw_closed = false;
        for (tx, dropped) in targets {
            match tx.send_timeout(chunk.clone(), self.inner.send_wait).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(dropped = total, "log subscriber lagging, chunk dropped");
                }
                Err(SendTimeoutError::Closed(_)) => saw_closed = true,
            }
        }

        if saw_closed {
            self.inner.subscribers.lock().retain(|s| !s.tx.is_closed());
        }
    }

    pub async fn stdout(&self, text: impl Into<String>) {
        self.emit(LogChunk::new(LogStream::Stdout, text)).await;
    }

    pub async fn stderr(&self, text: impl Into<String>) {
        self.emit(LogChunk::new(LogStream::Stderr, text)).await;
    }

    /// Emit an engine progress line. A trailing newline is appended.
    pub async fn info(&self, line: impl AsRef<str>) {
        self.emit(LogChunk::new(LogStream::Info, format!("{}\n", line.as_ref())))
            .await;
    }
}

/// Consumer side of the log channel.
#[derive(Debug)]
pub struct LogSubscription {
    rx: mpsc::Receiver<LogChunk>,
    dropped: Arc<AtomicU64>,
}

impl LogSubscription {
    /// Wait for the next chunk. Returns `None` once every sink clone is gone
    /// and the buffer is drained.
    pub async fn recv(&mut self) -> Option<LogChunk> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogChunk> {
        self.rx.try_recv().ok()
    }

    /// Chunks this subscriber missed because its buffer stayed full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain the subscription to the end and concatenate the text.
    pub async fn collect_text(mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.rx.recv().await {
            out.push_str(&chunk.text);
        }
        out
    }
}

/// Incremental UTF-8 decoder for byte streams split at arbitrary points.
///
/// Holds back an incomplete trailing sequence until the next push so that a
/// multi-byte character split across two SSH packets is not mangled.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let out = s.to_string();
                self.pending.clear();
                out
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                out
            }
            Err(_) => {
                let out = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                out
            }
        }
    }

    pub(crate) fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
