//! Best-effort, append-only audit trail.
//!
//! Producers push events into a bounded queue with a non-blocking
//! [`AuditSink::record`]; a single drain task writes them in FIFO order. A full
//! queue or a failing writer drops events and never fails the operation that
//! produced them.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tenant_host_sdk::AuditEvent;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DROP_WARN_INTERVAL: Duration = Duration::from_secs(10);

/// Destination for drained audit events.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Appends one JSON object per line to `<data_root>/<tenant>/<file_name>`.
pub struct JsonlAuditWriter {
    data_root: PathBuf,
    file_name: String,
}

impl JsonlAuditWriter {
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            file_name: file_name.into(),
        }
    }
}

#[async_trait]
impl AuditWriter for JsonlAuditWriter {
    async fn write(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let dir = self.data_root.join(event.app_id.as_str());
        tokio::fs::create_dir_all(&dir).await?;

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(&self.file_name))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Lets at most one caller per interval through.
struct ThrottledLog {
    start: Instant,
    next_log_ms: AtomicU64,
    interval_ms: u64,
}

impl ThrottledLog {
    fn new(interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            next_log_ms: AtomicU64::new(0),
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn should_log(&self) -> bool {
        let now_ms = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let next = self.next_log_ms.load(Ordering::Relaxed);
        if now_ms < next {
            return false;
        }
        self.next_log_ms
            .compare_exchange(
                next,
                now_ms.saturating_add(self.interval_ms),
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

/// Producer side of the audit queue; cheap to clone.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEvent>,
    dropped: Arc<AtomicU64>,
    throttle: Arc<ThrottledLog>,
}

impl AuditSink {
    /// Create a sink and its drain with room for `capacity` queued events.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, AuditDrain) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            throttle: Arc::new(ThrottledLog::new(DROP_WARN_INTERVAL)),
        };
        (sink, AuditDrain { rx })
    }

    /// Queue `event` without waiting; drops it when the queue is full or closed.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if self.throttle.should_log() {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "sink closed",
                };
                tracing::warn!(reason, dropped_total = total, "audit event dropped");
            }
        }
    }

    /// Events dropped since the sink was created.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl crate::domain::ports::AuditRecorder for AuditSink {
    fn record(&self, event: AuditEvent) {
        AuditSink::record(self, event);
    }
}

/// Consumer side of the audit queue.
pub struct AuditDrain {
    rx: mpsc::Receiver<AuditEvent>,
}

impl AuditDrain {
    /// Spawn the drain task; see [`AuditDrain::run`].
    #[must_use]
    pub fn spawn(self, writer: Arc<dyn AuditWriter>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(writer, cancel))
    }

    /// Write events until `cancel` fires or every sink is gone, then flush
    /// whatever is still queued.
    pub async fn run(mut self, writer: Arc<dyn AuditWriter>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(event) => write_one(writer.as_ref(), &event).await,
                    None => return,
                },
            }
        }

        self.rx.close();
        let mut flushed = 0usize;
        while let Some(event) = self.rx.recv().await {
            write_one(writer.as_ref(), &event).await;
            flushed += 1;
        }
        tracing::debug!(flushed, "audit drain stopped");
    }
}

async fn write_one(writer: &dyn AuditWriter, event: &AuditEvent) {
    if let Err(e) = writer.write(event).await {
        tracing::warn!(
            tenant = %event.app_id,
            event = %event.event,
            error = %e,
            "audit write failed"
        );
    }
}
