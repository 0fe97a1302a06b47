//! Asynchronous access log.
//!
//! Request handlers hand [`AccessLogRecord`]s to an [`AccessLog`] handle.
//! Records travel through a bounded channel to a single writer task that
//! owns the [`LogSink`], writes one line per record in arrival order and
//! syncs the sink about once per flush interval. A full channel makes
//! producers wait. The only records that can be lost are those of aborted
//! responses arriving while the channel and the overflow are both full.

pub mod sink;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::FrontdoorError;
pub use sink::{FileSink, LogSink, MemorySink};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One served request, as it appears in the access log.
#[derive(Debug, Clone)]
pub struct AccessLogRecord {
    pub timestamp: DateTime<Local>,
    pub client_ip: String,
    pub method: String,
    /// Path as received, before any rewriting.
    pub path: String,
    pub query: String,
    pub protocol: String,
    pub status: u16,
    pub bytes: u64,
    pub user_agent: String,
    pub host: String,
}

impl fmt::Display for AccessLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - - [{}] \"{} {}",
            self.client_ip,
            self.timestamp.format(CLF_TIME),
            self.method,
            self.path
        )?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        write!(
            f,
            " {}\" {} {} \"-\" \"{}\" {}",
            self.protocol, self.status, self.bytes, self.user_agent, self.host
        )
    }
}

/// Producer handle. Cheap to clone; the writer finishes once every clone
/// is dropped.
#[derive(Debug, Clone)]
pub struct AccessLog {
    tx: mpsc::Sender<AccessLogRecord>,
    pressure: Arc<Pressure>,
}

/// Shared full-queue bookkeeping across all clones of a handle.
#[derive(Debug, Default)]
struct Pressure {
    /// Set while the channel is known to be full; the warning fires on the
    /// transition only.
    full: AtomicBool,
    /// Sends parked on spawned tasks by [`AccessLog::submit`].
    detached: AtomicUsize,
    dropped: AtomicU64,
}

/// Room for exactly one record in the access log channel.
#[derive(Debug)]
pub struct LogSlot(mpsc::OwnedPermit<AccessLogRecord>);

impl LogSlot {
    pub fn send(self, record: AccessLogRecord) {
        self.0.send(record);
    }
}

/// Completion handle for the writer task.
#[derive(Debug)]
pub struct AccessLogWriter {
    handle: JoinHandle<()>,
}

impl AccessLog {
    /// Spawn the writer task on the current runtime.
    #[must_use]
    pub fn start(
        sink: Box<dyn LogSink>,
        capacity: usize,
        flush_every: Duration,
    ) -> (Self, AccessLogWriter) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_writer(sink, rx, flush_every));
        let log = Self {
            tx,
            pressure: Arc::new(Pressure::default()),
        };
        (log, AccessLogWriter { handle })
    }

    /// Queue a record, waiting for room if the channel is full.
    pub async fn log(&self, record: AccessLogRecord) -> Result<(), FrontdoorError> {
        self.reserve().await?.send(record);
        Ok(())
    }

    /// Wait for room in the channel without handing over a record yet.
    /// Dropping the future or the slot gives the room back.
    pub async fn reserve(&self) -> Result<LogSlot, FrontdoorError> {
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => {
                self.pressure.full.store(false, Ordering::Relaxed);
                Ok(LogSlot(permit))
            }
            Err(TrySendError::Full(tx)) => {
                self.note_full();
                tx.reserve_owned()
                    .await
                    .map(LogSlot)
                    .map_err(|_| FrontdoorError::AccessLogClosed)
            }
            Err(TrySendError::Closed(_)) => Err(FrontdoorError::AccessLogClosed),
        }
    }

    /// Queue a record from a context that cannot wait, such as a `Drop`
    /// impl. With the channel full the send is parked on a spawned task;
    /// at most one channel's worth of records is parked at a time, and
    /// anything past that is dropped and counted in [`AccessLog::dropped`].
    pub fn submit(&self, record: AccessLogRecord) {
        let record = match self.tx.try_send(record) {
            Ok(()) => {
                self.pressure.full.store(false, Ordering::Relaxed);
                return;
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("access log closed, record lost");
                return;
            }
            Err(TrySendError::Full(record)) => record,
        };
        self.note_full();

        let limit = self.tx.max_capacity();
        let parked = self.pressure.detached.fetch_add(1, Ordering::AcqRel);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) if parked < limit => {
                let tx = self.tx.clone();
                let pressure = Arc::clone(&self.pressure);
                runtime.spawn(async move {
                    if tx.send(record).await.is_err() {
                        tracing::warn!("access log closed before record was written");
                    }
                    pressure.detached.fetch_sub(1, Ordering::AcqRel);
                });
            }
            _ => {
                self.pressure.detached.fetch_sub(1, Ordering::AcqRel);
                let dropped = self.pressure.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::error!(dropped, "access log backlog exceeded, records lost");
                }
            }
        }
    }

    fn note_full(&self) {
        if !self.pressure.full.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                capacity = self.tx.max_capacity(),
                "access log queue is full, requests are waiting"
            );
        }
    }

    /// Records waiting in the channel.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Records from aborted responses that could not be queued.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.pressure.dropped.load(Ordering::Relaxed)
    }
}

impl AccessLogWriter {
    /// Wait for the writer to drain, sync and close its sink. Returns once
    /// every [`AccessLog`] clone has been dropped.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "access log writer failed");
        }
    }
}

async fn run_writer(
    mut sink: Box<dyn LogSink>,
    mut rx: mpsc::Receiver<AccessLogRecord>,
    flush_every: Duration,
) {
    let mut ticker = tokio::time::interval(flush_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut dirty = false;

    loop {
        tokio::select! {
            record = rx.recv() => {
                let Some(record) = record else { break };
                match sink.write_line(&record.to_string()).await {
                    Ok(()) => dirty = true,
                    Err(e) => tracing::warn!(error = %e, "failed to write access log record"),
                }
            }
            _ = ticker.tick(), if dirty => {
                if let Err(e) = sink.sync().await {
                    tracing::warn!(error = %e, "failed to sync access log");
                }
                dirty = false;
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::warn!(error = %e, "failed to close access log");
    }
    tracing::debug!("access log writer stopped");
}
