//! Delivery queue and batch sender
//!
//! The event path enqueues normalized records; a background task owns the
//! flush decision. A batch goes out when the buffer reaches `batch_size`, or
//! when it is non-empty and `batch_timeout` has passed since the last flush.
//! Both triggers reset the flush clock whether or not delivery succeeds, and
//! a failed batch is dropped and reported, never retried. Without a
//! configured server the queue is inert and enqueue is a no-op.

use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BatchConf;
use crate::models::NormalizedRecord;
use crate::sink::{SinkClient, SinkError};

/// Flush tuning for the sender task
#[derive(Debug, Clone)]
pub struct UplinkTuning {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for UplinkTuning {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl From<&BatchConf> for UplinkTuning {
    fn from(conf: &BatchConf) -> Self {
        Self {
            batch_size: conf.size.max(1),
            batch_timeout: Duration::from_secs(conf.timeout_secs),
            poll_interval: Duration::from_secs(conf.poll_interval_secs.max(1)),
        }
    }
}

/// Record buffer shared between the event path and the sender task.
/// Appending never does I/O; the sender swaps the buffer out atomically so no
/// record is seen by two flushes or lost between swap and append.
#[derive(Clone, Default)]
pub struct UplinkQueue {
    buffer: Option<Arc<Mutex<Vec<NormalizedRecord>>>>,
}

impl UplinkQueue {
    pub fn new() -> Self {
        Self {
            buffer: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Inert queue for local-only mode
    pub fn disabled() -> Self {
        Self { buffer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn enqueue(&self, record: NormalizedRecord) {
        if let Some(buffer) = &self.buffer {
            buffer.lock().push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.as_ref().map(|b| b.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swaps the whole buffer out, leaving it empty
    pub fn drain(&self) -> Vec<NormalizedRecord> {
        self.buffer
            .as_ref()
            .map(|b| mem::take(&mut *b.lock()))
            .unwrap_or_default()
    }

    /// Swap-and-take when a flush trigger fires, else leave the buffer alone
    fn take_due(&self, tuning: &UplinkTuning, last_flush: Instant) -> Vec<NormalizedRecord> {
        let Some(buffer) = &self.buffer else {
            return Vec::new();
        };
        let mut buf = buffer.lock();
        let due = buf.len() >= tuning.batch_size
            || (!buf.is_empty() && last_flush.elapsed() >= tuning.batch_timeout);
        if due {
            mem::take(&mut *buf)
        } else {
            Vec::new()
        }
    }
}

/// Starts the background sender. It polls on a fixed cadence, owns the flush
/// decision, and on shutdown performs one final best-effort flush.
pub fn spawn_uplink_sender(
    queue: UplinkQueue,
    sink: SinkClient,
    tuning: UplinkTuning,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !queue.is_enabled() {
            debug!("uplink queue disabled, sender has nothing to do");
            return;
        }
        info!("☁️  uplink sender started - forwarding to {}", sink.base_url());

        let mut tick = tokio::time::interval(tuning.poll_interval);
        let mut last_flush = Instant::now();
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let batch = queue.take_due(&tuning, last_flush);
                    if !batch.is_empty() {
                        last_flush = Instant::now();
                        deliver(&sink, batch).await;
                    }
                }
                _ = shutdown.changed() => {
                    let batch = queue.drain();
                    if !batch.is_empty() {
                        info!("flushing {} queued record(s) before exit", batch.len());
                        deliver(&sink, batch).await;
                    }
                    break;
                }
            }
        }
    })
}

async fn deliver(sink: &SinkClient, batch: Vec<NormalizedRecord>) {
    let count = batch.len();
    match sink.deliver(&batch).await {
        Ok(_) => info!("☁️  ✓ sent {count} record(s) to cloud"),
        Err(SinkError::Status(code)) => {
            warn!("☁️  ✗ cloud returned {code}, dropping {count} record(s)");
        }
        Err(SinkError::Transport(e)) => {
            warn!("☁️  ✗ failed to reach cloud ({e}), dropping {count} record(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use meshpipe_devkit::{SinkStub, StubBehavior};

    fn record(n: usize) -> NormalizedRecord {
        NormalizedRecord {
            id: format!("msg_{n}_0"),
            kind: RecordKind::Message,
            timestamp: "2025-01-01 00:00:00".into(),
            from: "Test Node".into(),
            message: Some(format!("payload {n}")),
            location: None,
            altitude: None,
            rssi: None,
            snr: None,
            battery: None,
            map_link: None,
            voltage: None,
            channel_util: None,
            air_util: None,
            uptime_hours: None,
        }
    }

    fn fast_tuning(batch_size: usize, batch_timeout: Duration) -> UplinkTuning {
        UplinkTuning {
            batch_size,
            batch_timeout,
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_batch_size_trigger() {
        let stub = SinkStub::start().await.unwrap();
        let queue = UplinkQueue::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_uplink_sender(
            queue.clone(),
            SinkClient::new(stub.base_url()),
            fast_tuning(5, Duration::from_secs(60)),
            shutdown_rx,
        );

        for n in 0..5 {
            queue.enqueue(record(n));
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(stub.batch_count(), 1);
        assert_eq!(stub.record_count(), 5);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_below_size_waits_for_timeout() {
        let stub = SinkStub::start().await.unwrap();
        let queue = UplinkQueue::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_uplink_sender(
            queue.clone(),
            SinkClient::new(stub.base_url()),
            fast_tuning(100, Duration::from_millis(400)),
            shutdown_rx,
        );

        queue.enqueue(record(0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        // below both thresholds: nothing sent yet
        assert_eq!(stub.batch_count(), 0);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(stub.batch_count(), 1);
        assert_eq!(stub.record_count(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_dropped_not_retried() {
        let stub = SinkStub::start_with(StubBehavior::Status(500)).await.unwrap();
        let queue = UplinkQueue::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_uplink_sender(
            queue.clone(),
            SinkClient::new(stub.base_url()),
            fast_tuning(5, Duration::from_secs(60)),
            shutdown_rx,
        );

        for n in 0..5 {
            queue.enqueue(record(n));
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(stub.batch_count(), 1);
        assert!(queue.is_empty());

        // pipeline keeps going: the next batch is a fresh attempt, not a retry
        for n in 5..10 {
            queue.enqueue(record(n));
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(stub.batch_count(), 2);
        let batches = stub.batches();
        assert_eq!(batches[1][0]["id"], "msg_5_0");
    }

    #[tokio::test]
    async fn test_enqueue_stays_fast_with_hanging_sink() {
        let stub = SinkStub::start_with(StubBehavior::Hang).await.unwrap();
        let queue = UplinkQueue::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_uplink_sender(
            queue.clone(),
            SinkClient::new(stub.base_url()),
            fast_tuning(1, Duration::from_secs(60)),
            shutdown_rx,
        );

        // first record puts the sender into the hanging network call
        queue.enqueue(record(0));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let start = Instant::now();
        for n in 1..=100 {
            queue.enqueue(record(n));
        }
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(queue.len(), 100);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_remainder() {
        let stub = SinkStub::start().await.unwrap();
        let queue = UplinkQueue::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_uplink_sender(
            queue.clone(),
            SinkClient::new(stub.base_url()),
            fast_tuning(100, Duration::from_secs(60)),
            shutdown_rx,
        );

        queue.enqueue(record(0));
        queue.enqueue(record(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stub.batch_count(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(stub.batch_count(), 1);
        assert_eq!(stub.record_count(), 2);
    }

    #[tokio::test]
    async fn test_disabled_queue_is_inert() {
        let queue = UplinkQueue::disabled();
        assert!(!queue.is_enabled());
        queue.enqueue(record(0));
        assert_eq!(queue.len(), 0);
        assert!(queue.drain().is_empty());
    }
}
