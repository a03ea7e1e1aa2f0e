//! Generic channel receiver
//!
//! Owns one subscription socket and one ingestion task, buffers decoded
//! messages in a bounded queue, and exposes non-blocking pulls. The wire
//! decoding is delegated to a `ChannelDecoder`, so the loop, queue and
//! lifecycle logic live here exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use bytes::Bytes;
use contracts::{ChannelKind, ChannelMessage};
use metrics::counter;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ChannelMetrics, ChannelStatistics, ReceiverConfig};
use crate::decoder::ChannelDecoder;
use crate::unix_timestamp;

// Largest datagram we accept; a UDP payload cannot exceed this anyway.
const MAX_DATAGRAM: usize = 65536;

/// One buffered channel receiver
///
/// The ingestion task exclusively owns the socket; the queue is the only
/// hand-off point between it and the consumer.
pub struct ChannelReceiver {
    config: ReceiverConfig,
    decoder: Arc<dyn ChannelDecoder>,
    tx: Sender<ChannelMessage>,
    rx: Receiver<ChannelMessage>,
    metrics: Arc<ChannelMetrics>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ChannelReceiver {
    /// Create a receiver for the given channel decoder.
    pub fn new(config: ReceiverConfig, decoder: Arc<dyn ChannelDecoder>) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_capacity.max(1));

        Self {
            config,
            decoder,
            tx,
            rx,
            metrics: Arc::new(ChannelMetrics::new()),
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// The channel this receiver serves.
    pub fn kind(&self) -> ChannelKind {
        self.decoder.kind()
    }

    /// Start the ingestion task. Idempotent; a second call warns and returns.
    #[instrument(name = "receiver_start", skip(self), fields(channel = %self.kind()))]
    pub fn start(&mut self) {
        if self.is_running() {
            warn!(channel = %self.kind(), "receiver already running");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        self.task = Some(tokio::spawn(ingest_loop(
            self.config.clone(),
            Arc::clone(&self.decoder),
            self.tx.clone(),
            self.rx.clone(),
            Arc::clone(&self.metrics),
            Arc::clone(&self.running),
        )));

        info!(channel = %self.kind(), addr = %self.config.bind_addr, "receiver started");
    }

    /// Stop the ingestion task.
    ///
    /// Signals cooperative shutdown and waits up to `timeout`. If the task
    /// does not exit in time it is aborted, which releases the socket either
    /// way. Returns true when the task exited cleanly (or was not running).
    #[instrument(name = "receiver_stop", skip(self), fields(channel = %self.kind()))]
    pub async fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);

        let Some(task) = self.task.take() else {
            return true;
        };

        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(_) => {
                info!(channel = %self.kind(), "receiver stopped");
                true
            }
            Err(_) => {
                abort.abort();
                warn!(
                    channel = %self.kind(),
                    "ingestion task did not stop within {:?}, aborted", timeout
                );
                false
            }
        }
    }

    /// Non-blocking pull of the oldest queued message.
    pub fn try_pull(&self) -> Option<ChannelMessage> {
        self.rx.try_recv().ok()
    }

    /// Pull with a bounded wait for the next message.
    pub async fn pull_timeout(&self, timeout: Duration) -> Option<ChannelMessage> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    /// True iff the ingestion task exists and is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Snapshot of this receiver's statistics.
    pub fn statistics(&self) -> ChannelStatistics {
        ChannelStatistics {
            channel: self.kind(),
            bind_addr: self.config.bind_addr,
            received_count: self.metrics.received_count(),
            error_count: self.metrics.error_count(),
            dropped_count: self.metrics.dropped_count(),
            queue_depth: self.rx.len(),
            running: self.is_running(),
            last_receive_time: self.metrics.last_receive_time(),
            downsampling: self.decoder.downsampling_statistics(),
            states: self.decoder.state_statistics(),
        }
    }
}

/// Ingestion loop, run on a dedicated task per receiver.
///
/// The socket receive is bounded by `poll_interval` so the stop signal is
/// observed regularly even when no data arrives. Per-message failures are
/// counted and logged but never terminate the loop.
async fn ingest_loop(
    config: ReceiverConfig,
    decoder: Arc<dyn ChannelDecoder>,
    tx: Sender<ChannelMessage>,
    rx: Receiver<ChannelMessage>,
    metrics: Arc<ChannelMetrics>,
    running: Arc<AtomicBool>,
) {
    let channel = decoder.kind();

    // Bind may fail transiently (address still in TIME_WAIT after a restart);
    // retry with backoff until stopped.
    let socket = loop {
        if !running.load(Ordering::Relaxed) {
            return;
        }
        match UdpSocket::bind(config.bind_addr).await {
            Ok(socket) => break socket,
            Err(e) => {
                metrics.record_error();
                error!(channel = %channel, addr = %config.bind_addr, error = %e, "socket bind failed, retrying");
                tokio::time::sleep(config.error_backoff).await;
            }
        }
    };
    debug!(channel = %channel, addr = %config.bind_addr, "subscription socket bound");

    let mut buf = vec![0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        let received = tokio::time::timeout(config.poll_interval, socket.recv_from(&mut buf)).await;

        match received {
            // Poll timeout: no data, go back around and re-check the stop signal.
            Err(_) => continue,

            Ok(Err(e)) => {
                metrics.record_error();
                warn!(channel = %channel, error = %e, "socket receive error");
                tokio::time::sleep(config.error_backoff).await;
            }

            Ok(Ok((len, _peer))) => {
                let raw = Bytes::copy_from_slice(&buf[..len]);
                match decoder.decode(raw) {
                    Ok(message) => {
                        metrics.record_received(unix_timestamp());
                        counter!("lcps_observer_messages_received_total", "channel" => channel.as_str())
                            .increment(1);
                        enqueue_latest(&tx, &rx, message, &metrics, channel);
                    }
                    Err(err) if err.is_encoding_mismatch() => {
                        metrics.record_error();
                        counter!("lcps_observer_decode_errors_total", "channel" => channel.as_str())
                            .increment(1);
                        error!(channel = %channel, error = %err, "wire encoding mismatch");
                        tokio::time::sleep(config.error_backoff).await;
                    }
                    Err(err) => {
                        metrics.record_error();
                        counter!("lcps_observer_decode_errors_total", "channel" => channel.as_str())
                            .increment(1);
                        warn!(channel = %channel, error = %err, "dropping undecodable message");
                        tokio::time::sleep(config.error_backoff).await;
                    }
                }
            }
        }
    }

    debug!(channel = %channel, "ingestion loop exited");
}

/// Enqueue a message, evicting the oldest entry when the queue is full.
///
/// Consumers of this tool care about the freshest state, not completeness, so
/// overflow drops the stalest message rather than the new one. The MPMC queue
/// lets the producer side hold a receiver clone for exactly this eviction.
fn enqueue_latest(
    tx: &Sender<ChannelMessage>,
    rx: &Receiver<ChannelMessage>,
    message: ChannelMessage,
    metrics: &ChannelMetrics,
    channel: ChannelKind,
) {
    match tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(message)) => {
            let _ = rx.try_recv();
            metrics.record_dropped();
            counter!("lcps_observer_messages_evicted_total", "channel" => channel.as_str())
                .increment(1);
            warn!(channel = %channel, "receiver queue full, evicted oldest message");
            // Single producer: the freed slot cannot refill before this send.
            let _ = tx.try_send(message);
        }
        Err(TrySendError::Closed(_)) => {
            warn!(channel = %channel, "receiver queue closed");
        }
    }
}
