//! Connection lifecycle state machine.
//!
//! Owns the physical link: open/close/error transitions, the recurring
//! reconnection timer, and decoding of inbound bytes into events. All of
//! it lives in explicit fields of one struct — one driver instance means
//! one connection, one timer, one decode buffer, nothing process-wide.
//!
//! State transitions:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──┬─► Disconnected (EOF / shutdown)
//!       ▲                                     └─► Errored (I/O failure)
//!       └───────────── retry timer ◄──────────────────┘
//! ```
//!
//! `Errored` and `Disconnected` arm the same recurring retry timer; at
//! most one timer exists and reaching `Connected` cancels it.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::{DriverError, Result};
use crate::protocol::{encode, Command, FrameDecoder, InboundEvent};
use crate::transport::{Transport, TransportLink};

/// Read chunk size. Frames are tiny and serial links are slow.
const READ_BUF_SIZE: usize = 256;

/// Lifecycle state of the managed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link; initial state and the result of a clean close.
    Disconnected,
    /// An open attempt is in flight.
    Connecting,
    /// Link is up; reads and writes flow.
    Connected,
    /// Link failed with an I/O error; retrying.
    Errored,
}

/// What happened on the link since the last await.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link came (back) up.
    Connected,
    /// The link closed cleanly (EOF).
    Disconnected,
    /// The link failed with an I/O error.
    Errored,
    /// A decoded status frame from the device.
    Inbound(InboundEvent),
}

/// Owns the link and drives its lifecycle.
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    link: Option<Box<dyn TransportLink>>,
    state: ConnectionState,
    decoder: FrameDecoder,
    pending: VecDeque<InboundEvent>,
    retry: Option<Interval>,
    reconnect_interval: Duration,
    closed: bool,
}

impl ConnectionManager {
    /// Create a manager around a transport. No link is opened yet.
    pub fn new(transport: Box<dyn Transport>, reconnect_interval: Duration) -> Self {
        Self {
            transport,
            link: None,
            state: ConnectionState::Disconnected,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            retry: None,
            reconnect_interval,
            closed: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while the link is up.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True after [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.closed
    }

    /// True while a reconnection timer is armed.
    pub fn retry_armed(&self) -> bool {
        self.retry.is_some()
    }

    /// Try to bring the link up.
    ///
    /// On success: state becomes `Connected`, the retry timer is
    /// cancelled, stale decode state is dropped, and reporting is enabled
    /// on the device so status frames start flowing. On failure the retry
    /// timer keeps (or starts) ticking; the failure itself is not fatal.
    pub async fn open(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.is_connected() {
            return true;
        }
        self.state = ConnectionState::Connecting;
        match self.transport.open().await {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Connected;
                self.retry = None;
                self.decoder.reset();
                self.pending.clear();
                tracing::debug!("link up");
                // The device stays silent unless asked to report.
                let frame = encode(&Command::SetReporting { enabled: true });
                if let Err(e) = self.write(&frame).await {
                    tracing::warn!("failed to enable reporting: {}", e);
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::debug!("open failed: {}", e);
                self.state = ConnectionState::Disconnected;
                self.arm_retry();
                false
            }
        }
    }

    /// Write raw frame bytes to the link, fire-and-forget.
    ///
    /// The wire has no acknowledgement, so nothing is awaited beyond the
    /// transport's own buffering. While disconnected the bytes are dropped
    /// and `NotConnected` reports the failed side effect. An I/O failure
    /// tears the link down and arms the retry timer.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(link) = self.link.as_mut() else {
            return Err(DriverError::NotConnected);
        };
        let result = async {
            link.write_all(bytes).await?;
            link.flush().await
        }
        .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_link();
                Err(DriverError::Io(e))
            }
        }
    }

    /// Permanently close the connection.
    ///
    /// Cancels the retry timer, drops the link (which closes it), and
    /// forbids any future reconnection. Idempotent and safe to call at
    /// any point in a reconnection cycle; no timer callback or open
    /// attempt happens afterwards.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.retry = None;
        self.link = None;
        self.state = ConnectionState::Disconnected;
        tracing::debug!("connection shut down");
    }

    /// Await the next link event.
    ///
    /// The driver's only suspension point for inbound activity: buffered
    /// decoded frames drain first, then the link is read, then the retry
    /// timer ticks. After [`shutdown`](Self::shutdown) this pends forever.
    pub async fn next_event(&mut self) -> LinkEvent {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return LinkEvent::Inbound(event);
            }
            if let Some(link) = self.link.as_mut() {
                let mut buf = [0u8; READ_BUF_SIZE];
                match link.read(&mut buf).await {
                    Ok(0) => {
                        tracing::debug!("link closed by peer");
                        self.close_link();
                        return LinkEvent::Disconnected;
                    }
                    Ok(n) => {
                        let events = self.decoder.push(&buf[..n]);
                        self.pending.extend(events);
                    }
                    Err(e) => {
                        tracing::warn!("link read error: {}", e);
                        self.fail_link();
                        return LinkEvent::Errored;
                    }
                }
            } else if let Some(timer) = self.retry.as_mut() {
                timer.tick().await;
                if self.open().await {
                    return LinkEvent::Connected;
                }
            } else {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Arm the recurring reconnection timer. At most one timer exists;
    /// re-arming while one is active keeps the existing schedule.
    fn arm_retry(&mut self) {
        if self.closed || self.retry.is_some() {
            return;
        }
        let period = self.reconnect_interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.retry = Some(timer);
    }

    fn close_link(&mut self) {
        self.link = None;
        self.state = ConnectionState::Disconnected;
        self.arm_retry();
    }

    fn fail_link(&mut self) {
        self.link = None;
        self.state = ConnectionState::Errored;
        self.arm_retry();
    }
}
