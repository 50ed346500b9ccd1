//! Driver facade: request dispatch and outward events.
//!
//! [`DriverBuilder`] wires a transport and configuration together;
//! [`Driver`] owns the single task that services host requests and link
//! events. Host messages keep the `{topic, payload}` JSON shape of the
//! original integration: requests name a topic like `play` or `fade`,
//! and events come back as `status`, `reporting`, or `sysinfo`.
//!
//! Everything runs on one task: requests and link events are multiplexed
//! with `select!`, so no state is shared across threads and writes reach
//! the transport in the order they were issued. Commands never wait for a
//! device reply — the wire has no request/response correlation.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::DriverConfig;
use crate::connection::{ConnectionManager, LinkEvent};
use crate::error::{DriverError, Result};
use crate::protocol::{encode, Command, ControlCode, InboundEvent};
use crate::tracker::{TrackStateTracker, TrackStatus};
use crate::transport::{SerialTransport, Transport};

/// Capacity of the host-facing request and event channels.
const CHANNEL_CAPACITY: usize = 64;

/// Fade duration used when the request carries none.
const DEFAULT_FADE_MS: u16 = 2000;

/// A host command request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    /// Command topic: `play`, `play_mix`, `pause`, `resume`, `stop`,
    /// `stop_all`, `loop_on`, `loop_off`, `volume`, `fade`,
    /// `output_volume`, or `get_sys_info`.
    pub topic: String,
    /// Structured parameters.
    #[serde(default)]
    pub payload: RequestPayload,
    /// Fade duration in milliseconds (`fade` only).
    #[serde(default)]
    pub duration: Option<u16>,
}

/// Structured parameters of a request.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RequestPayload {
    /// Track id, passed to the wire unchanged.
    pub track: Option<u16>,
    /// Output channel, 1-based.
    pub output: Option<u8>,
    /// Gain in dB, signed.
    pub volume: Option<i16>,
}

impl Request {
    /// Build a request from a bare topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Parse the JSON line format used by the host.
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Set the track id.
    pub fn track(mut self, track: u16) -> Self {
        self.payload.track = Some(track);
        self
    }

    /// Set the output channel (1-based).
    pub fn output(mut self, output: u8) -> Self {
        self.payload.output = Some(output);
        self
    }

    /// Set the gain in dB.
    pub fn volume(mut self, volume: i16) -> Self {
        self.payload.volume = Some(volume);
        self
    }

    /// Set the fade duration in milliseconds.
    pub fn duration(mut self, duration_ms: u16) -> Self {
        self.duration = Some(duration_ms);
        self
    }
}

/// Link status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
    Error,
}

/// Playing/stopped vocabulary of the reporting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackReport {
    Playing,
    Stopped,
}

/// Outward event toward the host, serialized as `{topic, payload}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
pub enum DriverEvent {
    /// Link lifecycle change.
    Status(LinkStatus),
    /// A track's playback state, from a device report or a command echo.
    Reporting { track: u16, status: PlaybackReport },
    /// Device voice and track counts.
    Sysinfo { voices: u8, tracks: u16 },
}

enum DriverMessage {
    Request(Request),
    Shutdown,
}

/// Cheaply cloneable handle for sending requests to the driver task.
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverMessage>,
}

impl DriverHandle {
    /// Queue a request, fire-and-forget. Unknown topics are dropped by
    /// the driver, not rejected here.
    pub async fn request(&self, request: Request) -> Result<()> {
        self.tx
            .send(DriverMessage::Request(request))
            .await
            .map_err(|_| DriverError::ShutDown)
    }

    /// Ask the driver to shut down. Idempotent; a driver that is already
    /// gone is not an error.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(DriverMessage::Shutdown).await;
    }
}

/// Builder for configuring and starting a [`Driver`].
pub struct DriverBuilder {
    config: DriverConfig,
    transport: Option<Box<dyn Transport>>,
}

impl DriverBuilder {
    /// Create a builder from a configuration.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Substitute the transport. Defaults to a serial port on the
    /// configured device; tests plug in-memory links in here.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Spawn the driver task and return the running driver.
    pub fn start(self) -> Driver {
        let transport = self.transport.unwrap_or_else(|| {
            Box::new(SerialTransport::new(
                self.config.device.clone(),
                self.config.baud_rate,
            ))
        });
        Driver::start(self.config, transport)
    }
}

/// A running Tsunami driver.
///
/// Requests go in through [`request`](Self::request) (or a cloned
/// [`DriverHandle`]); status, reporting, and sysinfo events come out of
/// [`next_event`](Self::next_event).
pub struct Driver {
    handle: DriverHandle,
    events: mpsc::Receiver<DriverEvent>,
    task: JoinHandle<()>,
}

impl Driver {
    /// Create a driver builder.
    pub fn builder(config: DriverConfig) -> DriverBuilder {
        DriverBuilder::new(config)
    }

    fn start(config: DriverConfig, transport: Box<dyn Transport>) -> Driver {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let dispatcher = Dispatcher {
            conn: ConnectionManager::new(transport, config.reconnect_interval()),
            tracker: TrackStateTracker::new(),
            rx,
            events: event_tx,
        };
        let task = tokio::spawn(dispatcher.run());
        Driver {
            handle: DriverHandle { tx },
            events: event_rx,
            task,
        }
    }

    /// Get a cloneable request handle.
    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Queue a request on the driver task.
    pub async fn request(&self, request: Request) -> Result<()> {
        self.handle.request(request).await
    }

    /// Receive the next outward event. `None` once the driver task ends.
    pub async fn next_event(&mut self) -> Option<DriverEvent> {
        self.events.recv().await
    }

    /// Shut the driver down and wait for its task to finish.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        let _ = self.task.await;
    }
}

/// The single driver task: multiplexes host requests and link events.
struct Dispatcher {
    conn: ConnectionManager,
    tracker: TrackStateTracker,
    rx: mpsc::Receiver<DriverMessage>,
    events: mpsc::Sender<DriverEvent>,
}

impl Dispatcher {
    async fn run(mut self) {
        if self.conn.open().await {
            self.emit(DriverEvent::Status(LinkStatus::Connected)).await;
        } else {
            self.emit(DriverEvent::Status(LinkStatus::Disconnected))
                .await;
        }

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(DriverMessage::Request(request)) => self.handle_request(request).await,
                    Some(DriverMessage::Shutdown) | None => break,
                },
                event = self.conn.next_event() => self.handle_link_event(event).await,
            }
        }

        self.conn.shutdown();
        self.emit(DriverEvent::Status(LinkStatus::Disconnected))
            .await;
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => self.emit(DriverEvent::Status(LinkStatus::Connected)).await,
            LinkEvent::Disconnected => {
                self.emit(DriverEvent::Status(LinkStatus::Disconnected))
                    .await
            }
            LinkEvent::Errored => self.emit(DriverEvent::Status(LinkStatus::Error)).await,
            LinkEvent::Inbound(InboundEvent::TrackReport { track, playing }) => {
                // The device always wins over optimistic state.
                self.tracker.reconcile(track, playing);
                let status = if playing {
                    PlaybackReport::Playing
                } else {
                    PlaybackReport::Stopped
                };
                self.emit(DriverEvent::Reporting { track, status }).await;
            }
            LinkEvent::Inbound(InboundEvent::SysInfo { voices, tracks }) => {
                self.emit(DriverEvent::Sysinfo { voices, tracks }).await;
            }
        }
    }

    async fn handle_request(&mut self, request: Request) {
        let RequestPayload {
            track,
            output,
            volume,
        } = request.payload;
        // Output defaults to the first channel when the host omits it.
        let output = output.unwrap_or(1);

        match request.topic.as_str() {
            "play" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                self.control(ControlCode::Play, track, output, Some(TrackStatus::Playing))
                    .await;
            }
            "play_mix" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                match self.tracker.status(track) {
                    // Already audible; a second start would double the voice.
                    TrackStatus::Playing => {}
                    TrackStatus::Paused => {
                        self.control(
                            ControlCode::Resume,
                            track,
                            output,
                            Some(TrackStatus::Playing),
                        )
                        .await
                    }
                    TrackStatus::Stopped => {
                        self.control(
                            ControlCode::PlayMix,
                            track,
                            output,
                            Some(TrackStatus::Playing),
                        )
                        .await
                    }
                }
            }
            "pause" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                // Pausing anything but a playing track sends no frame.
                if self.tracker.status(track) == TrackStatus::Playing {
                    self.control(ControlCode::Pause, track, output, Some(TrackStatus::Paused))
                        .await;
                }
            }
            "resume" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                self.control(
                    ControlCode::Resume,
                    track,
                    output,
                    Some(TrackStatus::Playing),
                )
                .await;
            }
            "stop" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                self.control(ControlCode::Stop, track, output, Some(TrackStatus::Stopped))
                    .await;
            }
            "loop_on" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                self.control(ControlCode::LoopOn, track, output, None).await;
            }
            "loop_off" => {
                let Some(track) = track else {
                    return self.drop_request(&request.topic);
                };
                self.control(ControlCode::LoopOff, track, output, None).await;
            }
            "stop_all" => {
                // Per-track stopped states arrive via device reports.
                self.send(&encode(&Command::StopAll)).await;
            }
            "volume" => {
                let (Some(track), Some(volume)) = (track, volume) else {
                    return self.drop_request(&request.topic);
                };
                self.send(&encode(&Command::TrackVolume { track, volume }))
                    .await;
            }
            "fade" => {
                let (Some(track), Some(volume)) = (track, volume) else {
                    return self.drop_request(&request.topic);
                };
                let duration_ms = request.duration.unwrap_or(DEFAULT_FADE_MS);
                self.send(&encode(&Command::TrackFade {
                    track,
                    volume,
                    duration_ms,
                }))
                .await;
            }
            "output_volume" => {
                let Some(volume) = volume else {
                    return self.drop_request(&request.topic);
                };
                self.send(&encode(&Command::OutputVolume { output, volume }))
                    .await;
            }
            "get_sys_info" => {
                self.send(&encode(&Command::GetSysInfo)).await;
            }
            other => {
                tracing::debug!("ignoring unknown topic: {}", other);
            }
        }
    }

    /// Send one CONTROL_TRACK frame; on success apply the optimistic
    /// status and mirror it outward where the vocabulary allows.
    async fn control(
        &mut self,
        code: ControlCode,
        track: u16,
        output: u8,
        next: Option<TrackStatus>,
    ) {
        let frame = encode(&Command::ControlTrack {
            code,
            track,
            output,
        });
        if !self.send(&frame).await {
            return;
        }
        let Some(next) = next else { return };
        self.tracker.set(track, next);
        let status = match next {
            TrackStatus::Playing => PlaybackReport::Playing,
            TrackStatus::Stopped => PlaybackReport::Stopped,
            // Paused has no slot in the reporting vocabulary.
            TrackStatus::Paused => return,
        };
        self.emit(DriverEvent::Reporting { track, status }).await;
    }

    /// Write a frame. A write while disconnected is benign and just
    /// dropped; an I/O failure surfaces as a status event (the connection
    /// manager has already armed the retry timer).
    async fn send(&mut self, frame: &[u8]) -> bool {
        match self.conn.write(frame).await {
            Ok(()) => true,
            Err(DriverError::NotConnected) => {
                tracing::warn!("link down, dropping command");
                false
            }
            Err(e) => {
                tracing::warn!("write failed: {}", e);
                self.emit(DriverEvent::Status(LinkStatus::Error)).await;
                false
            }
        }
    }

    fn drop_request(&self, topic: &str) {
        tracing::warn!("request '{}' missing required parameters, dropped", topic);
    }

    async fn emit(&mut self, event: DriverEvent) {
        // A host that stopped listening is fine; keep servicing the device.
        let _ = self.events.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::FakeTransport;

    use serde_json::json;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    fn dispatcher(links: Vec<Option<DuplexStream>>) -> (Dispatcher, mpsc::Receiver<DriverEvent>) {
        let (_, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let dispatcher = Dispatcher {
            conn: ConnectionManager::new(
                Box::new(FakeTransport::new(links)),
                std::time::Duration::from_millis(1000),
            ),
            tracker: TrackStateTracker::new(),
            rx,
            events: event_tx,
        };
        (dispatcher, event_rx)
    }

    async fn connected_dispatcher() -> (Dispatcher, mpsc::Receiver<DriverEvent>, DuplexStream) {
        let (link, mut device) = duplex(1024);
        let (mut dispatcher, events) = dispatcher(vec![Some(link)]);
        assert!(dispatcher.conn.open().await);
        // Consume the reporting-enable frame written on connect.
        let mut buf = [0u8; 6];
        device.read_exact(&mut buf).await.unwrap();
        (dispatcher, events, device)
    }

    async fn read_exact(device: &mut DuplexStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        device.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_play_emits_exact_frame_and_marks_playing() {
        let (mut d, mut events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("play").track(3).output(1))
            .await;

        let bytes = read_exact(&mut device, 10).await;
        assert_eq!(
            bytes,
            [0xF0, 0xAA, 0x0A, 0x03, 0x00, 0x03, 0x00, 0x00, 0x00, 0x55]
        );
        assert_eq!(d.tracker.status(3), TrackStatus::Playing);
        assert_eq!(
            events.recv().await,
            Some(DriverEvent::Reporting {
                track: 3,
                status: PlaybackReport::Playing
            })
        );
    }

    #[tokio::test]
    async fn test_stop_all_exact_frame_and_no_track_mutation() {
        let (mut d, _events, mut device) = connected_dispatcher().await;
        d.tracker.set(3, TrackStatus::Playing);

        d.handle_request(Request::new("stop_all")).await;

        let bytes = read_exact(&mut device, 5).await;
        assert_eq!(bytes, [0xF0, 0xAA, 0x05, 0x04, 0x55]);
        // Stop-all leaves per-track state to device reports.
        assert_eq!(d.tracker.status(3), TrackStatus::Playing);
    }

    #[tokio::test]
    async fn test_pause_while_stopped_sends_no_frame() {
        let (mut d, _events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("pause").track(5)).await;
        // A follow-up query proves the pause wrote nothing before it.
        d.handle_request(Request::new("get_sys_info")).await;

        let bytes = read_exact(&mut device, 5).await;
        assert_eq!(bytes, [0xF0, 0xAA, 0x05, 0x02, 0x55]);
        assert_eq!(d.tracker.status(5), TrackStatus::Stopped);
    }

    #[tokio::test]
    async fn test_pause_while_playing_sends_frame_and_pauses() {
        let (mut d, _events, mut device) = connected_dispatcher().await;
        d.tracker.set(4, TrackStatus::Playing);

        d.handle_request(Request::new("pause").track(4)).await;

        let bytes = read_exact(&mut device, 10).await;
        assert_eq!(bytes[4], 2); // pause control code
        assert_eq!(d.tracker.status(4), TrackStatus::Paused);
    }

    #[tokio::test]
    async fn test_play_mix_twice_sends_one_frame() {
        let (mut d, _events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("play_mix").track(8)).await;
        d.handle_request(Request::new("play_mix").track(8)).await;
        d.handle_request(Request::new("get_sys_info")).await;

        let first = read_exact(&mut device, 10).await;
        assert_eq!(first[4], 1); // play-mix control code
        let second = read_exact(&mut device, 5).await;
        assert_eq!(second[3], 0x02); // straight to sysinfo: no second mix frame
        assert_eq!(d.tracker.status(8), TrackStatus::Playing);
    }

    #[tokio::test]
    async fn test_play_mix_while_paused_resumes() {
        let (mut d, _events, mut device) = connected_dispatcher().await;
        d.tracker.set(8, TrackStatus::Paused);

        d.handle_request(Request::new("play_mix").track(8)).await;

        let bytes = read_exact(&mut device, 10).await;
        assert_eq!(bytes[4], 3); // resume control code
        assert_eq!(d.tracker.status(8), TrackStatus::Playing);
    }

    #[tokio::test]
    async fn test_track_report_overrides_optimistic_state() {
        let (mut d, mut events, _device) = connected_dispatcher().await;
        d.tracker.set(2, TrackStatus::Playing);

        d.handle_link_event(LinkEvent::Inbound(InboundEvent::TrackReport {
            track: 2,
            playing: false,
        }))
        .await;

        assert_eq!(d.tracker.status(2), TrackStatus::Stopped);
        assert_eq!(
            events.recv().await,
            Some(DriverEvent::Reporting {
                track: 2,
                status: PlaybackReport::Stopped
            })
        );
    }

    #[tokio::test]
    async fn test_fade_defaults_duration() {
        let (mut d, _events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("fade").track(1).volume(-40))
            .await;

        let bytes = read_exact(&mut device, 12).await;
        assert_eq!(bytes[3], 0x0A);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 2000);
    }

    #[tokio::test]
    async fn test_unknown_topic_is_ignored() {
        let (mut d, _events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("self_destruct")).await;
        d.handle_request(Request::new("get_sys_info")).await;

        let bytes = read_exact(&mut device, 5).await;
        assert_eq!(bytes[3], 0x02);
    }

    #[tokio::test]
    async fn test_missing_parameters_drop_request() {
        let (mut d, _events, mut device) = connected_dispatcher().await;

        d.handle_request(Request::new("play")).await; // no track
        d.handle_request(Request::new("volume").track(1)).await; // no volume
        d.handle_request(Request::new("get_sys_info")).await;

        let bytes = read_exact(&mut device, 5).await;
        assert_eq!(bytes[3], 0x02);
    }

    #[tokio::test]
    async fn test_write_while_disconnected_drops_without_state_change() {
        let (mut d, _events) = dispatcher(vec![]);

        d.handle_request(Request::new("play").track(3)).await;

        assert_eq!(d.tracker.status(3), TrackStatus::Stopped);
    }

    #[test]
    fn test_request_from_json() {
        let request = Request::from_json(
            r#"{"topic": "fade", "payload": {"track": 9, "volume": -20}, "duration": 500}"#,
        )
        .unwrap();
        assert_eq!(request.topic, "fade");
        assert_eq!(request.payload.track, Some(9));
        assert_eq!(request.payload.volume, Some(-20));
        assert_eq!(request.duration, Some(500));
    }

    #[test]
    fn test_request_from_json_rejects_garbage() {
        assert!(Request::from_json("not json").is_err());
    }

    #[test]
    fn test_event_json_shapes() {
        assert_eq!(
            serde_json::to_value(DriverEvent::Status(LinkStatus::Connected)).unwrap(),
            json!({"topic": "status", "payload": "connected"})
        );
        assert_eq!(
            serde_json::to_value(DriverEvent::Reporting {
                track: 2,
                status: PlaybackReport::Playing
            })
            .unwrap(),
            json!({"topic": "reporting", "payload": {"track": 2, "status": "playing"}})
        );
        assert_eq!(
            serde_json::to_value(DriverEvent::Sysinfo {
                voices: 18,
                tracks: 4096
            })
            .unwrap(),
            json!({"topic": "sysinfo", "payload": {"voices": 18, "tracks": 4096}})
        );
    }
}
