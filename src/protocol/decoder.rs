//! Inbound frame decoding.
//!
//! Once reporting is enabled the device emits asynchronous status frames.
//! Serial reads arrive at arbitrary chunk boundaries, so the decoder
//! accumulates bytes in a `BytesMut` and only emits events for complete
//! frames; a frame split across any number of reads decodes identically
//! to one fed whole.
//!
//! The declared LEN byte is not trusted for recognized frames: the
//! device's TRACK_REPORT declares 10 bytes while occupying 11, so each
//! recognized command uses a fixed total length and requires EOM at that
//! offset. Anything that fails alignment is discarded and scanning
//! resumes at the next candidate SOM1 byte.

use bytes::{Buf, BytesMut};

use super::wire::{EOM, RSP_SYSINFO, RSP_TRACK_REPORT, SOM1, SOM2};

/// Total bytes of a TRACK_REPORT frame (its LEN byte declares 10).
const TRACK_REPORT_LEN: usize = 11;

/// Total bytes of a SYSINFO frame.
const SYSINFO_LEN: usize = 8;

/// Shortest possible frame: SOM1 SOM2 LEN CMD EOM.
const MIN_FRAME_LEN: usize = 5;

/// Upper bound on a plausible declared length when skipping unknown frames.
const MAX_FRAME_LEN: usize = 32;

/// A decoded status frame from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEvent {
    /// A track started or stopped playing on the device.
    TrackReport { track: u16, playing: bool },
    /// Reply to a GetSysInfo query.
    SysInfo { voices: u8, tracks: u16 },
}

/// Accumulates raw link bytes and extracts complete inbound frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Feed a chunk of raw bytes and drain every complete frame.
    ///
    /// Partial frames stay buffered for the next push. Unrecognized or
    /// misaligned frames are skipped silently (logged at debug level).
    pub fn push(&mut self, data: &[u8]) -> Vec<InboundEvent> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            // Align on the next candidate start marker.
            match self.buf.iter().position(|&b| b == SOM1) {
                Some(0) => {}
                Some(n) => {
                    tracing::debug!("discarding {} bytes before start marker", n);
                    self.buf.advance(n);
                }
                None => {
                    self.buf.clear();
                    return events;
                }
            }

            if self.buf.len() < 4 {
                return events;
            }
            if self.buf[1] != SOM2 {
                self.buf.advance(1);
                continue;
            }

            match self.buf[3] {
                RSP_TRACK_REPORT => {
                    if self.buf.len() < TRACK_REPORT_LEN {
                        return events;
                    }
                    if self.buf[TRACK_REPORT_LEN - 1] != EOM {
                        self.buf.advance(1);
                        continue;
                    }
                    let track = u16::from_le_bytes([self.buf[4], self.buf[5]]);
                    let playing = self.buf[7] != 0;
                    self.buf.advance(TRACK_REPORT_LEN);
                    events.push(InboundEvent::TrackReport { track, playing });
                }
                RSP_SYSINFO => {
                    if self.buf.len() < SYSINFO_LEN {
                        return events;
                    }
                    if self.buf[SYSINFO_LEN - 1] != EOM {
                        self.buf.advance(1);
                        continue;
                    }
                    let voices = self.buf[4];
                    let tracks = u16::from_le_bytes([self.buf[5], self.buf[6]]);
                    self.buf.advance(SYSINFO_LEN);
                    events.push(InboundEvent::SysInfo { voices, tracks });
                }
                cmd => {
                    // Unknown frame: honor the declared length if the
                    // trailer lines up, otherwise resync byte by byte.
                    let declared = self.buf[2] as usize;
                    if (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&declared) {
                        if self.buf.len() < declared {
                            return events;
                        }
                        if self.buf[declared - 1] == EOM {
                            tracing::debug!(
                                "skipping unrecognized frame cmd=0x{:02X} len={}",
                                cmd,
                                declared
                            );
                            self.buf.advance(declared);
                            continue;
                        }
                    }
                    self.buf.advance(1);
                }
            }
        }
    }

    /// Drop any buffered partial frame (stale after a reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes awaiting more data.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
