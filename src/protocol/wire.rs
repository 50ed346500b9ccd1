//! Outgoing command encoding.
//!
//! Every Tsunami frame uses the same fixed framing:
//!
//! ```text
//! ┌──────┬──────┬─────┬─────┬─────────────┬──────┐
//! │ SOM1 │ SOM2 │ LEN │ CMD │ payload ... │ EOM  │
//! │ 0xF0 │ 0xAA │     │     │             │ 0x55 │
//! └──────┴──────┴─────┴─────┴─────────────┴──────┘
//! ```
//!
//! `LEN` is the declared total frame length (header + payload + trailer).
//! There is no checksum: `EOM` is a constant trailer, not a computed value,
//! and nothing on the wire acknowledges delivery. All multi-byte fields are
//! Little Endian.

/// First start-of-message marker byte.
pub const SOM1: u8 = 0xF0;

/// Second start-of-message marker byte.
pub const SOM2: u8 = 0xAA;

/// End-of-message marker byte (constant, not a checksum).
pub const EOM: u8 = 0x55;

// Outgoing command bytes.
pub(crate) const CMD_GET_SYS_INFO: u8 = 0x02;
pub(crate) const CMD_CONTROL_TRACK: u8 = 0x03;
pub(crate) const CMD_STOP_ALL: u8 = 0x04;
pub(crate) const CMD_OUTPUT_VOLUME: u8 = 0x05;
pub(crate) const CMD_TRACK_VOLUME: u8 = 0x08;
pub(crate) const CMD_TRACK_FADE: u8 = 0x0A;
pub(crate) const CMD_SET_REPORTING: u8 = 0x0D;

// Inbound command bytes (device to host).
pub(crate) const RSP_SYSINFO: u8 = 0x82;
pub(crate) const RSP_TRACK_REPORT: u8 = 0x84;

/// Transport-control sub-code carried by a CONTROL_TRACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlCode {
    /// Start the track, replacing anything playing on the same voice.
    Play = 0,
    /// Start the track mixed with whatever is already playing.
    PlayMix = 1,
    /// Pause the track, keeping its position.
    Pause = 2,
    /// Resume a paused track.
    Resume = 3,
    /// Stop the track.
    Stop = 4,
    /// Enable looping for the track.
    LoopOn = 5,
    /// Disable looping for the track.
    LoopOff = 6,
}

/// Tagged union of every command the device accepts.
///
/// Track ids are passed to the wire unchanged; outputs are 1-based in the
/// API and 0-based on the wire for CONTROL_TRACK. Volumes are signed
/// 16-bit gain values in dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play/pause/stop style transport control for one track.
    ControlTrack {
        code: ControlCode,
        track: u16,
        output: u8,
    },
    /// Stop every playing track at once.
    StopAll,
    /// Set the gain of a single track.
    TrackVolume { track: u16, volume: i16 },
    /// Set the gain of a physical output channel.
    OutputVolume { output: u8, volume: i16 },
    /// Fade a track to a target gain over a duration.
    TrackFade {
        track: u16,
        volume: i16,
        duration_ms: u16,
    },
    /// Ask the device for its voice count and track count.
    GetSysInfo,
    /// Enable or disable asynchronous track status reporting.
    SetReporting { enabled: bool },
}

/// Encode a command into its exact wire frame.
///
/// Pure and reentrant: every call builds its own buffer. The declared LEN
/// byte equals the emitted byte count for every command except
/// `OutputVolume`, which declares 8 while emitting 9 bytes — the trailer
/// sits at offset 7 followed by a stray zero. That mismatch is observed
/// device-facing behavior and is preserved as-is.
pub fn encode(command: &Command) -> Vec<u8> {
    match *command {
        Command::ControlTrack {
            code,
            track,
            output,
        } => {
            let [track_lsb, track_msb] = track.to_le_bytes();
            vec![
                SOM1,
                SOM2,
                10,
                CMD_CONTROL_TRACK,
                code as u8,
                track_lsb,
                track_msb,
                output.saturating_sub(1),
                0x00,
                EOM,
            ]
        }
        Command::StopAll => vec![SOM1, SOM2, 5, CMD_STOP_ALL, EOM],
        Command::TrackVolume { track, volume } => {
            let [track_lsb, track_msb] = track.to_le_bytes();
            let [vol_lsb, vol_msb] = volume.to_le_bytes();
            vec![
                SOM1,
                SOM2,
                9,
                CMD_TRACK_VOLUME,
                track_lsb,
                track_msb,
                vol_lsb,
                vol_msb,
                EOM,
            ]
        }
        Command::OutputVolume { output, volume } => {
            let [vol_lsb, vol_msb] = volume.to_le_bytes();
            vec![
                SOM1,
                SOM2,
                8,
                CMD_OUTPUT_VOLUME,
                output,
                vol_lsb,
                vol_msb,
                EOM,
                0x00,
            ]
        }
        Command::TrackFade {
            track,
            volume,
            duration_ms,
        } => {
            let [track_lsb, track_msb] = track.to_le_bytes();
            let [vol_lsb, vol_msb] = volume.to_le_bytes();
            let [dur_lsb, dur_msb] = duration_ms.to_le_bytes();
            vec![
                SOM1,
                SOM2,
                12,
                CMD_TRACK_FADE,
                track_lsb,
                track_msb,
                vol_lsb,
                vol_msb,
                dur_lsb,
                dur_msb,
                0x00, // do not stop the track when the fade completes
                EOM,
            ]
        }
        Command::GetSysInfo => vec![SOM1, SOM2, 5, CMD_GET_SYS_INFO, EOM],
        Command::SetReporting { enabled } => {
            vec![SOM1, SOM2, 6, CMD_SET_REPORTING, enabled as u8, EOM]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_track_play_exact_bytes() {
        let frame = encode(&Command::ControlTrack {
            code: ControlCode::Play,
            track: 3,
            output: 1,
        });
        assert_eq!(
            frame,
            [0xF0, 0xAA, 0x0A, 0x03, 0x00, 0x03, 0x00, 0x00, 0x00, 0x55]
        );
    }

    #[test]
    fn test_control_track_wide_track_id() {
        let frame = encode(&Command::ControlTrack {
            code: ControlCode::Stop,
            track: 0x0102,
            output: 2,
        });
        assert_eq!(frame[4], 4); // stop code
        assert_eq!(frame[5], 0x02); // track LSB
        assert_eq!(frame[6], 0x01); // track MSB
        assert_eq!(frame[7], 1); // output 2 -> wire 1
    }

    #[test]
    fn test_stop_all_exact_bytes() {
        assert_eq!(encode(&Command::StopAll), [0xF0, 0xAA, 0x05, 0x04, 0x55]);
    }

    #[test]
    fn test_get_sys_info_exact_bytes() {
        assert_eq!(encode(&Command::GetSysInfo), [0xF0, 0xAA, 0x05, 0x02, 0x55]);
    }

    #[test]
    fn test_set_reporting() {
        assert_eq!(
            encode(&Command::SetReporting { enabled: true }),
            [0xF0, 0xAA, 0x06, 0x0D, 0x01, 0x55]
        );
        assert_eq!(
            encode(&Command::SetReporting { enabled: false }),
            [0xF0, 0xAA, 0x06, 0x0D, 0x00, 0x55]
        );
    }

    #[test]
    fn test_track_volume_negative_gain_twos_complement() {
        let frame = encode(&Command::TrackVolume {
            track: 1,
            volume: -70,
        });
        assert_eq!(frame[2], 9);
        assert_eq!(frame[6], 0xBA); // -70 LSB
        assert_eq!(frame[7], 0xFF); // -70 MSB
        assert_eq!(*frame.last().unwrap(), EOM);
    }

    #[test]
    fn test_track_fade_layout() {
        let frame = encode(&Command::TrackFade {
            track: 5,
            volume: -10,
            duration_ms: 2000,
        });
        assert_eq!(frame.len(), 12);
        assert_eq!(frame[3], 0x0A);
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), 5);
        assert_eq!(i16::from_le_bytes([frame[6], frame[7]]), -10);
        assert_eq!(u16::from_le_bytes([frame[8], frame[9]]), 2000);
        assert_eq!(frame[10], 0x00); // keep playing after the fade
        assert_eq!(frame[11], EOM);
    }

    #[test]
    fn test_output_volume_declares_eight_emits_nine() {
        let frame = encode(&Command::OutputVolume {
            output: 2,
            volume: -20,
        });
        assert_eq!(frame.len(), 9);
        assert_eq!(frame[2], 8); // declared length disagrees with the byte count
        assert_eq!(frame[4], 2); // output is sent raw, not 0-based
        assert_eq!(frame[7], EOM);
        assert_eq!(frame[8], 0x00);
    }

    #[test]
    fn test_declared_length_matches_byte_count_except_output_volume() {
        let commands = [
            Command::ControlTrack {
                code: ControlCode::PlayMix,
                track: 42,
                output: 1,
            },
            Command::StopAll,
            Command::TrackVolume {
                track: 1,
                volume: 0,
            },
            Command::TrackFade {
                track: 1,
                volume: 0,
                duration_ms: 100,
            },
            Command::GetSysInfo,
            Command::SetReporting { enabled: true },
        ];
        for command in &commands {
            let frame = encode(command);
            assert_eq!(
                frame.len(),
                frame[2] as usize,
                "declared LEN mismatch for {command:?}"
            );
            assert_eq!(frame[0], SOM1);
            assert_eq!(frame[1], SOM2);
            assert_eq!(*frame.last().unwrap(), EOM);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let command = Command::ControlTrack {
            code: ControlCode::Resume,
            track: 9,
            output: 3,
        };
        assert_eq!(encode(&command), encode(&command));
    }
}
