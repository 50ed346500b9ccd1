//! Tsunami wire protocol: command encoding and inbound frame decoding.

mod decoder;
mod wire;

pub use decoder::{FrameDecoder, InboundEvent};
pub use wire::{encode, Command, ControlCode, EOM, SOM1, SOM2};
