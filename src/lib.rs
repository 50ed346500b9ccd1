//! Async driver for the Robertsonics Tsunami WAV Trigger.
//!
//! Bridges a host sending JSON `{topic, payload}` requests to the
//! Tsunami's binary serial protocol: frames are framed with start/end
//! markers and little-endian fields, the link auto-reconnects on a fixed
//! interval, and per-track playback state is tracked so commands like
//! `pause` and `play_mix` can be guarded against the device's actual
//! state.
//!
//! ```no_run
//! use tsunami_driver::{Driver, DriverConfig, Request};
//!
//! # async fn run() -> tsunami_driver::Result<()> {
//! let mut driver = Driver::builder(DriverConfig::new("/dev/ttyUSB0")).start();
//! driver.request(Request::new("play").track(3)).await?;
//! while let Some(event) = driver.next_event().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod tracker;
pub mod transport;

mod driver;

pub use config::DriverConfig;
pub use driver::{
    Driver, DriverBuilder, DriverEvent, DriverHandle, LinkStatus, PlaybackReport, Request,
    RequestPayload,
};
pub use error::{DriverError, Result};
