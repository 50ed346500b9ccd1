//! Connects to a Tsunami and prints every driver event as a JSON line.
//!
//! ```text
//! cargo run --example monitor -- /dev/ttyUSB0
//! ```

use tsunami_driver::{Driver, DriverConfig, Request};

#[tokio::main(flavor = "current_thread")]
async fn main() -> tsunami_driver::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let device = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    tracing::info!("opening {}", device);

    let mut driver = Driver::builder(DriverConfig::new(device)).start();
    driver.request(Request::new("get_sys_info")).await?;

    while let Some(event) = driver.next_event().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
