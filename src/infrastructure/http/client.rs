use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// Shared client for frame downloads. `timeout` bounds each whole request.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()?;

    info!("✅ HTTP client ready (timeout {:?})", timeout);
    Ok(client)
}
