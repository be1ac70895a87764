//! Shared HTTP request helpers for CLI commands.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to efficientsqsd at {} (is it running?)", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}

/// POST a raw body. Non-2xx responses become an error carrying the status
/// and the daemon's reason text.
pub async fn post_raw<T: for<'de> Deserialize<'de>>(url: &str, body: Vec<u8>) -> Result<T> {
    let resp = reqwest::Client::new()
        .post(url)
        .body(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to efficientsqsd at {} (is it running?)", url))?;

    let status = resp.status();
    if !status.is_success() {
        let reason = resp.text().await.unwrap_or_default();
        bail!("rejected with {}: {}", status, reason);
    }

    resp.json::<T>().await.context("failed to parse response")
}
