//! Push one message through the ingestion endpoint.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, post_raw};

#[derive(Deserialize)]
struct IngestResponse {
    stored_bytes: usize,
}

pub async fn cmd_send(port: u16, route: &str, text: &str) -> Result<()> {
    let url = format!("{}{}", base_url(port), route);
    let resp: IngestResponse = post_raw(&url, text.as_bytes().to_vec()).await?;
    println!(
        "Accepted {} bytes ({} stored).",
        text.len(),
        resp.stored_bytes
    );
    Ok(())
}
