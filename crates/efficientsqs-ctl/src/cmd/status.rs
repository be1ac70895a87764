//! Daemon status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    state: String,
    cycles: u64,
    messages_packed: u64,
    messages_sent: u64,
    messages_lost: u64,
    messages_skipped: u64,
    bins: u64,
    batches_sent: u64,
    batches_failed: u64,
    pop_errors: u64,
    ingest_accepted: u64,
    ingest_rejected: u64,
    buffered: Option<usize>,
    limits: LimitsInfo,
}

#[derive(Deserialize)]
struct LimitsInfo {
    min_message_size: usize,
    max_message_size: usize,
    max_batch_bytes: usize,
    max_batch_items: usize,
    polling_ms: u64,
    compression: String,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    let buffered = match resp.buffered {
        Some(n) => n.to_string(),
        None => "unavailable".to_string(),
    };

    println!("═══════════════════════════════════════");
    println!("  EfficientSQS Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Loop state       : {}", resp.state);
    println!("  Buffered         : {}", buffered);
    println!("  Cycles           : {}", resp.cycles);
    println!();
    println!("  ┌─ ingestion");
    println!("  │  accepted : {}", resp.ingest_accepted);
    println!("  └─ rejected : {}", resp.ingest_rejected);
    println!("  ┌─ consolidation");
    println!("  │  packed   : {}", resp.messages_packed);
    println!("  │  skipped  : {}", resp.messages_skipped);
    println!("  │  bins     : {}", resp.bins);
    println!("  └─ pop err  : {}", resp.pop_errors);
    println!("  ┌─ downstream");
    println!("  │  sent     : {} messages in {} batches", resp.messages_sent, resp.batches_sent);
    println!("  │  failed   : {} batches", resp.batches_failed);
    println!("  └─ lost     : {} messages", resp.messages_lost);

    let l = &resp.limits;
    println!();
    println!("  Limits:");
    println!("    message size : {}..{} bytes", l.min_message_size, l.max_message_size);
    println!("    batch        : {} items, {} bytes", l.max_batch_items, l.max_batch_bytes);
    println!("    polling      : {} ms", l.polling_ms);
    println!("    compression  : {}", l.compression);

    Ok(())
}
