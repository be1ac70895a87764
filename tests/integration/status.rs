// ── Tests ─────────────────────────────────────────────────────────────────────

use crate::*;

#[tokio::test]
async fn status_reports_state_and_limits() -> Result<()> {
    let mut daemon = TestDaemon::start(test_config()).await?;

    let status = daemon.status().await?;
    assert_eq!(status["state"], "running");
    assert!(status["cycles"].is_number(), "missing cycles");
    assert!(status["messages_sent"].is_number(), "missing messages_sent");
    assert_eq!(status["limits"]["max_message_size"], 256);
    assert_eq!(status["limits"]["max_batch_items"], 10);
    assert_eq!(status["limits"]["compression"], "none");

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn status_counts_ingestion() -> Result<()> {
    let mut daemon = TestDaemon::ingest_only(test_config()).await?;

    let max = daemon.config.consolidation.max_message_size;
    daemon.post("one").await?;
    daemon.post("two").await?;
    daemon.post(Vec::<u8>::new()).await?;
    let over_limit = daemon.post("x".repeat(max + 1)).await?;
    assert_eq!(over_limit.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

    let status = daemon.status().await?;
    assert_eq!(status["ingest_accepted"], 2);
    assert_eq!(status["ingest_rejected"], 2);
    assert_eq!(status["buffered"], 2);

    daemon.shutdown().await?;
    Ok(())
}
