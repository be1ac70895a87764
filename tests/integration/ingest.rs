// ── Tests ─────────────────────────────────────────────────────────────────────

use crate::*;
use efficientsqs_core::config::Compression;
use reqwest::StatusCode;

#[tokio::test]
async fn accepted_message_lands_in_buffer() -> Result<()> {
    let mut daemon = TestDaemon::ingest_only(test_config()).await?;

    let resp = daemon.post("hello").await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["stored_bytes"], 5);

    let queue = daemon.config.buffer.queue_name.clone();
    assert_eq!(daemon.buffer.contents(&queue), vec![bytes::Bytes::from("hello")]);

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn buffer_keeps_arrival_order() -> Result<()> {
    let mut daemon = TestDaemon::ingest_only(test_config()).await?;

    for text in ["first", "second", "third"] {
        assert_eq!(daemon.post(text).await?.status(), StatusCode::ACCEPTED);
    }

    let queue = daemon.config.buffer.queue_name.clone();
    let stored: Vec<_> = daemon.buffer.contents(&queue);
    assert_eq!(stored, vec!["first", "second", "third"]);

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() -> Result<()> {
    let mut daemon = TestDaemon::ingest_only(test_config()).await?;

    let empty = daemon.post(Vec::<u8>::new()).await?;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let with_separator = daemon.post(format!("a{SEPARATOR}b")).await?;
    assert_eq!(with_separator.status(), StatusCode::BAD_REQUEST);

    let binary = daemon.post(vec![0xff_u8, 0xfe, 0x00]).await?;
    assert_eq!(binary.status(), StatusCode::BAD_REQUEST);

    // "a|~" would make the following "|~|" match one byte early
    let restarts_separator = daemon.post("a|~").await?;
    assert_eq!(restarts_separator.status(), StatusCode::BAD_REQUEST);

    let queue = daemon.config.buffer.queue_name.clone();
    assert!(daemon.buffer.contents(&queue).is_empty());

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn oversized_bodies_are_payload_too_large() -> Result<()> {
    let config = test_config();
    let max = config.consolidation.max_message_size;
    let mut daemon = TestDaemon::ingest_only(config).await?;

    // Above the body limit.
    let resp = daemon.post("x".repeat(max + 1)).await?;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Within the body limit, but no room left for a separator.
    let resp = daemon.post("x".repeat(max - SEPARATOR.len())).await?;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Largest body a bin can still hold.
    let resp = daemon.post("x".repeat(max - SEPARATOR.len() - 1)).await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn gzip_payload_decodes_to_original() -> Result<()> {
    let mut config = test_config();
    config.consolidation.compression = Compression::Gzip;
    let mut daemon = TestDaemon::ingest_only(config).await?;

    let text = "the quick brown fox jumps over the lazy dog";
    assert_eq!(daemon.post(text).await?.status(), StatusCode::ACCEPTED);

    let queue = daemon.config.buffer.queue_name.clone();
    let stored = daemon.buffer.contents(&queue);
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].as_ref(), text.as_bytes());
    assert_eq!(codec::decode(&stored[0], Compression::Gzip)?, text.as_bytes());

    daemon.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn gzip_accepts_binary_bodies() -> Result<()> {
    let mut config = test_config();
    config.consolidation.compression = Compression::Gzip;
    let mut daemon = TestDaemon::ingest_only(config).await?;

    let body = vec![0xff_u8, 0x00, 0x10, 0x80];
    assert_eq!(daemon.post(body.clone()).await?.status(), StatusCode::ACCEPTED);

    let queue = daemon.config.buffer.queue_name.clone();
    let stored = daemon.buffer.contents(&queue);
    assert_eq!(codec::decode(&stored[0], Compression::Gzip)?, body);

    daemon.shutdown().await?;
    Ok(())
}
