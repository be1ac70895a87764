// ── Tests ─────────────────────────────────────────────────────────────────────

use crate::*;
use efficientsqs_core::config::Compression;
use efficientsqs_services::LoopState;
use tokio::io::AsyncWriteExt;

fn numbered(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("msg-{i:03}").into_bytes()).collect()
}

#[tokio::test]
async fn accepted_messages_reach_the_queue_by_shutdown() -> Result<()> {
    let mut daemon = TestDaemon::start(test_config()).await?;

    let sent = numbered(60);
    for body in &sent {
        daemon.post(body.clone()).await?.error_for_status()?;
    }
    daemon.shutdown().await?;

    let max = daemon.config.consolidation.max_message_size;
    for bin in daemon.queue.delivered(DESTINATION) {
        assert!(bin.len() < max, "bin of {} bytes", bin.len());
    }
    assert_eq!(daemon.delivered_messages()?, sent);

    assert_eq!(daemon.stats.state(), LoopState::Stopped);
    let snapshot = daemon.stats.snapshot();
    assert_eq!(snapshot.messages_sent, 60);
    assert_eq!(snapshot.messages_lost, 0);
    Ok(())
}

#[tokio::test]
async fn drain_flushes_what_the_loop_never_saw() -> Result<()> {
    let mut config = test_config();
    config.consolidation.polling_ms = 10_000;
    let mut daemon = TestDaemon::start(config).await?;

    let sent = numbered(25);
    for body in &sent {
        daemon.post(body.clone()).await?.error_for_status()?;
    }

    let report = daemon.shutdown().await?.context("loop did not run")?;
    assert!(report.messages > 0, "drain found nothing: {report:?}");
    assert_eq!(daemon.delivered_messages()?.len(), sent.len());

    let queue = daemon.config.buffer.queue_name.clone();
    assert!(daemon.buffer.contents(&queue).is_empty());
    Ok(())
}

#[tokio::test]
async fn separator_lookalikes_split_back_intact() -> Result<()> {
    let mut daemon = TestDaemon::start(test_config()).await?;

    let candidates = ["a|~", "a|", "~|b", "||", "~", "|~", "x~|"];
    let mut accepted = Vec::new();
    for text in candidates {
        if daemon.post(text).await?.status().is_success() {
            accepted.push(text.as_bytes().to_vec());
        }
    }
    assert_eq!(accepted.len(), candidates.len() - 2);
    daemon.shutdown().await?;

    assert_eq!(daemon.delivered_messages()?, accepted);
    Ok(())
}

#[tokio::test]
async fn gzip_messages_survive_the_round_trip() -> Result<()> {
    let mut config = test_config();
    config.consolidation.compression = Compression::Gzip;
    let mut daemon = TestDaemon::start(config).await?;

    let sent = numbered(12);
    for body in &sent {
        daemon.post(body.clone()).await?.error_for_status()?;
    }
    daemon.shutdown().await?;

    assert_eq!(daemon.delivered_messages()?, sent);
    Ok(())
}

#[tokio::test]
async fn failed_batch_is_counted_not_redelivered() -> Result<()> {
    let mut config = test_config();
    config.consolidation.polling_ms = 10_000;
    let mut daemon = TestDaemon::start(config).await?;
    daemon.queue.fail_next_sends(1);

    for body in numbered(5) {
        daemon.post(body).await?.error_for_status()?;
    }
    daemon.shutdown().await?;

    let snapshot = daemon.stats.snapshot();
    let delivered = daemon.delivered_messages()?.len();
    assert_eq!(snapshot.batches_failed, 1);
    assert!(snapshot.messages_lost >= 1);
    assert_eq!(snapshot.messages_lost as usize + delivered, 5);

    let queue = daemon.config.buffer.queue_name.clone();
    assert!(daemon.buffer.contents(&queue).is_empty(), "lost messages were requeued");
    Ok(())
}

#[tokio::test]
async fn stalled_upload_does_not_hold_off_the_drain() -> Result<()> {
    let mut daemon = TestDaemon::start(test_config()).await?;
    daemon.post("before").await?.error_for_status()?;

    // headers promise a body that never arrives
    let mut stalled = tokio::net::TcpStream::connect(daemon.addr).await?;
    let request = format!("POST {ROUTE} HTTP/1.1\r\nhost: test\r\ncontent-length: 100\r\n\r\npartial");
    stalled.write_all(request.as_bytes()).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = tokio::time::timeout(Duration::from_secs(5), daemon.shutdown())
        .await
        .context("shutdown waited on a stalled upload")??;
    assert!(report.is_some(), "loop did not drain");
    assert_eq!(daemon.stats.state(), LoopState::Stopped);
    assert_eq!(daemon.delivered_messages()?, vec![b"before".to_vec()]);

    drop(stalled);
    Ok(())
}
