use crate::*;

/// Unknown chunk types are dropped without disturbing routed traffic.
#[tokio::test]
async fn unknown_type_is_not_delivered() {
    let bridge = start_bridge(&["TimeChunk"], |_| {}).await;
    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut tcp = producer(&bridge).await;

    let mut stream = BytesMut::new();
    for n in 0..50 {
        stream.extend_from_slice(&session(n, &[b"{\"UnknownType\":1}"]));
    }
    stream.extend_from_slice(&session(50, &[b"{\"TimeChunk\":\"after\"}"]));
    tcp.write_all(&stream).await.unwrap();

    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"TimeChunk\":\"after\"}")
    );
    assert_eq!(next_text(&mut ws, Duration::from_millis(100)).await, None);
    assert_eq!(bridge.router.queued("TimeChunk"), Some(0));
}

/// Documents that cannot be classified are skipped.
#[tokio::test]
async fn unclassifiable_documents_are_skipped() {
    let bridge = start_bridge(&["TimeChunk"], |_| {}).await;
    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut tcp = producer(&bridge).await;

    let mut stream = BytesMut::new();
    stream.extend_from_slice(&session(1, &[b"not json"]));
    stream.extend_from_slice(&session(2, &[b"{\"TimeChunk\":1,\"Other\":2}"]));
    stream.extend_from_slice(&session(3, &[b"[]"]));
    stream.extend_from_slice(&session(4, &[b"{\"TimeChunk\":4}"]));
    tcp.write_all(&stream).await.unwrap();

    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"TimeChunk\":4}")
    );
}

/// A frame declaring an impossible length closes that producer only.
#[tokio::test]
async fn corrupt_frame_closes_connection() {
    let bridge = start_bridge(&["TimeChunk"], |_| {}).await;
    let mut bad = producer(&bridge).await;
    bad.write_all(&[4, 0, 0, 0, 0, 0]).await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(WAIT, bad.read(&mut buf))
        .await
        .expect("connection was not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut good = producer(&bridge).await;
    good.write_all(&session(1, &[b"{\"TimeChunk\":true}"]))
        .await
        .unwrap();
    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"TimeChunk\":true}")
    );
}

/// Subscribers of the same type share one queue: each message goes to one
/// of them.
#[tokio::test]
async fn subscribers_share_a_queue() {
    let bridge = start_bridge(&["TimeChunk"], |c| c.subscribers.min_send_interval_ms = 0).await;
    let mut ws_a = subscribe(&bridge, "TimeChunk").await;
    let mut ws_b = subscribe(&bridge, "TimeChunk").await;
    let subscribers = bridge.subscribers.clone();
    assert!(eventually(|| subscribers.count("TimeChunk") == 2).await);

    let mut tcp = producer(&bridge).await;
    let mut stream = BytesMut::new();
    for n in 0..10u32 {
        let doc = format!("{{\"TimeChunk\":{n}}}");
        stream.extend_from_slice(&session(n, &[doc.as_bytes()]));
    }
    tcp.write_all(&stream).await.unwrap();

    let mut got = Vec::new();
    while got.len() < 10 {
        tokio::select! {
            Some(t) = next_text(&mut ws_a, WAIT) => got.push(t),
            Some(t) = next_text(&mut ws_b, WAIT) => got.push(t),
            else => break,
        }
    }
    got.sort();
    got.dedup();
    assert_eq!(got.len(), 10, "every message delivered exactly once");
}
