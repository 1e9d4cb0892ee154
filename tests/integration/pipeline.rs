use crate::*;

/// A session split across three frames and many TCP writes arrives as one
/// document, byte for byte.
#[tokio::test]
async fn split_session_reaches_subscriber() {
    let bridge = start_bridge(&["TimeChunk"], |_| {}).await;
    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut tcp = producer(&bridge).await;

    let frames = session(7, &[b"{\"TimeChunk\":", b"{\"v\":", b"1}}"]);
    dribble(&mut tcp, &frames, 7).await;

    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"TimeChunk\":{\"v\":1}}")
    );
    assert_eq!(next_text(&mut ws, Duration::from_millis(100)).await, None);
}

/// Documents of one type keep their order end to end.
#[tokio::test]
async fn documents_arrive_in_order() {
    let bridge = start_bridge(&["TimeChunk"], |c| c.subscribers.min_send_interval_ms = 0).await;
    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut tcp = producer(&bridge).await;

    let mut stream = BytesMut::new();
    for n in 0..20u32 {
        let doc = format!("{{\"TimeChunk\":{n}}}");
        stream.extend_from_slice(&session(n, &[doc.as_bytes()]));
    }
    tcp.write_all(&stream).await.unwrap();

    for n in 0..20 {
        assert_eq!(
            next_text(&mut ws, WAIT).await,
            Some(format!("{{\"TimeChunk\":{n}}}"))
        );
    }
}

/// A message routed before anyone subscribed is delivered on connect.
#[tokio::test]
async fn queued_message_delivered_on_connect() {
    let bridge = start_bridge(&["PoseChunk"], |_| {}).await;
    let mut tcp = producer(&bridge).await;
    tcp.write_all(&session(1, &[b"{\"PoseChunk\":[1,2,3]}"]))
        .await
        .unwrap();

    let router = bridge.router.clone();
    assert!(eventually(|| router.queued("PoseChunk") == Some(1)).await);

    let mut ws = subscribe(&bridge, "PoseChunk").await;
    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"PoseChunk\":[1,2,3]}")
    );
}

/// Two producers reassemble independently even when their writes interleave.
#[tokio::test]
async fn producers_have_independent_sessions() {
    let bridge = start_bridge(&["A", "B"], |_| {}).await;
    let mut ws_a = subscribe(&bridge, "A").await;
    let mut ws_b = subscribe(&bridge, "B").await;
    let mut tcp_a = producer(&bridge).await;
    let mut tcp_b = producer(&bridge).await;

    let a = session(5, &[b"{\"A\":", b"\"first\"}"]);
    let b = session(5, &[b"{\"B\":", b"\"second\"}"]);
    let (a1, a2) = a.split_at(a.len() / 2);
    let (b1, b2) = b.split_at(b.len() / 2);

    tcp_a.write_all(a1).await.unwrap();
    tcp_b.write_all(b1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    tcp_b.write_all(b2).await.unwrap();
    tcp_a.write_all(a2).await.unwrap();

    assert_eq!(next_text(&mut ws_a, WAIT).await.as_deref(), Some("{\"A\":\"first\"}"));
    assert_eq!(next_text(&mut ws_b, WAIT).await.as_deref(), Some("{\"B\":\"second\"}"));
}

/// A session whose sequence skips a frame is never delivered; the next good
/// session is.
#[tokio::test]
async fn broken_session_is_discarded() {
    let bridge = start_bridge(&["TimeChunk"], |_| {}).await;
    let mut ws = subscribe(&bridge, "TimeChunk").await;
    let mut tcp = producer(&bridge).await;

    let mut stream = BytesMut::new();
    encode_frame(
        &SessionStates::new(TRANSMISSION_CONTINUING, 9, 0),
        b"{\"TimeChunk\":",
        &mut stream,
    )
    .unwrap();
    encode_frame(
        &SessionStates::new(TRANSMISSION_LAST, 9, 2),
        b"\"lost\"}",
        &mut stream,
    )
    .unwrap();
    stream.extend_from_slice(&session(10, &[b"{\"TimeChunk\":\"kept\"}"]));
    tcp.write_all(&stream).await.unwrap();

    assert_eq!(
        next_text(&mut ws, WAIT).await.as_deref(),
        Some("{\"TimeChunk\":\"kept\"}")
    );
}
