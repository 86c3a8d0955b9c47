use std::sync::Arc;
use std::time::Duration;

use phasescope_io::client::SseParser;
use phasescope_io::{
    Channel, IngestionRelay, ParseError, PublishOutcome, RelayClient, Sample, Subscription,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

fn reading(t: f64) -> Sample {
    Sample::new(1.0, 2.0, 3.0, 220.0, 221.0, 219.0).with_time(t)
}

// ============================================================================
// Sample Parsing Tests
// ============================================================================

#[test]
fn test_parse_numeric_fields() {
    let sample =
        Sample::parse(r#"{"Ia":1.5,"Ib":2,"Ic":3,"Ua":220,"Ub":221,"Uc":219,"Time":0.25}"#).unwrap();
    assert_eq!(sample.ia, 1.5);
    assert_eq!(sample.ib, 2.0);
    assert_eq!(sample.uc, 219.0);
    assert_eq!(sample.time, Some(0.25));
}

#[test]
fn test_parse_text_fields_and_lowercase_keys() {
    let sample =
        Sample::parse(r#"{"ia":"1.5","ib":" 2 ","ic":"3","ua":"220","ub":"221","uc":"219"}"#).unwrap();
    assert_eq!(sample.ia, 1.5);
    assert_eq!(sample.ib, 2.0);
    assert_eq!(sample.ua, 220.0);
    assert!(sample.time.is_none());
}

#[test]
fn test_parse_missing_channel_becomes_nan() {
    let sample = Sample::parse(r#"{"Ia":1,"Ib":2,"Ic":3,"Ua":4,"Ub":5}"#).unwrap();
    assert!(sample.uc.is_nan());
    assert_eq!(sample.ub, 5.0);
}

#[test]
fn test_parse_unparsable_channel_becomes_nan() {
    let sample = Sample::parse(r#"{"Ia":"oops","Ib":2,"Ic":3,"Ua":4,"Ub":5,"Uc":6}"#).unwrap();
    assert!(sample.ia.is_nan());
}

#[test]
fn test_parse_rejects_non_object() {
    assert!(matches!(Sample::parse("[1,2,3]"), Err(ParseError::NotAnObject)));
    assert!(matches!(Sample::parse("null"), Err(ParseError::NotAnObject)));
}

#[test]
fn test_parse_rejects_payload_without_channels() {
    assert!(matches!(
        Sample::parse(r#"{"motor":"on"}"#),
        Err(ParseError::NoChannels)
    ));
}

#[test]
fn test_parse_rejects_invalid_json() {
    assert!(matches!(Sample::parse("{Ia:"), Err(ParseError::InvalidJson(_))));
}

#[test]
fn test_time_coordinate_fallback_order() {
    let both = Sample::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        .with_time(5.0)
        .with_timestamp(9.0);
    assert_eq!(both.time_coordinate(), 5.0);

    let secondary = Sample::parse(r#"{"Ia":0,"timestamp":9}"#).unwrap();
    assert_eq!(secondary.time_coordinate(), 9.0);

    let neither = Sample::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    assert_eq!(neither.time_coordinate(), 0.0);
    assert!(neither.time_value().is_none());
}

#[test]
fn test_channel_accessor_matches_fields() {
    let sample = Sample::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    let values: Vec<f64> = Channel::ALL.iter().map(|ch| sample.channel(*ch)).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_repeat_detection_is_structural() {
    let a = reading(1.0);
    let b = reading(1.0);
    assert!(a.is_repeat_of(&b));
    assert!(!a.is_repeat_of(&reading(2.0)));
}

#[test]
fn test_repeat_detection_treats_nan_channels_as_equal() {
    let a = Sample::parse(r#"{"Ia":"x","Ib":2,"Ic":3,"Ua":4,"Ub":5,"Uc":6}"#).unwrap();
    let b = a;
    assert_ne!(a, b, "derived PartialEq never matches NaN");
    assert!(a.is_repeat_of(&b));
}

#[test]
fn test_sample_serializes_with_wire_names() {
    let json = serde_json::to_value(reading(3.0)).unwrap();
    assert_eq!(json["Ia"], 1.0);
    assert_eq!(json["Uc"], 219.0);
    assert_eq!(json["Time"], 3.0);
    assert!(json.get("timestamp").is_none());
}

#[test]
fn test_sample_deserialize_goes_through_tolerant_parser() {
    let sample: Sample = serde_json::from_str(r#"{"ia":"1","Ub":2}"#).unwrap();
    assert_eq!(sample.ia, 1.0);
    assert_eq!(sample.ub, 2.0);
    assert!(sample.ic.is_nan());
}

// ============================================================================
// Ingestion Relay Tests
// ============================================================================

#[tokio::test]
async fn test_relay_starts_empty() {
    let relay = IngestionRelay::new();
    assert!(relay.latest().await.is_none());
    assert_eq!(relay.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_relay_fans_out_to_every_subscriber() {
    let relay = IngestionRelay::new();
    let mut first = relay.subscribe().await;
    let mut second = relay.subscribe().await;

    let outcome = relay.publish(reading(1.0)).await;
    assert_eq!(
        outcome,
        PublishOutcome::Broadcast {
            delivered: 2,
            lagging: 0,
            dropped: 0
        }
    );

    assert_eq!(first.recv().await.unwrap().time, Some(1.0));
    assert_eq!(second.recv().await.unwrap().time, Some(1.0));
    assert_eq!(relay.latest().await.unwrap().time, Some(1.0));
}

#[tokio::test]
async fn test_relay_ignores_duplicate_sample() {
    let relay = IngestionRelay::new();
    let mut sub = relay.subscribe().await;

    relay.publish(reading(1.0)).await;
    assert_eq!(relay.publish(reading(1.0)).await, PublishOutcome::Duplicate);
    relay.publish(reading(2.0)).await;

    assert_eq!(sub.recv().await.unwrap().time, Some(1.0));
    assert_eq!(sub.recv().await.unwrap().time, Some(2.0));
}

#[tokio::test]
async fn test_relay_sends_latest_on_subscribe() {
    let relay = IngestionRelay::new();
    relay.publish(reading(7.0)).await;

    let mut late = relay.subscribe().await;
    assert_eq!(late.recv().await.unwrap().time, Some(7.0));
}

#[tokio::test]
async fn test_relay_drops_disconnected_subscriber() {
    let relay = IngestionRelay::new();
    let gone = relay.subscribe().await;
    let mut alive = relay.subscribe().await;
    drop(gone);

    let outcome = relay.publish(reading(1.0)).await;
    assert_eq!(
        outcome,
        PublishOutcome::Broadcast {
            delivered: 1,
            lagging: 0,
            dropped: 1
        }
    );
    assert_eq!(relay.subscriber_count().await, 1);
    assert!(alive.recv().await.is_some());
}

#[tokio::test]
async fn test_relay_slow_consumer_does_not_block_producer() {
    let relay = IngestionRelay::with_buffer(1);
    let _stalled = relay.subscribe().await;
    let mut reader = relay.subscribe().await;

    relay.publish(reading(1.0)).await;
    assert!(reader.recv().await.is_some());

    // The stalled queue is full now; publishing must still complete.
    let outcome = tokio::time::timeout(Duration::from_secs(1), relay.publish(reading(2.0)))
        .await
        .expect("publish blocked on a slow consumer");
    assert_eq!(
        outcome,
        PublishOutcome::Broadcast {
            delivered: 1,
            lagging: 1,
            dropped: 0
        }
    );
    assert_eq!(reader.recv().await.unwrap().time, Some(2.0));
}

#[tokio::test]
async fn test_relay_drops_malformed_payload() {
    let relay = IngestionRelay::new();
    relay.publish(reading(1.0)).await;

    assert!(relay.ingest_raw("not json").await.is_err());
    assert_eq!(relay.latest().await.unwrap().time, Some(1.0));

    let ok = relay
        .ingest_raw(r#"{"Ia":1,"Ib":1,"Ic":1,"Ua":1,"Ub":1,"Uc":1,"Time":2}"#)
        .await
        .unwrap();
    assert!(matches!(ok, PublishOutcome::Broadcast { .. }));
}

#[tokio::test]
async fn test_relay_shutdown_releases_subscribers() {
    let relay = IngestionRelay::new();
    let mut sub = relay.subscribe().await;
    relay.publish(reading(1.0)).await;
    relay.shutdown().await;

    assert!(sub.recv().await.is_some(), "queued sample still readable");
    assert!(sub.recv().await.is_none());
    assert!(relay.latest().await.is_none());
}

#[tokio::test]
async fn test_relay_unsubscribe() {
    let relay = IngestionRelay::new();
    let sub = relay.subscribe().await;
    relay.unsubscribe(sub.id).await;
    assert_eq!(relay.subscriber_count().await, 0);
}

async fn drain(mut sub: Subscription) -> Vec<f64> {
    let mut times = Vec::new();
    while let Some(sample) = sub.recv().await {
        times.extend(sample.time);
    }
    times
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_relay_subscriber_joining_mid_stream_misses_nothing() {
    let relay = Arc::new(IngestionRelay::with_buffer(4096));
    relay.publish(reading(0.0)).await;

    let producer = {
        let relay = relay.clone();
        tokio::spawn(async move {
            for t in 1..2000 {
                relay.publish(reading(t as f64)).await;
            }
        })
    };
    let mut joiners = Vec::new();
    for _ in 0..50 {
        let relay = relay.clone();
        joiners.push(tokio::spawn(async move { relay.subscribe().await }));
        tokio::task::yield_now().await;
    }

    let mut subs = Vec::new();
    for joiner in joiners {
        subs.push(joiner.await.unwrap());
    }
    producer.await.unwrap();
    relay.shutdown().await;

    for sub in subs {
        let times = drain(sub).await;
        assert_eq!(times.last(), Some(&1999.0));
        // Whatever was latest at registration, then every later sample.
        assert!(
            times.windows(2).all(|w| w[1] == w[0] + 1.0),
            "gap or reorder in {:?}",
            times
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_relay_concurrent_publishers_fan_out_in_store_order() {
    let relay = Arc::new(IngestionRelay::with_buffer(4096));
    let first = relay.subscribe().await;
    let second = relay.subscribe().await;

    let publishers: Vec<_> = (0..2)
        .map(|parity| {
            let relay = relay.clone();
            tokio::spawn(async move {
                for i in 0..1000 {
                    relay.publish(reading((2 * i + parity) as f64)).await;
                }
            })
        })
        .collect();
    for publisher in publishers {
        publisher.await.unwrap();
    }

    let last_stored = relay.latest().await.and_then(|s| s.time);
    relay.shutdown().await;

    let (a, b) = (drain(first).await, drain(second).await);
    assert_eq!(a.len(), 2000);
    assert_eq!(a, b);
    assert_eq!(a.last().copied(), last_stored);
}

// ============================================================================
// SSE Parser Tests
// ============================================================================

#[test]
fn test_sse_parser_assembles_split_chunks() {
    let mut parser = SseParser::default();
    assert!(parser.feed(b"event: sample\nda").is_empty());
    assert!(parser.feed(b"ta: {\"Ia\":1}\n").is_empty());
    let events = parser.feed(b"\n");
    assert_eq!(events, vec!["{\"Ia\":1}".to_string()]);
}

#[test]
fn test_sse_parser_skips_comments_and_crlf() {
    let mut parser = SseParser::default();
    let events = parser.feed(b":keep-alive\r\n\r\ndata: a\r\n\r\ndata:b\n\n");
    assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_sse_parser_keeps_multibyte_char_split_across_chunks() {
    let payload = "data: {\"note\":\"phase \u{e9}\u{3a9}\"}\n\n".as_bytes();
    // Cut inside the two-byte 'é'.
    let cut = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;

    let mut parser = SseParser::default();
    assert!(parser.feed(&payload[..cut]).is_empty());
    let events = parser.feed(&payload[cut..]);
    assert_eq!(events, vec!["{\"note\":\"phase \u{e9}\u{3a9}\"}".to_string()]);
    assert!(!events[0].contains('\u{fffd}'));
}

// ============================================================================
// Relay Server + Client Tests
// ============================================================================

async fn spawn_relay() -> (String, Arc<IngestionRelay>, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let relay = Arc::new(IngestionRelay::new());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let served = relay.clone();
    tokio::spawn(async move {
        let _ = phasescope_io::server::serve(listener, served, async move {
            let _ = stop_rx.await;
        })
        .await;
    });

    (format!("http://{}", addr), relay, stop_tx)
}

#[tokio::test]
async fn test_server_pull_roundtrip() {
    let (url, _relay, _stop) = spawn_relay().await;
    let client = RelayClient::new(&url);

    assert!(client.latest().await.unwrap().is_none());

    client.push(&reading(4.0)).await.unwrap();
    let latest = client.latest().await.unwrap().unwrap();
    assert_eq!(latest.time, Some(4.0));
    assert_eq!(latest.ua, 220.0);
}

#[tokio::test]
async fn test_server_rejects_malformed_push() {
    let (url, relay, _stop) = spawn_relay().await;

    let resp = reqwest::Client::new()
        .post(format!("{}/data", url))
        .body("garbage")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(relay.latest().await.is_none());
}

#[tokio::test]
async fn test_server_event_stream_delivers_samples() {
    let (url, relay, stop) = spawn_relay().await;
    relay.publish(reading(1.0)).await;

    let (tx, mut rx) = mpsc::channel(8);
    let client = RelayClient::new(&url);
    let follower = tokio::spawn(async move { client.follow_events(tx).await });

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.time, Some(1.0));

    relay.publish(reading(2.0)).await;
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.time, Some(2.0));

    let _ = stop.send(());
    let ended = tokio::time::timeout(Duration::from_secs(5), follower).await;
    assert!(ended.is_ok(), "event stream should end on relay shutdown");
}

#[tokio::test]
async fn test_poller_forwards_latest() {
    let (url, relay, _stop) = spawn_relay().await;
    relay.publish(reading(3.0)).await;

    let (tx, mut rx) = mpsc::channel(8);
    let handle = RelayClient::new(&url).spawn_poller(Duration::from_millis(20), tx);

    let polled = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(polled.time, Some(3.0));

    drop(rx);
    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
}
