//! Integration tests for framesync.
//!
//! These drive the full engine through a `StreamTransport` over an
//! in-memory duplex pipe, with the tokio clock paused so quiet periods and
//! caller timeouts are asserted in virtual time.

use std::sync::Arc;
use std::time::Duration;

use framesync::sync::ReleaseReason;
use framesync::{FallibleOracle, FrameSync, FrameSyncBuilder, FrameSyncError, StreamTransport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::Instant;

/// Oracle used by the framed scenarios: `AA .. FF`, at least 5 bytes.
fn aa_ff_frame(data: &[u8]) -> bool {
    data.len() >= 5 && data[0] == 0xAA && data[data.len() - 1] == 0xFF
}

/// Build, open, and hand back the device end of the pipe.
async fn open_engine(builder: FrameSyncBuilder) -> (Arc<FrameSync>, DuplexStream) {
    let (port, device) = tokio::io::duplex(4096);
    let sync = builder.build(StreamTransport::from_stream(port)).unwrap();
    assert!(sync.open().await);
    (Arc::new(sync), device)
}

/// Spawn a reader and let it park on the waiter queue.
async fn spawn_reader(
    sync: &Arc<FrameSync>,
    wait: Duration,
    only_read: bool,
) -> tokio::task::JoinHandle<bytes::Bytes> {
    let reader = sync.clone();
    let task = tokio::spawn(async move { reader.receive(wait, only_read).await });
    tokio::task::yield_now().await;
    task
}

#[tokio::test(start_paused = true)]
async fn test_no_data_waits_for_caller_timeout() {
    let (sync, _device) = open_engine(FrameSync::builder().msg_wait_ms(35)).await;

    let start = Instant::now();
    let result = sync.receive(Duration::from_millis(100), false).await;

    assert!(result.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_millis(105));
}

#[tokio::test(start_paused = true)]
async fn test_oracle_burst_releases_immediately() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    let reader = spawn_reader(&sync, Duration::from_secs(1), false).await;
    let start = Instant::now();

    device.write_all(&[0xAA, 0x01, 0x02, 0x03, 0xFF]).await.unwrap();
    let frame = reader.await.unwrap();

    assert_eq!(&frame[..], &[0xAA, 0x01, 0x02, 0x03, 0xFF]);
    assert!(start.elapsed() < Duration::from_millis(1));
    assert!(!sync.debounce_armed());
    assert_eq!(sync.buffered_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_period_restarts_on_new_bytes() {
    let (sync, mut device) = open_engine(FrameSync::builder().msg_wait_ms(35)).await;

    let reader = spawn_reader(&sync, Duration::from_secs(1), false).await;
    let start = Instant::now();

    device.write_all(&[0x01, 0x02]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    device.write_all(&[0x03, 0x04]).await.unwrap();

    let frame = reader.await.unwrap();

    assert_eq!(&frame[..], &[0x01, 0x02, 0x03, 0x04]);
    // 35ms after the second injection, not after the first
    assert!(start.elapsed() >= Duration::from_millis(55));
    assert!(start.elapsed() < Duration::from_millis(60));
    assert_eq!(sync.current_epoch().get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_destructive_readers() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    let first = spawn_reader(&sync, Duration::from_millis(500), false).await;
    let second = spawn_reader(&sync, Duration::from_millis(500), false).await;
    assert_eq!(sync.pending_waiters(), 2);

    device.write_all(&[0xAA, 0x10, 0x20, 0x30, 0xFF]).await.unwrap();

    let start = Instant::now();
    let mut results = vec![first.await.unwrap(), second.await.unwrap()];
    assert!(start.elapsed() < Duration::from_millis(500));

    // Exactly one reader wins the clear; the other sees an empty buffer
    results.sort_by_key(|r| r.len());
    assert!(results[0].is_empty());
    assert_eq!(&results[1][..], &[0xAA, 0x10, 0x20, 0x30, 0xFF]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_peekers_see_same_frame() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    let first = spawn_reader(&sync, Duration::from_millis(500), true).await;
    let second = spawn_reader(&sync, Duration::from_millis(500), true).await;

    device.write_all(&[0xAA, 0x01, 0x02, 0x03, 0xFF]).await.unwrap();

    let a = first.await.unwrap();
    let b = second.await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
    assert_eq!(sync.buffered_len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_partial_frame_falls_back_to_quiet_period() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    let reader = spawn_reader(&sync, Duration::from_secs(1), false).await;
    let start = Instant::now();

    // Never terminated with 0xFF
    device.write_all(&[0xAA, 0x01, 0x02]).await.unwrap();
    let frame = reader.await.unwrap();

    assert_eq!(&frame[..], &[0xAA, 0x01, 0x02]);
    assert!(start.elapsed() >= Duration::from_millis(35));
    assert!(start.elapsed() < Duration::from_millis(40));
}

#[tokio::test(start_paused = true)]
async fn test_fragmented_frame_completes_on_last_chunk() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    let reader = spawn_reader(&sync, Duration::from_secs(1), false).await;
    let start = Instant::now();

    device.write_all(&[0xAA, 0x01]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    device.write_all(&[0x02, 0x03]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    device.write_all(&[0xFF]).await.unwrap();

    let frame = reader.await.unwrap();
    assert_eq!(&frame[..], &[0xAA, 0x01, 0x02, 0x03, 0xFF]);
    assert!(start.elapsed() < Duration::from_millis(21));
    assert!(!sync.debounce_armed());
}

#[tokio::test(start_paused = true)]
async fn test_send_and_wait_result_round_trip() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).oracle(aa_ff_frame)).await;

    // Device answers every 2-byte request with a framed echo
    let responder = tokio::spawn(async move {
        let mut request = [0u8; 2];
        device.read_exact(&mut request).await.unwrap();
        device
            .write_all(&[0xAA, request[0], request[1], 0x00, 0xFF])
            .await
            .unwrap();
        device
    });

    let reply = sync
        .send_and_wait_result(&[0x01, 0x03], Duration::from_millis(500), false)
        .await;

    assert_eq!(&reply[..], &[0xAA, 0x01, 0x03, 0x00, 0xFF]);
    assert_eq!(sync.buffered_len(), 0);
    responder.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stale_bytes_are_part_of_next_result() {
    let (sync, mut device) = open_engine(FrameSync::builder().msg_wait_ms(35)).await;

    device.write_all(b"stale").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = sync
        .send_and_wait_result(b"req", Duration::from_millis(100), true)
        .await;
    assert_eq!(&result[..], b"stale");

    // only_read left it in place; a destructive read drains it
    assert_eq!(&sync.read_and_clear(Duration::ZERO).await[..], b"stale");
    assert!(sync.peek(Duration::ZERO).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_while_closed_is_dropped() {
    let (sync, mut device) = open_engine(FrameSync::builder()).await;
    assert!(sync.close().await);

    sync.send(b"lost").await;

    let mut buf = [0u8; 4];
    let read = tokio::time::timeout(Duration::from_millis(50), device.read(&mut buf)).await;
    // Closing shuts the write half down, so the device sees EOF, not data
    assert!(matches!(read, Ok(Ok(0))));
}

#[tokio::test(start_paused = true)]
async fn test_failing_oracle_is_logged_and_ignored() {
    let lines = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
    let captured = lines.clone();

    let builder = FrameSync::builder()
        .msg_wait_ms(35)
        .oracle(FallibleOracle::new(|data: &[u8]| {
            if data.contains(&0xEE) {
                Err(FrameSyncError::OracleFailed("corrupt header".into()))
            } else {
                Ok(false)
            }
        }))
        .diagnostics(move |msg| captured.lock().push(msg.to_string()));
    let (sync, mut device) = open_engine(builder).await;

    let reader = spawn_reader(&sync, Duration::from_secs(1), false).await;
    device.write_all(&[0xEE, 0x01]).await.unwrap();

    let frame = reader.await.unwrap();
    assert_eq!(&frame[..], &[0xEE, 0x01]);
    assert!(lines.lock().iter().any(|l| l.contains("corrupt header")));
    assert!(lines
        .lock()
        .iter()
        .any(|l| l.contains("Quiet period elapsed")));
}

#[tokio::test(start_paused = true)]
async fn test_buffer_cap_keeps_newest_bytes() {
    let (sync, mut device) =
        open_engine(FrameSync::builder().msg_wait_ms(35).max_buffer_len(4)).await;

    device.write_all(&[1, 2, 3, 4, 5, 6]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(&sync.read_and_clear(Duration::ZERO).await[..], &[3, 4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_order_releases_waiters_then_closes() {
    let (sync, mut device) = open_engine(FrameSync::builder().msg_wait_ms(35)).await;

    let reader = spawn_reader(&sync, Duration::from_secs(60), true).await;
    device.write_all(&[0x42]).await.unwrap();
    tokio::task::yield_now().await;
    assert!(sync.debounce_armed());

    let start = Instant::now();
    assert!(sync.shutdown().await);

    assert!(!sync.debounce_armed());
    assert_eq!(&reader.await.unwrap()[..], &[0x42]);
    assert!(start.elapsed() < Duration::from_millis(1));
    assert!(!sync.is_open().await);

    // Idempotent
    assert!(sync.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_externally_driven_sink() {
    let sync = FrameSync::builder()
        .msg_wait_ms(35)
        .oracle(|data: &[u8]| data.ends_with(b"\r\n"))
        .build(StreamTransport::from_stream(tokio::io::duplex(64).0))
        .unwrap();
    let sink = sync.inbound();

    std::thread::spawn(move || {
        sink.deliver(b"OK");
        sink.deliver(b"\r\n");
    })
    .join()
    .unwrap();

    assert_eq!(&sync.peek(Duration::ZERO).await[..], b"OK\r\n");
    assert!(!sync.debounce_armed());
}

#[test]
fn test_release_reason_is_exported() {
    assert_ne!(ReleaseReason::FrameComplete, ReleaseReason::QuietPeriod);
}
