//! Loopback device - request/response over an in-memory pipe.
//!
//! This example demonstrates:
//! - Building a `FrameSync` engine with the builder pattern
//! - Registering a completeness oracle (`AA .. FF` frames)
//! - A simulated device that answers in fragments
//! - Falling back to the quiet period when a reply never terminates
//!
//! # Running
//!
//! ```text
//! RUST_LOG=framesync=debug cargo run --example loopback
//! ```

use std::time::Duration;

use framesync::{FrameSync, StreamTransport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing_subscriber::EnvFilter;

/// Frame start marker.
const START: u8 = 0xAA;
/// Frame end marker.
const END: u8 = 0xFF;

/// Answer each 2-byte command, split over two writes.
///
/// Command `0x00` gets a reply without the end marker.
async fn device(mut pipe: DuplexStream) -> std::io::Result<()> {
    let mut command = [0u8; 2];
    loop {
        if pipe.read_exact(&mut command).await.is_err() {
            return Ok(());
        }

        pipe.write_all(&[START, command[0]]).await?;
        tokio::time::sleep(Duration::from_millis(10)).await;

        if command[0] == 0x00 {
            pipe.write_all(&[command[1]]).await?;
        } else {
            pipe.write_all(&[command[1], END]).await?;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (port, remote) = tokio::io::duplex(1024);
    tokio::spawn(device(remote));

    let sync = FrameSync::builder()
        .msg_wait_ms(35)
        .oracle(|data: &[u8]| data.len() >= 3 && data[0] == START && data[data.len() - 1] == END)
        .diagnostics(|msg| println!("[framesync] {}", msg))
        .build(StreamTransport::from_stream(port))?;

    if !sync.open().await {
        return Err("failed to open transport".into());
    }

    for command in [[0x01, 0x10], [0x02, 0x20], [0x00, 0x30]] {
        let started = tokio::time::Instant::now();
        let reply = sync
            .send_and_wait_result(&command, Duration::from_millis(500), false)
            .await;
        println!(
            "command {:02X?} -> reply {:02X?} in {:?}",
            command,
            &reply[..],
            started.elapsed()
        );
    }

    sync.shutdown().await;
    Ok(())
}
