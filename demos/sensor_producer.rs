//! Synthetic sensor producer
//!
//! Connects to a running server and pushes one reading per second, drifting
//! around a mildly stressed plant, while printing every broadcast it
//! receives back.
//!
//! Run with: cargo run --example sensor_producer [SERVER_ADDR]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use leafcast_rs::payload::{InboundMessage, SensorReading};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => "127.0.0.1:5000".parse()?,
    };

    let stream = TcpStream::connect(addr).await?;
    println!("Connected to {addr}");
    let (read_half, mut write_half) = stream.into_split();

    // Print every broadcast coming back
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("<- {line}");
        }
    });

    let mut tick: u64 = 0;
    loop {
        // Slow sinusoidal drift around a slightly dry plant
        let phase = (tick as f64) / 20.0;
        let reading = SensorReading::new(
            32.0 + 8.0 * phase.sin(),
            24.0 + 2.0 * (phase * 0.7).cos(),
            58.0 + 10.0 * (phase * 1.3).sin(),
        );

        let message = InboundMessage::SensorData(reading);
        let mut frame = serde_json::to_vec(&message)?;
        frame.push(b'\n');
        write_half.write_all(&frame).await?;
        println!("-> {}", serde_json::to_string(&message)?);

        tick += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
