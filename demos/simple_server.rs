//! Simple telemetry broadcast server
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:5000
//!   cargo run --example simple_server 127.0.0.1:5001     # binds to 127.0.0.1:5001
//!
//! ## Producing
//!
//! Send newline-delimited JSON from any TCP client, e.g.:
//!
//!   printf '{"event":"sensor_data","data":{"Soil_Moisture":30,"Soil_Temperature":20,"Humidity":50}}\n' | nc localhost 5000
//!
//! or run the companion producer:
//!
//!   cargo run --example sensor_producer
//!
//! ## Viewing
//!
//!   nc localhost 5000
//!
//! Every connected client receives every result event.

use std::net::SocketAddr;

use leafcast_rs::error::InferenceError;
use leafcast_rs::inference::{BaselineClassifier, FrameDetector};
use leafcast_rs::payload::{Baseline, Detection};
use leafcast_rs::server::{Server, ServerConfig};

/// Stand-in detector: a real deployment plugs its model in here
struct StubDetector;

impl FrameDetector for StubDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, InferenceError> {
        // Pretend every frame contains one centered finding
        let _ = image;
        Ok(vec![Detection::new(
            [120.0, 80.0, 360.0, 320.0],
            "leaf_spot",
            0.5,
        )])
    }
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:5000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr: SocketAddr = match args.get(1) {
        Some(addr) => addr.parse()?,
        None => "0.0.0.0:5000".parse()?,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leafcast_rs=debug".parse()?),
        )
        .init();

    // Healthy-class averages; a real deployment derives these from its
    // training data
    let classifier = BaselineClassifier::new(Baseline::new(45.0, 23.0, 78.0))
        .with_class("Moderate Stress", Baseline::new(30.0, 27.0, 55.0))
        .with_class("High Stress", Baseline::new(15.0, 32.0, 35.0));

    let config = ServerConfig::default().bind(bind_addr);
    println!("Starting telemetry server on {}", config.bind_addr);
    println!();
    println!("Producer: cargo run --example sensor_producer");
    println!("Viewer:   nc {}", config.bind_addr);
    println!();

    let server = Server::new(config, classifier, StubDetector);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
