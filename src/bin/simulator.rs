//! Bench simulator for a greenhouse sensor node
//!
//! Sends one plausible `{t, h, l, device_id}` datagram to the hub every
//! interval. Send errors are logged and the next tick tries again.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use serde_json::json;
use tokio::net::UdpSocket;
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Hub datagram address
    #[arg(short, long, default_value = "127.0.0.1:5005")]
    target: SocketAddr,

    /// Seconds between readings
    #[arg(short, long, default_value_t = 5)]
    interval: u64,

    /// Identifier reported in every reading
    #[arg(short, long, default_value = "sim_01")]
    device: String,

    /// Stop after this many readings
    #[arg(short, long)]
    count: Option<u64>,
}

fn init() {
    let filter = filter::Targets::new().with_target("greenhouse_sim", LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sample(rng: &mut impl Rng, device: &str) -> serde_json::Value {
    json!({
        "t": round2(rng.gen_range(20.0..35.0)),
        "h": round2(rng.gen_range(40.0..80.0)),
        "l": rng.gen_range(200..800),
        "device_id": device,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind sender socket")?;

    info!(
        "sending readings as {} to {} every {}s",
        args.device, args.target, args.interval
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    let mut sent = 0u64;

    loop {
        ticker.tick().await;

        let payload = sample(&mut rand::thread_rng(), &args.device).to_string();
        match socket.send_to(payload.as_bytes(), args.target).await {
            Ok(_) => debug!("sent {payload}"),
            Err(e) => warn!("failed to send reading: {e}"),
        }

        sent += 1;
        if args.count.is_some_and(|count| sent >= count) {
            break;
        }
    }

    info!("sent {sent} readings");
    Ok(())
}
