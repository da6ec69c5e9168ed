//! # Holojam Source
//!
//! Tracker emulator: multicasts envelopes for a set of labels at a fixed
//! rate, optionally in a left-handed frame and through a lossy link.
//!
//! ## Usage
//!
//! ```bash
//! holojam_source --label VR1 --label VR2 --rate 120
//! holojam_source --left-handed --loss 5 --dup 2 --reorder 5 --seed 7
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use holojam_networking::transport::UnicastSender;
use holojam_networking::{
    encode_envelope, FrameBuffer, FrameEnvelope, Handedness, LossyLink, NetworkConditions,
    TelemetryError, TelemetryResult, WireRecord,
};
use holojam_shared::constants::{BUFFER_CAPACITY, MOTIVE_PORT, MULTICAST_GROUP};
use holojam_shared::{Quaternion, Vec3};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "holojam_source")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Emulate a Holojam tracker")]
struct Cli {
    /// Destination group (or unicast address)
    #[arg(long, default_value_t = MULTICAST_GROUP)]
    group: Ipv4Addr,

    /// Destination port
    #[arg(short, long, default_value_t = MOTIVE_PORT)]
    port: u16,

    /// Frames per second
    #[arg(short, long, default_value_t = 120)]
    rate: u32,

    /// Label to emit (repeatable)
    #[arg(short, long, default_values_t = [String::from("VR1")])]
    label: Vec<String>,

    /// Emit in a left-handed frame
    #[arg(long)]
    left_handed: bool,

    /// Sender tag written into every envelope
    #[arg(long, default_value = "holojam-source")]
    source: String,

    /// Simulated packet loss in percent
    #[arg(long, default_value_t = 0)]
    loss: u8,

    /// Simulated duplication in percent
    #[arg(long, default_value_t = 0)]
    dup: u8,

    /// Simulated reordering in percent
    #[arg(long, default_value_t = 0)]
    reorder: u8,

    /// Seed for the simulated link
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Run for N seconds then exit
    #[arg(short, long)]
    duration: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("holojam_networking={0},holojam_source={0}", cli.log_level))
    });
    fmt().with_env_filter(filter).with_target(false).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> TelemetryResult<()> {
    let destination = SocketAddr::from((cli.group, cli.port));
    let socket = UnicastSender::bind(destination).map_err(|source| TelemetryError::Bind {
        channel: "source".to_owned(),
        addr: destination,
        source,
    })?;

    let conditions = NetworkConditions::new(cli.loss, cli.dup, cli.reorder);
    let mut link = LossyLink::new(conditions, cli.seed);
    let mut buffer = FrameBuffer::new(BUFFER_CAPACITY);
    let handedness = if cli.left_handed { Handedness::Left } else { Handedness::Right };

    let period = Duration::from_micros(1_000_000 / u64::from(cli.rate.max(1)));
    let started = Instant::now();
    let deadline = cli.duration.map(|secs| started + Duration::from_secs(secs));

    tracing::info!(
        "emitting {:?} to {} at {} Hz ({:?}, {:?})",
        cli.label,
        destination,
        cli.rate,
        handedness,
        conditions
    );

    let mut frame_id = 0u32;
    let mut send_errors = 0u64;
    while deadline.map_or(true, |d| Instant::now() < d) {
        let envelope = build_frame(frame_id, handedness, &cli.source, &cli.label, started.elapsed());
        frame_id = frame_id.wrapping_add(1);

        encode_envelope(&envelope, &mut buffer)?;
        for datagram in link.transmit(buffer.as_slice().to_vec()) {
            if let Err(e) = socket.send(&datagram) {
                send_errors += 1;
                tracing::debug!("send to {} failed: {}", destination, e);
            }
        }

        std::thread::sleep(period);
    }

    if let Some(held) = link.flush() {
        let _ = socket.send(&held);
    }
    let stats = link.stats();
    tracing::info!(
        "{} frames: {} delivered, {} dropped, {} duplicated, {} reordered, {} send errors",
        stats.offered,
        stats.delivered,
        stats.dropped,
        stats.duplicated,
        stats.reordered,
        send_errors
    );
    Ok(())
}

/// One frame: each label circles the origin at its own phase, button bit 0
/// toggles every second.
fn build_frame(frame_id: u32, handedness: Handedness, source: &str, labels: &[String], t: Duration) -> FrameEnvelope {
    let mut envelope = FrameEnvelope::new(frame_id, handedness, source);
    let secs = t.as_secs_f32();
    for (i, label) in labels.iter().enumerate() {
        let angle = secs + i as f32;
        envelope.push(WireRecord {
            label: label.clone(),
            position: Vec3::new(angle.cos() * 2.0, 1.7, angle.sin() * 2.0),
            orientation: Quaternion::from_yaw(angle),
            button_bits: u32::from(t.as_secs() % 2 == 1),
            blob: None,
            tracked: true,
        });
    }
    envelope
}
