//! # Holojam Node
//!
//! Runs the transport for one node: mirrors watched remote labels, optionally
//! publishes one animated local object, and logs packet rates.
//!
//! ## Usage
//!
//! ```bash
//! holojam_node --config holojam.toml --watch VR1 --watch VR2
//! holojam_node --emit phone1 --duration 30 --log-level debug
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use holojam_networking::{
    TelemetryConfig, TelemetryOrchestrator, TelemetryResult, TickLoop, TrackedObject, ViewState,
};
use holojam_shared::{Quaternion, Vec3};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "holojam_node")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror Holojam pose telemetry on this machine")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reconcile rate in Hz
    #[arg(short, long, default_value_t = holojam_shared::constants::TICK_RATE)]
    tick_rate: u32,

    /// Run for N seconds then exit
    #[arg(short, long)]
    duration: Option<u64>,

    /// Remote label to mirror (repeatable)
    #[arg(short, long)]
    watch: Vec<String>,

    /// Label of an animated object this node publishes
    #[arg(short, long)]
    emit: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("holojam_networking={0},holojam_node={0}", cli.log_level))
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
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("loading configuration from {}", path.display());
            TelemetryConfig::from_file(path)?
        }
        None => TelemetryConfig::default(),
    };

    let mut node = TelemetryOrchestrator::new(config);
    let failures = node.start();
    if node.running_count() == 0 {
        if let Some(first) = failures.into_iter().next() {
            return Err(first);
        }
    }

    let mut views: Vec<ViewState> = cli.watch.iter().map(ViewState::remote).collect();
    let emit_index = cli.emit.as_ref().map(|label| {
        let mut object = TrackedObject::new(label.as_str());
        object.tracked = true;
        views.push(ViewState::local(object));
        views.len() - 1
    });

    let started = Instant::now();
    let deadline = cli.duration.map(|secs| started + Duration::from_secs(secs));
    let mut ticks = TickLoop::new(cli.tick_rate);
    let mut last_pose_log = started;

    tracing::info!(
        "reconciling {} views at {} Hz",
        views.len(),
        cli.tick_rate
    );

    loop {
        while ticks.should_tick() {
            let tick = ticks.begin_tick();

            if let Some(index) = emit_index {
                animate(&mut views[index].object, started.elapsed());
            }
            node.reconcile(&mut views, tick.delta);

            let now = Instant::now();
            if let Some(report) = node.poll_diagnostics(now) {
                tracing::info!("rates: {:?}", report.counts);
            }
            if now.duration_since(last_pose_log) >= Duration::from_secs(1) {
                last_pose_log = now;
                log_views(&views);
            }

            ticks.end_tick(tick);
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        ticks.wait_for_next_tick();
    }

    let stats = ticks.stats();
    tracing::info!(
        "{} ticks, avg {} us, max {} us, {} late",
        stats.total_ticks,
        stats.avg_tick_us,
        stats.max_tick_us,
        stats.late_ticks
    );
    node.stop();
    Ok(())
}

/// Walks the object around a one-meter circle, turning to face along it.
fn animate(object: &mut TrackedObject, t: Duration) {
    let angle = t.as_secs_f32();
    object.position = Vec3::new(angle.cos(), 1.5, angle.sin());
    object.orientation = Quaternion::from_yaw(angle);
}

fn log_views(views: &[ViewState]) {
    for view in views.iter().filter(|v| !v.local) {
        let o = &view.object;
        tracing::info!(
            "{} {} pos=({:.3}, {:.3}, {:.3}) buttons={:#x}",
            o.label,
            if o.tracked { "tracked" } else { "lost" },
            o.position.x,
            o.position.y,
            o.position.z,
            o.button_bits
        );
    }
}
