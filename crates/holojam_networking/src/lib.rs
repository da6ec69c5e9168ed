//! # Holojam Networking
//!
//! Best-effort UDP transport for pose telemetry in a Holojam space.
//!
//! ## Architecture
//!
//! - **Protocol**: little-endian binary envelope, one frame per datagram
//! - **Workers**: one OS thread per socket, each owning a labeled table
//! - **Orchestrator**: bridges worker tables and consumer views once per tick
//! - **Diagnostics**: per-channel packet rates with low-water warnings
//!
//! ## Guarantees
//!
//! - Per receive channel, only strictly increasing frame ids are applied
//! - A looked-up object goes untracked once its channel has been silent for
//!   longer than the staleness timeout; its pose is kept
//! - The consumer tick never waits on the network, only on a short lock
//!
//! ```text
//! TRACKER                   NODE                         COLLECTOR
//!    |                        |                               |
//!    |--- multicast frame --->| ReceiveWorker -> reconcile    |
//!    |                        |                               |
//!    |                        | reconcile -> SendWorker ----->|
//!    |                        |                               |
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use holojam_networking::{TelemetryConfig, TelemetryOrchestrator, TickLoop, ViewState};
//!
//! let mut node = TelemetryOrchestrator::new(TelemetryConfig::from_file("holojam.toml")?);
//! node.start();
//!
//! let mut views = vec![ViewState::remote("VR1")];
//! let mut ticks = TickLoop::default();
//! loop {
//!     while ticks.should_tick() {
//!         let tick = ticks.begin_tick();
//!         node.reconcile(&mut views, tick.delta);
//!         ticks.end_tick(tick);
//!     }
//!     ticks.wait_for_next_tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod object;
pub mod orchestrator;
pub mod protocol;
pub mod simulation;
pub mod tick;
pub mod transport;
pub mod worker;

pub use config::{DiagnosticsConfig, ReceiveChannelConfig, SendConfig, TelemetryConfig};
pub use error::{ConfigError, DecodeError, EncodeError, TelemetryError, TelemetryResult};
pub use object::TrackedObject;
pub use orchestrator::{ChannelId, RateReport, TelemetryOrchestrator, TelemetryView, ViewState};
pub use protocol::{decode_envelope, encode_envelope, FrameBuffer, FrameEnvelope, Handedness, WireRecord};
pub use simulation::{LinkStats, LossyLink, NetworkConditions};
pub use tick::{Tick, TickLoop, TickStats};
pub use worker::{IngestOutcome, ReceiveWorker, SendWorker, Worker, WorkerState};
