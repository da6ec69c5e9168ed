//! # Socket Workers
//!
//! Each channel runs on its own OS thread so that a slow or silent socket
//! never stalls the consumer's tick.
//!
//! ## Lifecycle
//!
//! ```text
//!   Idle ──start()──▶ Running ──stop()──▶ StopRequested ──(loop exits)──▶ Stopped
//!                        ▲                                                  │
//!                        └────────────────────start()───────────────────────┘
//! ```
//!
//! A bind failure moves a worker straight to `Stopped`. Stop requests travel
//! over a channel the worker polls between socket operations, so `stop()`
//! returns within one poll interval.

mod receive;
mod send;

pub use receive::{IngestOutcome, ReceiveWorker};
pub use send::{SendWorker, SEND_CHANNEL_NAME};

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::error::{TelemetryError, TelemetryResult};

/// Lifecycle state of a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Constructed, never started.
    Idle = 0,
    /// Thread running and doing I/O.
    Running = 1,
    /// Stop requested, thread not yet finished.
    StopRequested = 2,
    /// Thread finished, or the socket could not be set up.
    Stopped = 3,
}

impl WorkerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }
}

/// Capability shared by send and receive workers.
pub trait Worker {
    /// Channel name used in logs.
    fn name(&self) -> &str;

    /// Sets up the socket and starts the worker thread.
    ///
    /// Starting a running worker logs a warning and does nothing. A socket
    /// failure leaves the worker `Stopped` and is returned.
    fn start(&mut self) -> TelemetryResult<()>;

    /// Requests a stop and waits for the thread to finish.
    fn stop(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> WorkerState;

    /// Returns true while the thread is doing I/O.
    fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Returns the packets counted since the last call and resets the count.
    fn take_packet_count(&self) -> u32;
}

/// State and counter shared between a worker and its thread.
#[derive(Debug)]
pub(crate) struct WorkerControl {
    state: AtomicU8,
    packets: AtomicU32,
}

impl WorkerControl {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
            packets: AtomicU32::new(0),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn count_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn take_packets(&self) -> u32 {
        self.packets.swap(0, Ordering::Relaxed)
    }
}

/// Stop signal as seen from inside a worker thread.
#[derive(Debug)]
pub(crate) struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// Returns true once a stop was requested (or the worker was dropped).
    #[inline]
    pub(crate) fn requested(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleeps for `period` unless a stop arrives first; returns true on stop.
    #[inline]
    pub(crate) fn wait(&self, period: std::time::Duration) -> bool {
        !matches!(
            self.rx.recv_timeout(period),
            Err(crossbeam_channel::RecvTimeoutError::Timeout)
        )
    }
}

/// Owner side of a worker thread.
#[derive(Debug, Default)]
pub(crate) struct WorkerThread {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawns a named thread running `body` with a fresh stop signal.
    pub(crate) fn spawn<F>(&mut self, channel: &str, thread_name: String, body: F) -> TelemetryResult<()>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || body(StopSignal { rx: stop_rx }))
            .map_err(|source| TelemetryError::Spawn {
                channel: channel.to_owned(),
                source,
            })?;
        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Signals the thread and waits for it.
    pub(crate) fn shutdown(&mut self, channel: &str) {
        if let Some(tx) = self.stop_tx.take() {
            // A full channel already carries a stop; a closed one means the thread is gone.
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("{} worker thread panicked", channel);
            }
        }
    }
}
