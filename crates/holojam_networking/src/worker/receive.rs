//! # Receive Worker
//!
//! Listens on one channel, keeps the objects of the newest accepted frame,
//! and answers timed lookups from the consumer thread.
//!
//! ## Frame Ordering
//!
//! ```text
//! datagrams:  7  8  6  8  9  12  10
//! accepted:   7  8  .  .  9  12  .
//! ```
//!
//! Anything at or below the last accepted frame id is discarded whole.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{StopSignal, Worker, WorkerControl, WorkerState, WorkerThread};
use crate::config::{ReceiveChannelConfig, TelemetryConfig};
use crate::error::{DecodeError, TelemetryError, TelemetryResult};
use crate::object::TrackedObject;
use crate::protocol::{decode_envelope, FrameRotation};
use crate::transport::{MulticastReceiver, RecvOutcome};

/// What happened to one datagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The frame replaced the table.
    Accepted {
        /// Frame id of the new table.
        frame_id: u32,
        /// Objects in the new table.
        objects: usize,
    },
    /// The frame was not newer than the last accepted one.
    Stale {
        /// Frame id of the discarded datagram.
        frame_id: u32,
        /// Frame id currently in the table.
        last_accepted: u32,
    },
    /// The datagram did not decode.
    Malformed(DecodeError),
}

/// Objects of the last accepted frame plus the silence timer.
///
/// Both live under one lock: table replacement and timer updates are atomic
/// together.
#[derive(Debug, Default)]
struct ReceiveTable {
    objects: HashMap<String, TrackedObject>,
    since_last_datagram: Duration,
}

#[derive(Debug)]
struct ReceiveShared {
    table: Mutex<ReceiveTable>,
    frames: Mutex<FrameRotation>,
    control: WorkerControl,
    decode_errors: AtomicU64,
    staleness_timeout: Duration,
    capacity: usize,
}

impl ReceiveShared {
    /// Runs one datagram through decode and frame ordering.
    ///
    /// The `frames` lock is held only for the copy into `current`, the
    /// decode and the rotation.
    fn ingest(&self, datagram: &[u8]) -> IngestOutcome {
        self.table.lock().since_last_datagram = Duration::ZERO;

        if datagram.len() > self.capacity {
            self.decode_errors.fetch_add(1, Ordering::Relaxed);
            return IngestOutcome::Malformed(DecodeError::Oversize {
                len: datagram.len(),
                capacity: self.capacity,
            });
        }

        let mut frames = self.frames.lock();
        frames.current.storage_mut()[..datagram.len()].copy_from_slice(datagram);
        frames.current.set_len(datagram.len());
        self.process_current(&mut frames)
    }

    /// Handles the bytes sitting in `frames.current`.
    fn process_current(&self, frames: &mut FrameRotation) -> IngestOutcome {
        let envelope = match decode_envelope(frames.current.as_slice()) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                return IngestOutcome::Malformed(e);
            }
        };

        if !frames.is_newer(envelope.frame_id) {
            return IngestOutcome::Stale {
                frame_id: envelope.frame_id,
                last_accepted: frames.last_accepted().unwrap_or_default(),
            };
        }

        if frames.last_accepted().is_none() {
            tracing::debug!(
                "first frame {} from source {:?} ({} records)",
                envelope.frame_id,
                envelope.source,
                envelope.records.len()
            );
        }

        self.control.count_packet();
        frames.current.set_frame_id(envelope.frame_id);
        frames.rotate();

        let handedness = envelope.handedness;
        let mut table = self.table.lock();
        table.objects.clear();
        for record in envelope.records {
            // later records with the same label overwrite earlier ones
            table
                .objects
                .insert(record.label.clone(), TrackedObject::from_record(record, handedness));
        }

        IngestOutcome::Accepted {
            frame_id: envelope.frame_id,
            objects: table.objects.len(),
        }
    }
}

/// Worker owning one multicast receive channel.
pub struct ReceiveWorker {
    channel: ReceiveChannelConfig,
    group: Ipv4Addr,
    poll_interval: Duration,
    shared: Arc<ReceiveShared>,
    thread: WorkerThread,
    local_addr: Option<SocketAddr>,
}

impl ReceiveWorker {
    /// Creates an idle worker for `channel` using the node-wide settings.
    #[must_use]
    pub fn new(channel: ReceiveChannelConfig, config: &TelemetryConfig) -> Self {
        Self {
            channel,
            group: config.multicast_group,
            poll_interval: config.poll_interval(),
            shared: Arc::new(ReceiveShared {
                table: Mutex::new(ReceiveTable::default()),
                frames: Mutex::new(FrameRotation::new(config.buffer_capacity)),
                control: WorkerControl::new(),
                decode_errors: AtomicU64::new(0),
                staleness_timeout: config.staleness_timeout(),
                capacity: config.buffer_capacity,
            }),
            thread: WorkerThread::default(),
            local_addr: None,
        }
    }

    /// Channel configuration.
    #[must_use]
    pub const fn channel(&self) -> &ReceiveChannelConfig {
        &self.channel
    }

    /// Address the socket is bound to, once started.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Datagrams that failed to decode since construction.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.shared.decode_errors.load(Ordering::Relaxed)
    }

    /// Frame id of the table contents.
    #[must_use]
    pub fn last_accepted_frame(&self) -> Option<u32> {
        self.shared.frames.lock().last_accepted()
    }

    /// Feeds one datagram through decode and frame ordering, exactly as the
    /// socket loop does. Datagrams larger than the buffer capacity are
    /// rejected whole.
    pub fn ingest(&self, datagram: &[u8]) -> IngestOutcome {
        self.shared.ingest(datagram)
    }

    /// Timed lookup from the consumer thread.
    ///
    /// Adds `elapsed` to the channel's silence timer; once the timer passes
    /// the staleness timeout the entry is marked untracked in place, keeping
    /// its pose. Returns `None` if the label is not in the current frame.
    pub fn get_object(&self, label: &str, elapsed: Duration) -> Option<TrackedObject> {
        let mut guard = self.shared.table.lock();
        let table = &mut *guard;
        let object = table.objects.get_mut(label)?;

        table.since_last_datagram = table.since_last_datagram.saturating_add(elapsed);
        if table.since_last_datagram > self.shared.staleness_timeout {
            object.tracked = false;
        }
        Some(object.clone())
    }

    /// Labels in the current frame.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.shared.table.lock().objects.keys().cloned().collect()
    }

    fn run(shared: &ReceiveShared, socket: &MulticastReceiver, stop: &StopSignal, name: &str, poll_interval: Duration) {
        let mut announced = false;
        // one spare byte so an oversize datagram shows up as a full read
        let mut datagram = vec![0u8; shared.capacity + 1];
        while !stop.requested() {
            let len = match socket.recv(&mut datagram) {
                RecvOutcome::Datagram(len) => len,
                RecvOutcome::Idle => continue,
                RecvOutcome::Failed(e) => {
                    tracing::warn!("receive channel {}: recv failed: {}", name, e);
                    std::thread::sleep(poll_interval);
                    continue;
                }
            };

            match shared.ingest(&datagram[..len]) {
                IngestOutcome::Accepted { frame_id, objects } if !announced => {
                    announced = true;
                    tracing::info!(
                        "receive channel {}: first frame {} with {} objects",
                        name,
                        frame_id,
                        objects
                    );
                }
                IngestOutcome::Accepted { .. } => {}
                IngestOutcome::Stale { frame_id, last_accepted } => {
                    tracing::trace!(
                        "receive channel {}: dropped frame {} (have {})",
                        name,
                        frame_id,
                        last_accepted
                    );
                }
                IngestOutcome::Malformed(e) => {
                    tracing::debug!("receive channel {}: dropped datagram: {}", name, e);
                }
            }
        }
    }
}

impl Worker for ReceiveWorker {
    fn name(&self) -> &str {
        &self.channel.name
    }

    fn start(&mut self) -> TelemetryResult<()> {
        if self.is_running() {
            tracing::warn!("receive channel {} already started", self.channel.name);
            return Ok(());
        }
        self.thread.shutdown(&self.channel.name);

        let socket = match MulticastReceiver::bind(self.channel.port, self.group, self.poll_interval) {
            Ok(socket) => socket,
            Err(source) => {
                let addr = SocketAddr::from(([0, 0, 0, 0], self.channel.port));
                tracing::error!("receive channel {}: cannot bind {}: {}", self.channel.name, addr, source);
                self.shared.control.set_state(WorkerState::Stopped);
                return Err(TelemetryError::Bind {
                    channel: self.channel.name.clone(),
                    addr,
                    source,
                });
            }
        };
        self.local_addr = Some(socket.local_addr());

        let shared = Arc::clone(&self.shared);
        let name = self.channel.name.clone();
        let poll_interval = self.poll_interval;
        shared.control.set_state(WorkerState::Running);
        let spawned = self.thread.spawn(
            &self.channel.name,
            format!("holojam-rx-{}", self.channel.name),
            move |stop| {
                Self::run(&shared, &socket, &stop, &name, poll_interval);
                shared.control.set_state(WorkerState::Stopped);
                tracing::info!("receive channel {} stopped", name);
            },
        );
        if let Err(e) = spawned {
            self.shared.control.set_state(WorkerState::Stopped);
            return Err(e);
        }

        tracing::info!(
            "receive channel {} listening on {} (group {})",
            self.channel.name,
            socket_display(self.local_addr),
            self.group
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.state() != WorkerState::Running {
            tracing::warn!("receive channel {} already stopped", self.channel.name);
            self.thread.shutdown(&self.channel.name);
            return;
        }
        self.shared.control.set_state(WorkerState::StopRequested);
        self.thread.shutdown(&self.channel.name);
        self.shared.control.set_state(WorkerState::Stopped);
    }

    fn state(&self) -> WorkerState {
        self.shared.control.state()
    }

    fn take_packet_count(&self) -> u32 {
        self.shared.control.take_packets()
    }
}

impl Drop for ReceiveWorker {
    fn drop(&mut self) {
        self.thread.shutdown(&self.channel.name);
    }
}

fn socket_display(addr: Option<SocketAddr>) -> String {
    addr.map_or_else(|| "?".to_owned(), |a| a.to_string())
}
