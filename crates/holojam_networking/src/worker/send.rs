//! # Send Worker
//!
//! Publishes the locally-owned objects to the collector on a fixed cadence.
//! The consumer replaces the managed set every tick; the worker snapshots it
//! under the lock, encodes outside of it and sends one datagram.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{StopSignal, Worker, WorkerControl, WorkerState, WorkerThread};
use crate::config::TelemetryConfig;
use crate::error::{TelemetryError, TelemetryResult};
use crate::object::TrackedObject;
use crate::protocol::{encode_envelope, FrameBuffer, FrameEnvelope, Handedness};
use crate::transport::UnicastSender;

/// Channel name of the send worker in logs and diagnostics.
pub const SEND_CHANNEL_NAME: &str = "send";

#[derive(Debug, Default)]
struct SendTable {
    objects: HashMap<String, TrackedObject>,
    next_frame_id: u32,
}

#[derive(Debug)]
struct SendShared {
    table: Mutex<SendTable>,
    control: WorkerControl,
    source: String,
}

impl SendShared {
    fn assemble(&self) -> Option<FrameEnvelope> {
        let mut table = self.table.lock();
        if table.objects.is_empty() {
            return None;
        }
        let frame_id = table.next_frame_id;
        table.next_frame_id = table.next_frame_id.wrapping_add(1);

        let mut envelope = FrameEnvelope::new(frame_id, Handedness::Right, self.source.as_str());
        let mut labels: Vec<&String> = table.objects.keys().collect();
        labels.sort();
        for label in labels {
            if let Some(object) = table.objects.get(label) {
                envelope.push(object.to_record());
            }
        }
        Some(envelope)
    }
}

/// Worker owning the outbound channel.
pub struct SendWorker {
    collector: SocketAddr,
    interval: Duration,
    capacity: usize,
    shared: Arc<SendShared>,
    thread: WorkerThread,
    local_addr: Option<SocketAddr>,
}

impl SendWorker {
    /// Creates an idle worker sending to the configured collector.
    #[must_use]
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            collector: config.send.collector,
            interval: config.send_interval(),
            capacity: config.buffer_capacity,
            shared: Arc::new(SendShared {
                table: Mutex::new(SendTable::default()),
                control: WorkerControl::new(),
                source: config.send.source.clone(),
            }),
            thread: WorkerThread::default(),
            local_addr: None,
        }
    }

    /// Collector address.
    #[must_use]
    pub const fn collector(&self) -> SocketAddr {
        self.collector
    }

    /// Address the socket is bound to, once started.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Replaces the managed set. Objects absent from `objects` are no longer
    /// sent; on duplicate labels the last one wins.
    pub fn update_managed_objects<I>(&self, objects: I)
    where
        I: IntoIterator<Item = TrackedObject>,
    {
        let mut table = self.shared.table.lock();
        table.objects.clear();
        for object in objects {
            table.objects.insert(object.label.clone(), object);
        }
    }

    /// Copy of one managed object.
    #[must_use]
    pub fn managed_object(&self, label: &str) -> Option<TrackedObject> {
        self.shared.table.lock().objects.get(label).cloned()
    }

    /// Number of managed objects.
    #[must_use]
    pub fn managed_count(&self) -> usize {
        self.shared.table.lock().objects.len()
    }

    /// Builds the next outbound envelope from the managed set, sorted by
    /// label. Returns `None` when there is nothing to send; the frame id only
    /// advances when an envelope is produced.
    pub fn assemble_envelope(&self) -> Option<FrameEnvelope> {
        self.shared.assemble()
    }

    fn run(shared: &SendShared, socket: &UnicastSender, stop: &StopSignal, interval: Duration, capacity: usize) {
        let mut buffer = FrameBuffer::new(capacity);
        let mut failing = false;

        while !stop.wait(interval) {
            let Some(envelope) = shared.assemble() else {
                continue;
            };
            if let Err(e) = encode_envelope(&envelope, &mut buffer) {
                tracing::warn!("send: frame {} not encoded: {}", envelope.frame_id, e);
                continue;
            }

            match socket.send(buffer.as_slice()) {
                Ok(_) => {
                    shared.control.count_packet();
                    if failing {
                        failing = false;
                        tracing::info!("send: reaching {} again", socket.destination());
                    }
                }
                Err(e) if !failing => {
                    failing = true;
                    tracing::warn!("send: to {} failed: {}", socket.destination(), e);
                }
                Err(e) => {
                    tracing::debug!("send: to {} still failing: {}", socket.destination(), e);
                }
            }
        }
    }
}

impl Worker for SendWorker {
    fn name(&self) -> &str {
        SEND_CHANNEL_NAME
    }

    fn start(&mut self) -> TelemetryResult<()> {
        if self.is_running() {
            tracing::warn!("send channel already started");
            return Ok(());
        }
        self.thread.shutdown(SEND_CHANNEL_NAME);

        let socket = match UnicastSender::bind(self.collector) {
            Ok(socket) => socket,
            Err(source) => {
                tracing::error!("send channel: cannot bind for {}: {}", self.collector, source);
                self.shared.control.set_state(WorkerState::Stopped);
                return Err(TelemetryError::Bind {
                    channel: SEND_CHANNEL_NAME.to_owned(),
                    addr: self.collector,
                    source,
                });
            }
        };
        self.local_addr = socket.local_addr().ok();

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let capacity = self.capacity;
        shared.control.set_state(WorkerState::Running);
        let spawned = self
            .thread
            .spawn(SEND_CHANNEL_NAME, "holojam-tx".to_owned(), move |stop| {
                Self::run(&shared, &socket, &stop, interval, capacity);
                shared.control.set_state(WorkerState::Stopped);
                tracing::info!("send channel stopped");
            });
        if let Err(e) = spawned {
            self.shared.control.set_state(WorkerState::Stopped);
            return Err(e);
        }

        tracing::info!(
            "send channel to {} every {:?} (source {:?})",
            self.collector,
            self.interval,
            self.shared.source
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.state() != WorkerState::Running {
            tracing::warn!("send channel already stopped");
            self.thread.shutdown(SEND_CHANNEL_NAME);
            return;
        }
        self.shared.control.set_state(WorkerState::StopRequested);
        self.thread.shutdown(SEND_CHANNEL_NAME);
        self.shared.control.set_state(WorkerState::Stopped);
    }

    fn state(&self) -> WorkerState {
        self.shared.control.state()
    }

    fn take_packet_count(&self) -> u32 {
        self.shared.control.take_packets()
    }
}

impl Drop for SendWorker {
    fn drop(&mut self) {
        self.thread.shutdown(SEND_CHANNEL_NAME);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holojam_shared::Vec3;

    fn object(label: &str, x: f32) -> TrackedObject {
        let mut o = TrackedObject::new(label);
        o.position = Vec3::new(x, 0.0, 0.0);
        o.tracked = true;
        o
    }

    #[test]
    fn test_empty_set_sends_nothing() {
        let w = SendWorker::new(&TelemetryConfig::default());
        assert!(w.assemble_envelope().is_none());
        assert_eq!(w.managed_count(), 0);
    }

    #[test]
    fn test_update_replaces_set() {
        let w = SendWorker::new(&TelemetryConfig::default());
        w.update_managed_objects([object("a", 1.0), object("b", 2.0)]);
        assert_eq!(w.managed_count(), 2);

        w.update_managed_objects([object("b", 3.0)]);
        assert_eq!(w.managed_count(), 1);
        assert!(w.managed_object("a").is_none());
        assert_eq!(w.managed_object("b").unwrap().position.x, 3.0);
    }

    #[test]
    fn test_duplicate_label_last_wins() {
        let w = SendWorker::new(&TelemetryConfig::default());
        w.update_managed_objects([object("a", 1.0), object("a", 5.0)]);
        assert_eq!(w.managed_count(), 1);
        assert_eq!(w.managed_object("a").unwrap().position.x, 5.0);
    }

    #[test]
    fn test_envelope_is_right_handed_and_numbered() {
        let mut config = TelemetryConfig::default();
        config.send.source = "stage".to_owned();
        let w = SendWorker::new(&config);
        w.update_managed_objects([object("b", 2.0), object("a", 1.0)]);

        let first = w.assemble_envelope().unwrap();
        assert_eq!(first.frame_id, 0);
        assert_eq!(first.handedness, Handedness::Right);
        assert_eq!(first.source, "stage");
        let labels: Vec<_> = first.records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["a", "b"]);

        assert_eq!(w.assemble_envelope().unwrap().frame_id, 1);
    }

    #[test]
    fn test_name_and_initial_state() {
        let w = SendWorker::new(&TelemetryConfig::default());
        assert_eq!(w.name(), SEND_CHANNEL_NAME);
        assert_eq!(w.state(), WorkerState::Idle);
        assert_eq!(w.take_packet_count(), 0);
    }
}
