//! # Telemetry Orchestrator
//!
//! Owns one send worker and the receive workers of a node, and bridges them
//! to the consumer's views once per tick.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  local views ──▶│ reconcile ──▶ SendWorker     │──▶ collector
//!                 │                              │
//!  remote views ◀─│ reconcile ◀── ReceiveWorker  │◀── motive
//!                 │           ◀── ReceiveWorker  │◀── nonmotive
//!                 └──────────────────────────────┘
//! ```
//!
//! Remote labels are looked up channel by channel in configuration order and
//! the first channel that has the label wins. The orchestrator never holds
//! two workers' locks at once.

mod diagnostics;
mod view;

pub use diagnostics::{ChannelId, RateReport};
pub use view::{TelemetryView, ViewState};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use self::diagnostics::RateWindow;
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::worker::{ReceiveWorker, SendWorker, Worker, WorkerState};

/// The transport of one node.
pub struct TelemetryOrchestrator {
    config: TelemetryConfig,
    sender: SendWorker,
    receivers: Vec<ReceiveWorker>,
    missing_labels: Mutex<HashSet<String>>,
    warned_empty_label: AtomicBool,
    rate_window: Mutex<RateWindow>,
}

impl TelemetryOrchestrator {
    /// Builds idle workers for every configured channel.
    #[must_use]
    pub fn new(config: TelemetryConfig) -> Self {
        let sender = SendWorker::new(&config);
        let receivers = config
            .receive
            .iter()
            .map(|channel| ReceiveWorker::new(channel.clone(), &config))
            .collect();
        let rate_window = Mutex::new(RateWindow::new(config.diagnostics_interval()));

        Self {
            config,
            sender,
            receivers,
            missing_labels: Mutex::new(HashSet::new()),
            warned_empty_label: AtomicBool::new(false),
            rate_window,
        }
    }

    /// Configuration the node was built from.
    #[must_use]
    pub const fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// The outbound worker.
    #[must_use]
    pub const fn sender(&self) -> &SendWorker {
        &self.sender
    }

    /// Inbound workers in lookup order.
    #[must_use]
    pub fn receivers(&self) -> &[ReceiveWorker] {
        &self.receivers
    }

    /// Inbound worker by channel name.
    #[must_use]
    pub fn receiver(&self, name: &str) -> Option<&ReceiveWorker> {
        self.receivers.iter().find(|r| r.name() == name)
    }

    /// Starts every worker. A worker that fails is logged and left stopped
    /// while the others run; the failures are returned.
    pub fn start(&mut self) -> Vec<TelemetryError> {
        let mut failures = Vec::new();
        if let Err(e) = self.sender.start() {
            failures.push(e);
        }
        for receiver in &mut self.receivers {
            if let Err(e) = receiver.start() {
                failures.push(e);
            }
        }

        let running = self.running_count();
        let total = self.receivers.len() + 1;
        if failures.is_empty() {
            tracing::info!("telemetry started: {} channels running", running);
        } else {
            tracing::warn!("telemetry started: {} of {} channels running", running, total);
        }
        failures
    }

    /// Stops every running worker and waits for their threads.
    pub fn stop(&mut self) {
        if self.sender.state() == WorkerState::Running {
            self.sender.stop();
        }
        for receiver in &mut self.receivers {
            if receiver.state() == WorkerState::Running {
                receiver.stop();
            }
        }
        tracing::info!("telemetry stopped");
    }

    /// Workers currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        usize::from(self.sender.is_running()) + self.receivers.iter().filter(|r| r.is_running()).count()
    }

    /// One consumer tick: publishes local views and refreshes remote views.
    ///
    /// `elapsed` is the time since the previous call; it drives the
    /// staleness timers of the channels queried.
    pub fn reconcile<V: TelemetryView>(&self, views: &mut [V], elapsed: Duration) {
        let mut local = Vec::new();

        for view in views.iter_mut() {
            if view.label().is_empty() {
                if !self.warned_empty_label.swap(true, Ordering::Relaxed) {
                    tracing::warn!("view without a label skipped");
                }
                continue;
            }

            if view.is_local() {
                let mut object = view.snapshot();
                if object.label != view.label() {
                    object.label = view.label().to_owned();
                }
                local.push(object);
                continue;
            }

            self.refresh_remote(view, elapsed);
        }

        self.sender.update_managed_objects(local);
    }

    fn refresh_remote<V: TelemetryView>(&self, view: &mut V, elapsed: Duration) {
        let found = self
            .receivers
            .iter()
            .find_map(|receiver| receiver.get_object(view.label(), elapsed));

        match found {
            Some(remote) => {
                view.apply(&remote);
                let mut missing = self.missing_labels.lock();
                if missing.remove(view.label()) {
                    tracing::info!("label {} found again", view.label());
                }
            }
            None => {
                view.mark_untracked();
                let mut missing = self.missing_labels.lock();
                if missing.insert(view.label().to_owned()) {
                    tracing::warn!("no channel has label {}", view.label());
                }
            }
        }
    }

    /// Takes and resets every worker's packet count and warns about the
    /// channels at or below their low-water mark.
    pub fn report_rates(&self) -> RateReport {
        let mut report = RateReport::default();

        let sent = self.sender.take_packet_count();
        report.counts.insert(ChannelId::Send, sent);
        if let Some(low_water) = self.config.send.low_water {
            if sent <= low_water {
                tracing::warn!("send channel: only {} packets sent in the last window", sent);
                report.under_delivering.push(ChannelId::Send);
            }
        }

        for (index, receiver) in self.receivers.iter().enumerate() {
            let received = receiver.take_packet_count();
            let id = ChannelId::Receive(index);
            report.counts.insert(id, received);
            if received <= receiver.channel().low_water {
                tracing::warn!(
                    "receive channel {}: only {} packets received in the last window",
                    receiver.name(),
                    received
                );
                report.under_delivering.push(id);
            }
        }

        tracing::debug!("packet rates: {:?}", report.counts);
        report
    }

    /// Reports rates once per diagnostics interval. The first call only
    /// opens the window.
    pub fn poll_diagnostics(&self, now: Instant) -> Option<RateReport> {
        if self.rate_window.lock().elapsed(now) {
            Some(self.report_rates())
        } else {
            None
        }
    }

    /// Labels currently reported missing.
    #[must_use]
    pub fn missing_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.missing_labels.lock().iter().cloned().collect();
        labels.sort();
        labels
    }
}

impl Drop for TelemetryOrchestrator {
    fn drop(&mut self) {
        if self.running_count() > 0 {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiveChannelConfig;
    use crate::object::TrackedObject;
    use crate::protocol::{encode_envelope, FrameBuffer, FrameEnvelope, Handedness, WireRecord};
    use holojam_shared::Vec3;

    fn config() -> TelemetryConfig {
        TelemetryConfig {
            receive: vec![ReceiveChannelConfig::new("first", 40001), ReceiveChannelConfig::new("second", 40002)],
            ..TelemetryConfig::default()
        }
    }

    fn feed(worker: &ReceiveWorker, frame_id: u32, records: &[(&str, f32)]) {
        let mut envelope = FrameEnvelope::new(frame_id, Handedness::Right, "test");
        for &(label, x) in records {
            envelope.push(WireRecord {
                label: label.to_owned(),
                position: Vec3::new(x, 0.0, 0.0),
                tracked: true,
                ..WireRecord::default()
            });
        }
        let mut buffer = FrameBuffer::new(4096);
        encode_envelope(&envelope, &mut buffer).unwrap();
        worker.ingest(buffer.as_slice());
    }

    fn local(label: &str, x: f32) -> ViewState {
        let mut object = TrackedObject::new(label);
        object.position = Vec3::new(x, 0.0, 0.0);
        object.tracked = true;
        ViewState::local(object)
    }

    #[test]
    fn test_first_channel_wins() {
        let node = TelemetryOrchestrator::new(config());
        feed(&node.receivers()[0], 1, &[("VR1", 1.0)]);
        feed(&node.receivers()[1], 1, &[("VR1", 2.0), ("VR2", 3.0)]);

        let mut views = vec![ViewState::remote("VR1"), ViewState::remote("VR2")];
        node.reconcile(&mut views, Duration::from_millis(20));

        assert_eq!(views[0].object.position.x, 1.0);
        assert_eq!(views[1].object.position.x, 3.0);
        assert!(views[0].object.tracked && views[1].object.tracked);
    }

    #[test]
    fn test_missing_label_untracked_and_reported_once() {
        let node = TelemetryOrchestrator::new(config());
        let mut views = vec![ViewState::remote("ghost")];
        views[0].object.tracked = true;

        node.reconcile(&mut views, Duration::ZERO);
        assert!(!views[0].object.tracked);
        assert_eq!(node.missing_labels(), ["ghost"]);

        node.reconcile(&mut views, Duration::ZERO);
        assert_eq!(node.missing_labels(), ["ghost"]);

        feed(&node.receivers()[1], 1, &[("ghost", 4.0)]);
        node.reconcile(&mut views, Duration::ZERO);
        assert!(views[0].object.tracked);
        assert!(node.missing_labels().is_empty());
    }

    #[test]
    fn test_local_views_replace_send_table() {
        let node = TelemetryOrchestrator::new(config());
        let mut views = vec![local("paddle1", 1.0), local("paddle1", 2.0), local("ball", 0.5)];
        node.reconcile(&mut views, Duration::ZERO);

        assert_eq!(node.sender().managed_count(), 2);
        assert_eq!(node.sender().managed_object("paddle1").unwrap().position.x, 2.0);

        let envelope = node.sender().assemble_envelope().unwrap();
        let paddles = envelope.records.iter().filter(|r| r.label == "paddle1").count();
        assert_eq!(paddles, 1);

        let mut none: Vec<ViewState> = Vec::new();
        node.reconcile(&mut none, Duration::ZERO);
        assert_eq!(node.sender().managed_count(), 0);
    }

    #[test]
    fn test_empty_label_skipped() {
        let node = TelemetryOrchestrator::new(config());
        let mut views = vec![local("", 1.0), ViewState::remote("")];
        node.reconcile(&mut views, Duration::ZERO);
        assert_eq!(node.sender().managed_count(), 0);
        assert!(node.missing_labels().is_empty());
    }

    #[test]
    fn test_boxed_views() {
        let node = TelemetryOrchestrator::new(config());
        feed(&node.receivers()[0], 3, &[("VR1", 9.0)]);

        let mut views: Vec<Box<dyn TelemetryView>> = vec![Box::new(ViewState::remote("VR1")), Box::new(local("me", 1.0))];
        node.reconcile(&mut views, Duration::ZERO);
        assert_eq!(views[0].snapshot().position.x, 9.0);
        assert_eq!(node.sender().managed_count(), 1);
    }

    #[test]
    fn test_rate_report_counts_and_resets() {
        let node = TelemetryOrchestrator::new(config());
        for id in 0..5 {
            feed(&node.receivers()[0], id, &[("VR1", 0.0)]);
        }
        feed(&node.receivers()[0], 2, &[("VR1", 0.0)]);

        let report = node.report_rates();
        assert_eq!(report.count(ChannelId::Receive(0)), 5);
        assert_eq!(report.count(ChannelId::Receive(1)), 0);
        assert_eq!(report.count(ChannelId::Send), 0);
        // send warnings are off by default
        assert_eq!(report.under_delivering, [ChannelId::Receive(0), ChannelId::Receive(1)]);

        let again = node.report_rates();
        assert_eq!(again.count(ChannelId::Receive(0)), 0);
    }

    #[test]
    fn test_send_low_water() {
        let mut config = config();
        config.send.low_water = Some(48);
        let node = TelemetryOrchestrator::new(config);
        let report = node.report_rates();
        assert!(report.under_delivering.contains(&ChannelId::Send));
    }

    #[test]
    fn test_poll_diagnostics_interval() {
        let node = TelemetryOrchestrator::new(config());
        let start = Instant::now();
        assert!(node.poll_diagnostics(start).is_none());
        assert!(node.poll_diagnostics(start + Duration::from_millis(500)).is_none());
        assert!(node.poll_diagnostics(start + Duration::from_secs(1)).is_some());
    }

    #[test]
    fn test_lookup_by_name() {
        let node = TelemetryOrchestrator::new(config());
        assert_eq!(node.receiver("second").unwrap().channel().port, 40002);
        assert!(node.receiver("third").is_none());
        assert_eq!(node.running_count(), 0);
    }
}
