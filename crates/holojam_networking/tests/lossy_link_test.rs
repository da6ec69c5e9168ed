//! Frame ordering under a perturbed datagram stream.

use std::time::Duration;

use holojam_networking::{
    encode_envelope, FrameBuffer, FrameEnvelope, Handedness, IngestOutcome, LossyLink,
    NetworkConditions, ReceiveChannelConfig, ReceiveWorker, TelemetryConfig, Worker, WireRecord,
};
use holojam_shared::Vec3;

fn datagram(frame_id: u32) -> Vec<u8> {
    let mut envelope = FrameEnvelope::new(frame_id, Handedness::Right, "lossy");
    envelope.push(WireRecord {
        label: "VR1".to_owned(),
        position: Vec3::new(frame_id as f32, 0.0, 0.0),
        tracked: true,
        ..WireRecord::default()
    });
    let mut buffer = FrameBuffer::new(256);
    encode_envelope(&envelope, &mut buffer).unwrap();
    buffer.as_slice().to_vec()
}

fn run(conditions: NetworkConditions, seed: u64, frames: u32) {
    let rx = ReceiveWorker::new(ReceiveChannelConfig::new("lossy", 0), &TelemetryConfig::default());
    let mut link = LossyLink::new(conditions, seed);

    let mut delivered = Vec::new();
    for id in 0..frames {
        delivered.extend(link.transmit(datagram(id)));
    }
    delivered.extend(link.flush());

    let mut highest: Option<u32> = None;
    let mut accepted = 0u32;
    for bytes in &delivered {
        match rx.ingest(bytes) {
            IngestOutcome::Accepted { frame_id, .. } => {
                assert!(highest.map_or(true, |h| frame_id > h), "frame {frame_id} after {highest:?}");
                highest = Some(frame_id);
                accepted += 1;
            }
            IngestOutcome::Stale { frame_id, last_accepted } => {
                assert!(frame_id <= last_accepted);
            }
            IngestOutcome::Malformed(e) => panic!("link corrupted a datagram: {e}"),
        }

        let shown = rx.get_object("VR1", Duration::ZERO).unwrap();
        assert_eq!(shown.position.x, highest.unwrap() as f32);
    }

    assert_eq!(rx.last_accepted_frame(), highest);
    assert_eq!(rx.take_packet_count(), accepted);
    assert_eq!(rx.decode_errors(), 0);
}

#[test]
fn test_monotonic_on_average_network() {
    run(NetworkConditions::AVERAGE, 11, 2_000);
}

#[test]
fn test_monotonic_on_poor_network() {
    for seed in 0..8 {
        run(NetworkConditions::POOR, seed, 1_000);
    }
}

#[test]
fn test_monotonic_on_hostile_network() {
    run(NetworkConditions::new(30, 30, 50), 99, 1_000);
}
