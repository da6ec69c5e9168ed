//! Benchmark for the envelope codec and the receive ingest path.
//!
//! TARGET: a 32-object frame encodes and ingests well inside one 10 ms send
//! interval.
//!
//! Run with: cargo bench --package holojam_networking --bench envelope_benchmark

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use holojam_networking::{
    decode_envelope, encode_envelope, FrameBuffer, FrameEnvelope, Handedness, ReceiveChannelConfig,
    ReceiveWorker, TelemetryConfig, WireRecord,
};
use holojam_shared::{Quaternion, Vec3};

fn create_frame(frame_id: u32, objects: usize) -> FrameEnvelope {
    let mut envelope = FrameEnvelope::new(frame_id, Handedness::Left, "bench-tracker");
    for i in 0..objects {
        envelope.push(WireRecord {
            label: format!("VR{i}"),
            position: Vec3::new(i as f32, 1.7, -(i as f32)),
            orientation: Quaternion::from_yaw(i as f32 * 0.1),
            button_bits: i as u32,
            blob: (i % 4 == 0).then(|| "grip".to_owned()),
            tracked: true,
        });
    }
    envelope
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_envelope");
    for objects in [1usize, 8, 32, 128] {
        let envelope = create_frame(1, objects);
        let mut buffer = FrameBuffer::new(16 * 1024);
        group.throughput(Throughput::Elements(objects as u64));
        group.bench_with_input(BenchmarkId::from_parameter(objects), &envelope, |b, envelope| {
            b.iter(|| encode_envelope(black_box(envelope), &mut buffer));
        });
    }
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_envelope");
    for objects in [1usize, 8, 32, 128] {
        let mut buffer = FrameBuffer::new(16 * 1024);
        let _ = encode_envelope(&create_frame(1, objects), &mut buffer);
        let bytes = buffer.as_slice().to_vec();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(objects), &bytes, |b, bytes| {
            b.iter(|| decode_envelope(black_box(bytes)));
        });
    }
    group.finish();
}

fn benchmark_ingest_and_lookup(c: &mut Criterion) {
    let rx = ReceiveWorker::new(ReceiveChannelConfig::new("bench", 0), &TelemetryConfig::default());
    let frames: Vec<Vec<u8>> = (0..1024)
        .map(|id| {
            let mut buffer = FrameBuffer::new(16 * 1024);
            let _ = encode_envelope(&create_frame(id, 32), &mut buffer);
            buffer.as_slice().to_vec()
        })
        .collect();

    let mut next = 0usize;
    c.bench_function("ingest_32_objects", |b| {
        b.iter(|| {
            // past the first 1024 iterations this measures the stale-drop path
            let outcome = rx.ingest(black_box(&frames[next % frames.len()]));
            next += 1;
            outcome
        });
    });

    c.bench_function("get_object", |b| {
        b.iter(|| rx.get_object(black_box("VR7"), Duration::ZERO));
    });
}

criterion_group!(benches, benchmark_encode, benchmark_decode, benchmark_ingest_and_lookup);
criterion_main!(benches);
