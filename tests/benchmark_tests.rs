use climasight_core::{
    regulate, BoundingBox, Detection, Frame, RegulationPolicy, Season, SensorReading, SharedState,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_regulate(c: &mut Criterion) {
    let policy = RegulationPolicy::default();

    c.bench_function("regulate_summer_crowd", |b| {
        b.iter(|| regulate(black_box(12), Season::Summer, black_box(Some(24.0)), &policy))
    });

    c.bench_function("regulate_out_of_table", |b| {
        b.iter(|| regulate(black_box(10_000), Season::Winter, black_box(None), &policy))
    });
}

fn bench_shared_state(c: &mut Criterion) {
    let state = SharedState::new();
    let frame = Frame::from_rgb(640, 480, vec![0; 640 * 480 * 3]).unwrap();
    let boxes: Vec<BoundingBox> = (0..8)
        .map(|i| BoundingBox::new(i as f32, 0.0, i as f32 + 10.0, 20.0, 0.9, 0))
        .collect();

    c.bench_function("publish_frame_640x480", |b| {
        b.iter(|| state.publish_frame(black_box(frame.clone())))
    });

    c.bench_function("publish_detection_8_boxes", |b| {
        b.iter(|| state.publish_detection(Detection::new(black_box(boxes.clone()), 1, 180.0)))
    });

    state.publish_sensor(SensorReading::new(21.0, Some(40.0)));
    c.bench_function("read_inputs", |b| b.iter(|| black_box(state.read_inputs())));
}

criterion_group!(benches, bench_regulate, bench_shared_state);
criterion_main!(benches);
