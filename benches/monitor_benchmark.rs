use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use exam_proctor::annotate;
use exam_proctor::frame::{FaceRect, Frame};
use exam_proctor::scheduler::Cadence;
use exam_proctor::violation::{ViolationPolicy, ViolationStateMachine};
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

fn create_frame(width: u32, height: u32) -> Frame {
    Frame::captured_now(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn create_faces(count: usize) -> Vec<FaceRect> {
    (0..count)
        .map(|i| FaceRect::new(40 + i as i32 * 90, 60, 80, 80))
        .collect()
}

fn benchmark_grayscale(c: &mut Criterion) {
    let mut group = c.benchmark_group("grayscale");

    for (width, height) in [(320, 240), (640, 480), (1280, 720)] {
        let frame = create_frame(width, height);
        group.bench_with_input(
            BenchmarkId::new("to_gray", format!("{}x{}", width, height)),
            &frame,
            |b, frame| b.iter(|| black_box(frame.to_gray())),
        );
    }

    group.finish();
}

fn benchmark_annotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotation");
    let frame = create_frame(640, 480);

    for face_count in [1, 2, 5] {
        let faces = create_faces(face_count);
        group.bench_with_input(
            BenchmarkId::new("draw_face_boxes", face_count),
            &faces,
            |b, faces| {
                b.iter(|| {
                    let mut display = frame.image().clone();
                    annotate::draw_face_boxes(
                        &mut display,
                        black_box(faces),
                        annotate::VIOLATION_COLOR,
                        annotate::BOX_THICKNESS,
                    );
                    black_box(display)
                })
            },
        );
    }

    group.finish();
}

fn benchmark_tick_logic(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_logic");

    group.bench_function("observe", |b| {
        let t0 = Instant::now();
        let mut machine = ViolationStateMachine::new(ViolationPolicy::default(), t0);
        machine.enable(t0);
        let mut tick = 0u32;
        b.iter(|| {
            tick = tick.wrapping_add(1);
            let now = t0 + Duration::from_millis(15) * (tick % 100_000);
            black_box(machine.observe(black_box((tick % 3) as usize), now))
        })
    });

    group.bench_function("next_delay", |b| {
        let mut cadence = Cadence::new(Duration::from_millis(15), Duration::from_millis(1));
        b.iter(|| black_box(cadence.next_delay(black_box(Duration::from_millis(7)))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_grayscale, benchmark_annotation, benchmark_tick_logic);
criterion_main!(benches);
