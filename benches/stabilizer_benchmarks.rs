//! Benchmarks for the Kalman stabilizers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use head_pose_tracking::{
    geometry::Pose,
    pipeline::PosePipeline,
    pose_solver::PoseSolver,
    stabilizer::{PointStabilizer, ScalarStabilizer, Stabilizer, StabilizerConfig},
};
use std::f64::consts::PI;

/// Sinusoidal head motion with uniform noise
fn generate_test_signal(num_samples: usize) -> Vec<f64> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 * 0.01;
            20.0 * (2.0 * PI * 0.3 * t).sin() + 2.0 * (rand::random::<f64>() - 0.5)
        })
        .collect()
}

fn benchmark_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar_stabilizer");
    let signal = generate_test_signal(1000);

    for state_num in [1, 2] {
        let config = StabilizerConfig {
            state_num,
            ..StabilizerConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("update_1000", state_num), &signal, |b, signal| {
            let mut stabilizer = ScalarStabilizer::new(config).expect("Invalid stabilizer config");
            b.iter(|| {
                for &value in signal {
                    stabilizer.update(black_box(value));
                }
                black_box(stabilizer.value())
            });
        });
    }

    group.finish();
}

fn benchmark_point_and_pose(c: &mut Criterion) {
    let mut group = c.benchmark_group("stabilize");
    let signal = generate_test_signal(1000);

    group.bench_function("point_1000", |b| {
        let mut stabilizer = PointStabilizer::new(0.1, 0.1).expect("Invalid stabilizer config");
        b.iter(|| {
            for &value in &signal {
                stabilizer.update([value, -value]);
            }
            black_box(stabilizer.value())
        });
    });

    group.bench_function("pose_1000", |b| {
        let solver = PoseSolver::new(480, 640).expect("Failed to create pose solver");
        let mut pipeline = PosePipeline::new(solver, StabilizerConfig::default()).expect("Invalid stabilizer config");
        b.iter(|| {
            for &value in &signal {
                let raw = Pose::from_array([value * 0.01, value * 0.02, 0.0, value, -value, 600.0 + value]);
                black_box(pipeline.stabilize(&raw));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_scalar, benchmark_point_and_pose);
criterion_main!(benches);
