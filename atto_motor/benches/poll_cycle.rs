//! Poll cycle benchmark: one full status refresh against the simulated device.
//!
//! Covers the work done under the controller lock each cycle: connection
//! flag, then position / in-range / reference / output reads and parameter
//! publication for every axis.

use atto_common::consts::MAX_AXES;
use atto_common::motor::MotorController;
use atto_motor::drivers::simulation::SimulationConnector;
use atto_motor::{Controller, ControllerTiming};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

/// Background loop parked for the whole run; cycles are driven by the bench.
fn bench_timing() -> ControllerTiming {
    ControllerTiming {
        poll_interval: Duration::from_secs(3600),
        ..ControllerTiming::default()
    }
}

fn bench_poll_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_cycle");
    let connector = SimulationConnector::default();

    for axes in 1..=MAX_AXES {
        let controller = Controller::new("BENCH", "127.0.0.1", axes, &connector, bench_timing())
            .expect("simulated controller");
        group.bench_with_input(BenchmarkId::from_parameter(axes), &controller, |b, ctrl| {
            b.iter(|| ctrl.poll_now());
        });
        controller.shutdown();
    }
    group.finish();
}

fn bench_axis_poll(c: &mut Criterion) {
    let connector = SimulationConnector::default();
    let controller = Controller::new("BENCH", "127.0.0.1", 1, &connector, bench_timing())
        .expect("simulated controller");
    let axis = controller.axis(0).expect("axis 0");

    c.bench_function("axis_poll", |b| {
        b.iter(|| black_box(axis.poll()));
    });
}

criterion_group!(benches, bench_poll_cycle, bench_axis_poll);
criterion_main!(benches);
