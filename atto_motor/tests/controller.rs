//! Controller and axis behaviour against a recording mock device.

mod common;

use atto_common::device::IdentityField;
use atto_common::motor::{AxisLocator, MotorAxis, MotorController, MotorError};
use atto_common::params::{ParamScope, ParamValue};
use atto_motor::{Controller, ControllerTiming};
use atto_motor::motor_params::{ATTOCUBE_CONNECTED, MOTOR_POSITION};
use common::{Call, MockConnector, MockDevice, fast_timing, first_index, last_index, manual_timing};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn controller(device: &MockDevice, axes: usize) -> Controller {
    Controller::new("AMC1", "192.168.1.50", axes, &MockConnector::new(device), manual_timing())
        .expect("controller")
}

#[test]
fn axis_index_matches_channel() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 3);

    for i in 0..3 {
        assert_eq!(ctrl.axis(i).expect("axis").channel(), i);
    }
    assert!(ctrl.axis(3).is_none());
    assert_eq!(ctrl.axis_count(), 3);
}

#[test]
fn construction_fetches_identity_then_enables_axes() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 3);

    let expected = vec![
        Call::Identity(IdentityField::SerialNumber),
        Call::Identity(IdentityField::FirmwareVersion),
        Call::Identity(IdentityField::Hostname),
        Call::Identity(IdentityField::DeviceName),
        Call::Identity(IdentityField::IpAddress),
        Call::Identity(IdentityField::MacAddress),
        Call::SetOutputEnabled(0, true),
        Call::SetOutputEnabled(1, true),
        Call::SetOutputEnabled(2, true),
    ];
    assert_eq!(device.calls(), expected);

    assert!(ctrl.is_connected());
    let identity = ctrl.identity().expect("identity");
    assert_eq!(identity.serial_number.as_str(), "L01-0042");

    let serial = ctrl.param_id("ATTOCUBE_SERIAL").expect("serial param");
    let connected = ctrl.param_id(ATTOCUBE_CONNECTED).expect("connected param");
    ctrl.with_params(|p| {
        assert_eq!(p.get_string(ParamScope::Controller, serial), Some("L01-0042"));
        assert_eq!(p.get_integer(ParamScope::Controller, connected), Some(1));
    });
}

#[test]
fn absolute_move_completes_after_one_check() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 3);
    device.clear_calls();

    ctrl.axis(0).unwrap().move_to(5.0, false, 0.0, 10.0, 1.0).unwrap();

    assert_eq!(device.count(&Call::TargetInRange(0)), 1);
    assert_eq!(
        device.calls(),
        vec![
            Call::Position(0),
            Call::SetTarget(0, 5.0),
            Call::SetMoveEnabled(0, true),
            Call::TargetInRange(0),
            Call::SetMoveEnabled(0, false),
        ]
    );

    let ids = ctrl.params().clone();
    ctrl.with_params(|p| {
        assert_eq!(p.get_double(ParamScope::Axis(0), ids.position), Some(5.0));
        assert_eq!(p.get_integer(ParamScope::Axis(0), ids.done), Some(1));
    });
    assert_eq!(ctrl.snapshot().axes[0].position, 5.0);
}

#[test]
fn relative_move_offsets_from_current_position() {
    let device = MockDevice::new();
    device.set_position(1, 2.0);
    let ctrl = controller(&device, 2);

    ctrl.axis(1).unwrap().move_to(1.5, true, 0.0, 0.0, 0.0).unwrap();

    assert_eq!(device.count(&Call::SetTarget(1, 3.5)), 1);
    assert_eq!(ctrl.snapshot().axes[1].position, 3.5);
}

#[test]
fn move_while_disconnected_fails() {
    let ctrl = Controller::new("AMC1", "10.0.0.9", 1, &MockConnector::refusing(), manual_timing())
        .unwrap();
    let err = ctrl.axis(0).unwrap().move_to(1.0, false, 0.0, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, MotorError::Device(_)));
}

#[test]
fn move_times_out_and_disables() {
    let device = MockDevice::new();
    device.set_in_range(false);
    let mut timing = manual_timing();
    timing.move_timeout = Duration::from_millis(30);
    let ctrl = Controller::new("AMC1", "h", 1, &MockConnector::new(&device), timing).unwrap();

    let err = ctrl.axis(0).unwrap().move_to(1.0, false, 0.0, 0.0, 0.0).unwrap_err();
    match err {
        MotorError::Timeout { channel, waited } => {
            assert_eq!(channel, 0);
            assert!(waited >= Duration::from_millis(30));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    let calls = device.calls();
    assert_eq!(calls.last(), Some(&Call::SetMoveEnabled(0, false)));
    assert!(device.count(&Call::TargetInRange(0)) > 1);
}

#[test]
fn stop_cancels_waiting_move() {
    let device = MockDevice::new();
    device.set_in_range(false);
    let mut timing = manual_timing();
    timing.move_timeout = Duration::from_secs(10);
    let ctrl = Controller::new("AMC1", "h", 2, &MockConnector::new(&device), timing).unwrap();

    let result = thread::scope(|s| {
        let mover = s.spawn(|| ctrl.axis(1).unwrap().move_to(4.0, false, 0.0, 0.0, 0.0));
        while device.count(&Call::TargetInRange(1)) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        ctrl.axis(1).unwrap().stop(0.0).unwrap();
        mover.join().unwrap()
    });

    assert!(matches!(result, Err(MotorError::Cancelled { channel: 1 })));
}

#[test]
fn shutdown_cancels_waiting_move() {
    let device = MockDevice::new();
    device.set_in_range(false);
    let mut timing = manual_timing();
    timing.move_timeout = Duration::from_secs(10);
    let ctrl = Controller::new("AMC1", "h", 1, &MockConnector::new(&device), timing).unwrap();
    let axis = ctrl.axis(0).unwrap();

    let result = thread::scope(|s| {
        let mover = s.spawn(|| axis.move_to(4.0, false, 0.0, 0.0, 0.0));
        while device.count(&Call::TargetInRange(0)) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        ctrl.shutdown();
        mover.join().unwrap()
    });

    assert!(matches!(result, Err(MotorError::Cancelled { channel: 0 })));
    assert!(ctrl.axis(0).is_none());

    let calls = device.calls();
    let cleared = last_index(&calls, |c| *c == Call::SetMoveEnabled(0, false)).expect("move cleared");
    let output_off = last_index(&calls, |c| *c == Call::SetOutputEnabled(0, false)).expect("output off");
    let disconnect = last_index(&calls, |c| *c == Call::Disconnect).expect("disconnected");
    assert!(cleared < output_off);
    assert!(output_off < disconnect);
    assert_eq!(device.count(&Call::SetMoveEnabled(0, false)), 1);
}

#[test]
fn stop_always_succeeds_and_disables_move() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);
    device.fail("set_move_enabled");

    assert!(ctrl.axis(0).unwrap().stop(3.0).is_ok());
    assert_eq!(device.calls().last(), Some(&Call::SetMoveEnabled(0, false)));

    let disconnected =
        Controller::new("AMC2", "h", 1, &MockConnector::refusing(), manual_timing()).unwrap();
    assert!(disconnected.axis(0).unwrap().stop(0.0).is_ok());
}

#[test]
fn home_triggers_reference_search_and_returns() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);

    ctrl.axis(1).unwrap().home(0.0, 0.0, 0.0, true).unwrap();
    assert_eq!(device.count(&Call::StartReferenceSearch(1)), 1);

    device.fail("start_reference_search");
    assert!(ctrl.axis(1).unwrap().home(0.0, 0.0, 0.0, false).is_ok());
}

#[test]
fn poll_is_idempotent() {
    let device = MockDevice::new();
    device.set_position(0, 1.25);
    let ctrl = controller(&device, 1);
    let ids = ctrl.params().clone();
    let axis = ctrl.axis(0).unwrap();

    let read = || {
        ctrl.with_params(|p| {
            (
                p.get_double(ParamScope::Axis(0), ids.position),
                p.get_integer(ParamScope::Axis(0), ids.done),
            )
        })
    };

    let first_moving = axis.poll().unwrap();
    let first = read();
    let second_moving = axis.poll().unwrap();
    let second = read();

    assert!(!first_moving);
    assert_eq!(first_moving, second_moving);
    assert_eq!(first, (Some(1.25), Some(1)));
    assert_eq!(first, second);
}

#[test]
fn poll_surfaces_read_failure_as_problem_flag() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 1);
    let ids = ctrl.params().clone();
    device.fail("position");

    assert!(ctrl.axis(0).unwrap().poll().is_ok());
    ctrl.with_params(|p| {
        assert_eq!(p.get_integer(ParamScope::Axis(0), ids.problem), Some(1));
    });
}

#[test]
fn homed_flag_follows_reference_valid() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 1);
    let ids = ctrl.params().clone();

    ctrl.poll_now();
    ctrl.with_params(|p| assert_eq!(p.get_integer(ParamScope::Axis(0), ids.homed), Some(0)));

    device.state.lock().referenced = true;
    ctrl.poll_now();
    ctrl.with_params(|p| assert_eq!(p.get_integer(ParamScope::Axis(0), ids.homed), Some(1)));
}

#[test]
fn failed_connect_still_constructs() {
    let ctrl = Controller::new("AMC1", "10.0.0.9", 3, &MockConnector::refusing(), manual_timing())
        .expect("constructs without a device");

    assert!(!ctrl.is_connected());
    assert!(ctrl.identity().is_none());
    assert_eq!(ctrl.axis_count(), 3);

    let serial = ctrl.param_id("ATTOCUBE_SERIAL").unwrap();
    let ids = ctrl.params().clone();
    ctrl.with_params(|p| {
        assert_eq!(p.get_string(ParamScope::Controller, serial), None);
        assert_eq!(p.get_integer(ParamScope::Controller, ids.connected), Some(0));
    });

    for i in 0..3 {
        assert_eq!(ctrl.axis(i).unwrap().poll().unwrap(), false);
    }
    ctrl.poll_now();
    ctrl.with_params(|p| assert_eq!(p.get_integer(ParamScope::Axis(2), ids.problem), Some(1)));
}

#[test]
fn write_to_unknown_axis_is_rejected_without_mutation() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);
    let ids = ctrl.params().clone();
    device.clear_calls();

    for addr in [2, 7, -1] {
        let err = ctrl
            .write_integer(AxisLocator::new(addr), ids.closed_loop, 0)
            .unwrap_err();
        assert!(matches!(err, MotorError::InvalidAxis(a) if a == addr));
    }

    assert!(device.calls().is_empty());
    ctrl.with_params(|p| {
        for scope in [ParamScope::Axis(0), ParamScope::Axis(1), ParamScope::Axis(2)] {
            assert_eq!(p.get(scope, ids.closed_loop), None);
        }
    });
}

#[test]
fn closed_loop_write_switches_output_and_notifies() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);
    let ids = ctrl.params().clone();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ctrl.add_param_listener(Box::new(move |scope, updates| {
        for update in updates {
            sink.lock().push((scope, update.name.clone(), update.value.clone()));
        }
    }));
    device.clear_calls();

    ctrl.write_integer(AxisLocator::new(1), ids.closed_loop, 0).unwrap();

    assert_eq!(device.calls(), vec![Call::SetOutputEnabled(1, false)]);
    ctrl.with_params(|p| assert_eq!(p.get_integer(ParamScope::Axis(1), ids.closed_loop), Some(0)));
    assert!(seen.lock().contains(&(
        ParamScope::Axis(1),
        "MOTOR_CLOSED_LOOP".to_string(),
        ParamValue::Integer(0)
    )));
}

#[test]
fn write_failure_is_logged_not_raised() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 1);
    let ids = ctrl.params().clone();
    device.fail("set_output_enabled");

    assert!(ctrl.write_integer(AxisLocator::new(0), ids.closed_loop, 1).is_ok());
}

#[test]
fn generic_write_updates_cache_only() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 1);
    let ids = ctrl.params().clone();
    device.clear_calls();

    ctrl.write_integer(AxisLocator::new(0), ids.done, 0).unwrap();
    assert!(device.calls().is_empty());
    ctrl.with_params(|p| assert_eq!(p.get_integer(ParamScope::Axis(0), ids.done), Some(0)));

    let before = ctrl.with_params(|p| p.get(ParamScope::Axis(0), ids.position).cloned());
    let err = ctrl.write_integer(AxisLocator::new(0), ids.position, 3).unwrap_err();
    assert!(matches!(err, MotorError::Param(_)));
    assert!(device.calls().is_empty());
    let after = ctrl.with_params(|p| p.get(ParamScope::Axis(0), ids.position).cloned());
    assert_eq!(before, after);
    assert_eq!(ctrl.param_id(MOTOR_POSITION), Some(ids.position));
}

#[test]
fn poll_loop_publishes_in_background() {
    let device = MockDevice::new();
    device.set_position(0, 2.0);
    let ctrl = Controller::new("AMC1", "h", 1, &MockConnector::new(&device), fast_timing()).unwrap();
    let ids = ctrl.params().clone();

    let deadline = Instant::now() + Duration::from_secs(5);
    while ctrl.poll_cycles() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(ctrl.poll_cycles() >= 2);
    ctrl.with_params(|p| assert_eq!(p.get_double(ParamScope::Axis(0), ids.position), Some(2.0)));
}

#[test]
fn shutdown_stops_polling_before_teardown() {
    let device = MockDevice::new();
    let ctrl = Controller::new("AMC1", "h", 3, &MockConnector::new(&device), fast_timing()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while device.count(&Call::Position(2)) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    ctrl.shutdown();

    let calls = device.calls();
    let tail = calls.len() - 7;
    assert_eq!(
        &calls[tail..],
        &[
            Call::OutputEnabled(0),
            Call::SetOutputEnabled(0, false),
            Call::OutputEnabled(1),
            Call::SetOutputEnabled(1, false),
            Call::OutputEnabled(2),
            Call::SetOutputEnabled(2, false),
            Call::Disconnect,
        ]
    );
    let last_poll = last_index(&calls, |c| matches!(c, Call::Position(_))).expect("polled");
    let first_disable =
        first_index(&calls, |c| matches!(c, Call::SetOutputEnabled(_, false))).expect("disabled");
    assert!(last_poll < tail);
    assert_eq!(first_disable, tail + 1);

    let settled = device.calls().len();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(device.calls().len(), settled);
    assert!(!ctrl.is_connected());
}

#[test]
fn teardown_skips_disable_when_output_already_off() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);
    let ids = ctrl.params().clone();
    ctrl.write_integer(AxisLocator::new(1), ids.closed_loop, 0).unwrap();
    device.clear_calls();

    ctrl.shutdown();

    assert_eq!(
        device.calls(),
        vec![
            Call::OutputEnabled(0),
            Call::SetOutputEnabled(0, false),
            Call::OutputEnabled(1),
            Call::Disconnect,
        ]
    );
}

#[test]
fn disconnect_failure_is_not_fatal() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 1);
    device.fail("disconnect");

    ctrl.shutdown();
    ctrl.shutdown();
    assert!(!ctrl.is_connected());
    assert_eq!(device.count(&Call::Disconnect), 1);
}

#[test]
fn drop_tears_down() {
    let device = MockDevice::new();
    drop(controller(&device, 1));
    assert_eq!(device.calls().last(), Some(&Call::Disconnect));
}

#[test]
fn axis_count_out_of_range_is_rejected() {
    let device = MockDevice::new();
    for count in [0, 4] {
        let result = Controller::new("AMC1", "h", count, &MockConnector::new(&device), manual_timing());
        assert!(matches!(result, Err(MotorError::Config(_))));
    }
    assert!(device.calls().is_empty());
}

#[test]
fn zero_timing_is_rejected() {
    let device = MockDevice::new();
    let zeroed = [
        ControllerTiming {
            poll_interval: Duration::ZERO,
            ..manual_timing()
        },
        ControllerTiming {
            move_check_interval: Duration::ZERO,
            ..manual_timing()
        },
        ControllerTiming {
            move_timeout: Duration::ZERO,
            ..manual_timing()
        },
    ];
    for timing in zeroed {
        let result = Controller::new("AMC1", "h", 1, &MockConnector::new(&device), timing);
        assert!(matches!(result, Err(MotorError::Config(_))));
    }
    assert!(device.calls().is_empty());
}

#[test]
fn report_levels() {
    let device = MockDevice::new();
    let ctrl = controller(&device, 2);

    let render = |level| {
        let mut out = Vec::new();
        ctrl.report(&mut out, level);
        String::from_utf8(out).unwrap()
    };

    let brief = render(0);
    assert!(brief.contains("AMC1"));
    assert!(brief.contains("L01-0042"));
    assert!(!brief.contains("axis 1:"));

    let detailed = render(1);
    assert!(detailed.contains("axis 0:"));
    assert!(detailed.contains("axis 1:"));

    let full = render(2);
    assert!(full.contains("\"poll_cycles\""));

    let mut axis_out = Vec::new();
    ctrl.axis(1).unwrap().report(&mut axis_out, 1);
    assert!(String::from_utf8(axis_out).unwrap().contains("power_on=true"));
}
