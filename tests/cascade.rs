// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

mod fixtures;

use approx::assert_relative_eq;
use core::num::NonZeroU32;
use rt_pid::cascade::CascadeController;
use rt_pid::pid::{PidConfig, PidConfigBuilder, PidController};
use rt_pid::time::Millis;

use fixtures::test_pid::DT;

fn position_config() -> PidConfig<f64> {
    PidConfigBuilder::default()
        .kp(2.0)
        .output_limits(-50.0, 50.0)
        .build()
        .unwrap()
}

fn velocity_config() -> PidConfig<f64> {
    PidConfigBuilder::default()
        .kp(5.0)
        .ki(2.0)
        .output_limits(-100.0, 100.0)
        .build()
        .unwrap()
}

#[test]
fn test_outer_output_drives_inner_setpoint() {
    let outer = position_config();
    let inner = velocity_config();
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&outer).unwrap(),
        PidController::new(&inner).unwrap(),
    );

    let force = cascade.update(5.0, 0.0, 0.0, DT);

    // Outer: 2 * 5 = 10 velocity demand. Inner: 5 * 10 + 2 * 10 * dt
    assert_eq!(cascade.outer().output(), 10.0);
    assert_eq!(cascade.inner().internal_setpoint(), 10.0);
    assert_relative_eq!(force, 50.0 + 20.0 * DT, epsilon = 1e-12);
    assert_eq!(cascade.output(), force);
}

#[test]
fn test_outer_decimation_accumulates_interval() {
    let outer = PidConfigBuilder::default()
        .kp(0.0)
        .ki(1.0)
        .output_limits(-100.0, 100.0)
        .build()
        .unwrap();
    let inner = velocity_config();
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&outer).unwrap(),
        PidController::new(&inner).unwrap(),
    )
    .with_outer_divider(NonZeroU32::new(4).unwrap());

    cascade.update(1.0, 0.0, 0.0, DT);
    assert_relative_eq!(cascade.outer().integral(), DT, epsilon = 1e-12);
    let held = cascade.outer().output();

    for _ in 0..3 {
        cascade.update(1.0, 0.0, 0.0, DT);
        assert_eq!(cascade.outer().output(), held);
        assert_eq!(cascade.inner().internal_setpoint(), held);
    }

    // The fifth tick runs the outer loop over the four intervals since its last run
    cascade.update(1.0, 0.0, 0.0, DT);
    assert_relative_eq!(cascade.outer().integral(), 5.0 * DT, epsilon = 1e-12);
}

#[test]
fn test_invalid_interval_holds_both_loops() {
    let outer = position_config();
    let inner = velocity_config();
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&outer).unwrap(),
        PidController::new(&inner).unwrap(),
    );

    let expected = cascade.update(10.0, 0.0, 0.0, DT);
    let before = (*cascade.outer().context(), *cascade.inner().context());

    for dt in [0.0, -DT, f64::NAN] {
        assert_eq!(cascade.update(10.0, 0.0, 0.0, dt), expected);
    }
    assert_eq!(
        (*cascade.outer().context(), *cascade.inner().context()),
        before
    );
}

#[test]
fn test_manual_tracking_is_bumpless_on_both_levels() {
    let outer = position_config();
    let inner = velocity_config();
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&outer).unwrap(),
        PidController::new(&inner).unwrap(),
    );

    // Operator holds 30 units of force while the axis creeps at 10 units/s past position 40
    for _ in 0..10 {
        assert!(cascade.track_manual(30.0, 40.0, 10.0).is_ok());
    }
    assert_eq!(cascade.outer().output(), 10.0);
    assert_eq!(cascade.inner().output(), 30.0);

    let force = cascade.update(40.0, 40.0, 10.0, DT);
    assert_relative_eq!(force, 30.0, epsilon = 1e-12);

    assert!(cascade.track_manual(f64::NAN, 40.0, 10.0).is_err());
}

#[test]
fn test_reset_clears_both_loops() {
    let outer = position_config();
    let inner = velocity_config();
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&outer).unwrap(),
        PidController::new(&inner).unwrap(),
    )
    .with_outer_divider(NonZeroU32::new(3).unwrap());

    for _ in 0..5 {
        cascade.update(10.0, 1.0, 0.5, DT);
    }
    cascade.reset();

    assert!(!cascade.outer().is_initialized());
    assert!(!cascade.inner().is_initialized());
    assert_eq!(cascade.output(), 0.0);

    // Decimation restarts in phase: the next tick runs the outer loop
    cascade.update(10.0, 0.0, 0.0, DT);
    assert_eq!(cascade.outer().output(), 20.0);
}
