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

//! Records a position/velocity cascade driving a mass to a target, with a stretch of manual
//! operation in the middle, as a comma-delimited stream on stdout.
//!
//! ```sh
//! cargo run --example cascade_record --features simulation > cascade.csv
//! ```

use core::num::NonZeroU32;

use nalgebra as na;
use rt_pid::cascade::CascadeController;
use rt_pid::pid::{DerivativeFilter, PidConfigBuilder, PidConfigError, PidController};
use rt_pid::sim;
use rt_pid::time::Millis;

const DT: f64 = 0.001;
const STEPS: usize = 8_000;
const MANUAL_WINDOW: core::ops::Range<usize> = 3_000..4_000;
const MANUAL_FORCE: f64 = -20.0;

fn main() -> Result<(), PidConfigError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let position = PidConfigBuilder::default()
        .kp(2.0)
        .output_limits(-50.0, 50.0)
        .max_setpoint_ramp(40.0)
        .build()?;
    let velocity = PidConfigBuilder::default()
        .kp(5.0)
        .ki(2.0)
        .kd(0.05)
        .derivative_filter(DerivativeFilter::TimeConstant(0.01))
        .use_derivative_on_measurement(true)
        .output_limits(-100.0, 100.0)
        .max_rate(2_000.0)
        .build()?;

    // The velocity loop runs at 1 kHz, the position loop at 250 Hz
    let mut cascade = CascadeController::new(
        PidController::<Millis, f64>::new(&position)?,
        PidController::new(&velocity)?,
    )
    .with_outer_divider(NonZeroU32::new(4).unwrap_or(NonZeroU32::MIN));

    let plant = sim::DoubleIntegrator {
        mass: 1.0,
        friction: 0.1,
    };
    let mut state = na::Vector2::zeros();

    println!(
        "time,mode,setpoint,position,velocity,force,\
         outer_integral,outer_setpoint,inner_integral,inner_setpoint,inner_d_filtered"
    );
    for i in 0..STEPS {
        let setpoint = if i < STEPS / 2 { 100.0 } else { 20.0 };
        let (pos, vel) = (plant.position(state), plant.velocity(state));

        let (mode, force) = if MANUAL_WINDOW.contains(&i) {
            if let Err(err) = cascade.track_manual(MANUAL_FORCE, pos, vel) {
                tracing::warn!(?err, "manual tracking rejected");
            }
            ("manual", MANUAL_FORCE)
        } else {
            ("auto", cascade.update(setpoint, pos, vel, DT))
        };

        let outer = cascade.outer().snapshot();
        let inner = cascade.inner().snapshot();
        println!(
            "{:.3},{mode},{setpoint},{pos:.6},{vel:.6},{force:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            i as f64 * DT,
            outer.integral,
            outer.internal_setpoint,
            inner.integral,
            inner.internal_setpoint,
            inner.d_filtered,
        );

        state = plant.step(state, force, DT);
    }
    tracing::info!(
        position = plant.position(state),
        "recording finished"
    );
    Ok(())
}
