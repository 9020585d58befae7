// Two-loop cascade composition of PID controllers
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

use core::num::NonZeroU32;

use num_traits::Float;

use crate::pid::{PidController, TickError};
use crate::time::InstantLike;

/// An outer and an inner controller chained so that the outer output becomes the inner setpoint.
///
/// A typical pairing is position (outer) over velocity (inner). The outer loop can be run at a
/// fraction of the inner rate with [`with_outer_divider`](CascadeController::with_outer_divider);
/// it then sees the sum of the skipped intervals as its `dt`. The two controllers are exclusively
/// owned by the cascade for its lifetime.
#[derive(Copy, Clone, Debug)]
pub struct CascadeController<'a, I, F> {
    outer: PidController<'a, I, F>,
    inner: PidController<'a, I, F>,
    outer_divider: NonZeroU32,
    phase: u32,
    outer_elapsed: F,
}

impl<'a, I: InstantLike, F: Float> CascadeController<'a, I, F> {
    /// Chains `outer` into `inner`, running both on every tick.
    pub fn new(outer: PidController<'a, I, F>, inner: PidController<'a, I, F>) -> Self {
        Self {
            outer,
            inner,
            outer_divider: NonZeroU32::MIN,
            phase: 0,
            outer_elapsed: F::zero(),
        }
    }

    /// Runs the outer loop only on every `divider`-th tick. The inner loop holds the last outer
    /// output as its setpoint in between.
    pub fn with_outer_divider(mut self, divider: NonZeroU32) -> Self {
        log_debug!(divider = divider.get(), "cascade outer loop decimated");
        self.outer_divider = divider;
        self.phase = 0;
        self.outer_elapsed = F::zero();
        self
    }

    /// The outer (slow) controller.
    pub fn outer(&self) -> &PidController<'a, I, F> {
        &self.outer
    }

    /// The inner (fast) controller.
    pub fn inner(&self) -> &PidController<'a, I, F> {
        &self.inner
    }

    /// Runs one cascade tick and returns the inner controller's output.
    ///
    /// # Arguments
    /// - `setpoint`: The outer setpoint, e.g. a target position.
    /// - `outer_measurement`: The outer process value, e.g. the measured position.
    /// - `inner_measurement`: The inner process value, e.g. the measured velocity.
    /// - `dt`: Seconds since the previous cascade tick.
    ///
    /// An invalid `dt` holds both loops and returns the previous inner output.
    pub fn update(&mut self, setpoint: F, outer_measurement: F, inner_measurement: F, dt: F) -> F {
        if !(dt.is_finite() && dt > F::zero()) {
            log_warn!(dt = ?dt.to_f64(), "rejected cascade tick, holding previous output");
            return self.inner.output();
        }

        self.outer_elapsed = self.outer_elapsed + dt;
        if self.phase == 0 {
            self.outer
                .update(setpoint, outer_measurement, self.outer_elapsed);
            self.outer_elapsed = F::zero();
        }
        self.phase = (self.phase + 1) % self.outer_divider.get();

        self.inner
            .update(self.outer.output(), inner_measurement, dt)
    }

    /// Keeps both loops consistent with a manually imposed actuator command.
    ///
    /// The outer loop is back-calculated to demand the present inner measurement, and the inner
    /// loop to reproduce `manual_output` against that demand, so that switching back to
    /// [`update`](Self::update) is bumpless on both levels.
    pub fn track_manual(
        &mut self,
        manual_output: F,
        outer_measurement: F,
        inner_measurement: F,
    ) -> Result<(), TickError> {
        self.outer.track_manual(inner_measurement, outer_measurement)?;
        self.inner.track_manual_setpoint(
            manual_output,
            inner_measurement,
            self.outer.output(),
        )?;
        self.phase = 0;
        self.outer_elapsed = F::zero();
        Ok(())
    }

    /// Resets both loops and the decimation phase.
    pub fn reset(&mut self) {
        self.outer.reset();
        self.inner.reset();
        self.phase = 0;
        self.outer_elapsed = F::zero();
    }

    /// Returns the last actuator command, i.e. the inner output.
    pub fn output(&self) -> F {
        self.inner.output()
    }
}
