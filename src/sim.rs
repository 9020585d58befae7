// Plant models and signal sources for closed-loop testing of the controller
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

use crate::time::InstantLike;
use nalgebra as na;

pub enum WaveForm {
    Sine,
    Square,
    /// Unit-slope ramp
    Ramp,
    /// Deterministic pseudo-random samples in (-1, 1), a function of time only
    Noise,
}

fn hash_noise(t: f64) -> f64 {
    ((t * 12.9898).sin() * 43_758.545_3).fract()
}

pub struct SignalGenerator<I: InstantLike> {
    fcn: fn(f64) -> f64,
    initial_time: I,
    amplitude: f64,
    offset: f64,
}

impl<I: InstantLike> SignalGenerator<I> {
    pub fn new(waveform: WaveForm, initial_time: I, amplitude: f64, offset: f64) -> Self {
        Self {
            fcn: match waveform {
                WaveForm::Sine => f64::sin,
                WaveForm::Square => |x| x.sin().signum(),
                WaveForm::Ramp => |x| x,
                WaveForm::Noise => hash_noise,
            },
            initial_time,
            amplitude,
            offset,
        }
    }

    pub fn generate(&self, time: I) -> f64 {
        self.amplitude * (self.fcn)(time.duration_since(self.initial_time).as_secs_f64())
            + self.offset
    }
}

/// Advances `x' = f(x)` by one classical fourth-order Runge-Kutta step of length `h`.
pub fn rk4_step<const N: usize>(
    f: impl Fn(&na::SVector<f64, N>) -> na::SVector<f64, N>,
    x: na::SVector<f64, N>,
    h: f64,
) -> na::SVector<f64, N> {
    let k1 = f(&x);
    let k2 = f(&(x + k1 * (h / 2.0)));
    let k3 = f(&(x + k2 * (h / 2.0)));
    let k4 = f(&(x + k3 * h));
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// First-order lag `T y' + y = K u`, e.g. a heater or a motor's current loop.
pub struct FirstOrderPlant {
    pub gain: f64,
    pub time_constant: f64,
}

impl FirstOrderPlant {
    pub fn f(&self, x: na::Vector1<f64>, u: f64) -> na::Vector1<f64> {
        (na::Vector1::new(self.gain * u) - x) / self.time_constant
    }

    pub fn h(&self, x: na::Vector1<f64>) -> f64 {
        x[0]
    }

    pub fn step(&self, x: na::Vector1<f64>, u: f64, dt: f64) -> na::Vector1<f64> {
        rk4_step(|x| self.f(*x, u), x, dt)
    }
}

pub struct MassSpringDamper {
    pub natural_frequency: f64,
    pub damping_ratio: f64,
}

impl MassSpringDamper {
    /// Implements the state-space realization of the mass-spring-damper system:
    /// ┌     ┐   ┌              ┐┌    ┐   ┌     ┐
    /// │ p'  │ = │  0     1     ││ p  │ + │ 0   │ u
    /// │ p'' │   │  -ωₙ²  -2ζωₙ ││ p' │   │ ωₙ² │
    /// └     ┘   └              ┘└    ┘   └     ┘
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let omega_sq = self.natural_frequency.powi(2);
        let two_zeta_omega = 2.0 * self.natural_frequency * self.damping_ratio;

        let mat_a = na::Matrix2::new(0.0, 1.0, -omega_sq, -two_zeta_omega);
        let mat_b = na::Vector2::new(0.0, omega_sq);

        mat_a * x + mat_b * u
    }

    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[0]
    }

    pub fn step(&self, x: na::Vector2<f64>, u: f64, dt: f64) -> na::Vector2<f64> {
        rk4_step(|x| self.f(*x, u), x, dt)
    }
}

/// A mass pushed by a force against viscous friction; the state is `[position, velocity]`.
pub struct DoubleIntegrator {
    pub mass: f64,
    pub friction: f64,
}

impl DoubleIntegrator {
    pub fn f(&self, x: na::Vector2<f64>, force: f64) -> na::Vector2<f64> {
        na::Vector2::new(x[1], (force - self.friction * x[1]) / self.mass)
    }

    pub fn position(&self, x: na::Vector2<f64>) -> f64 {
        x[0]
    }

    pub fn velocity(&self, x: na::Vector2<f64>) -> f64 {
        x[1]
    }

    pub fn step(&self, x: na::Vector2<f64>, force: f64, dt: f64) -> na::Vector2<f64> {
        rk4_step(|x| self.f(*x, force), x, dt)
    }
}
