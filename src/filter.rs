// Second-order (biquad) and first-order low-pass filters for signal conditioning
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

use num_traits::{Float, FloatConst};

/// Errors from filter design functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum FilterError {
    /// Sample rate is not a positive finite number
    #[cfg_attr(feature = "std", error("Sample rate must be positive and finite"))]
    InvalidSampleRate,

    /// Cutoff or center frequency is not in the open interval `(0, sample_rate / 2)`
    #[cfg_attr(
        feature = "std",
        error("Filter frequency must lie strictly between zero and the Nyquist frequency")
    )]
    InvalidFrequency,

    /// Quality factor is not a positive finite number
    #[cfg_attr(feature = "std", error("Quality factor must be positive and finite"))]
    InvalidQualityFactor,

    /// Notch bandwidth is not a positive finite number
    #[cfg_attr(feature = "std", error("Notch bandwidth must be positive and finite"))]
    InvalidBandwidth,
}

/// Design parameters for a [`Biquad`] filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterConfig<F> {
    /// Second-order (PT2) low-pass. A `q` of `1/√2` gives a Butterworth response.
    LowPass {
        /// Samples per second
        sample_rate: F,
        /// Corner frequency in Hz
        cutoff: F,
        /// Quality factor
        q: F,
    },
    /// Second-order band-reject filter removing a narrow band around `center`.
    Notch {
        /// Samples per second
        sample_rate: F,
        /// Rejected frequency in Hz
        center: F,
        /// Width of the stop band in Hz
        bandwidth: F,
    },
}

/// Normalized biquad coefficients.
///
/// Transfer function:
/// ```text
/// H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients<F> {
    b0: F,
    b1: F,
    b2: F,
    a1: F,
    a2: F,
}

impl<F: Float> BiquadCoefficients<F> {
    /// Creates coefficients from numerator `b` and denominator `a`, normalizing by `a[0]`.
    pub fn new(b: [F; 3], a: [F; 3]) -> Self {
        let a0 = a[0];
        Self {
            b0: b[0] / a0,
            b1: b[1] / a0,
            b2: b[2] / a0,
            a1: a[1] / a0,
            a2: a[2] / a0,
        }
    }

    /// Identity filter: output equals input.
    pub fn passthrough() -> Self {
        Self {
            b0: F::one(),
            b1: F::zero(),
            b2: F::zero(),
            a1: F::zero(),
            a2: F::zero(),
        }
    }

    /// Returns the `(b, a)` coefficient arrays with `a[0] == 1`.
    pub fn coefficients(&self) -> ([F; 3], [F; 3]) {
        (
            [self.b0, self.b1, self.b2],
            [F::one(), self.a1, self.a2],
        )
    }

    /// True if every coefficient is finite and both poles lie strictly inside the unit circle.
    pub fn is_valid(&self) -> bool {
        let finite = [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite());
        finite && self.a2.abs() < F::one() && self.a1.abs() < F::one() + self.a2
    }

    /// Steady-state gain for a constant input.
    pub fn dc_gain(&self) -> F {
        (self.b0 + self.b1 + self.b2) / (F::one() + self.a1 + self.a2)
    }
}

impl<F: Float + FloatConst> BiquadCoefficients<F> {
    /// Computes coefficients for the given design.
    pub fn from_config(config: FilterConfig<F>) -> Result<Self, FilterError> {
        match config {
            FilterConfig::LowPass {
                sample_rate,
                cutoff,
                q,
            } => Self::low_pass(sample_rate, cutoff, q),
            FilterConfig::Notch {
                sample_rate,
                center,
                bandwidth,
            } => Self::notch(sample_rate, center, bandwidth),
        }
    }

    /// Second-order low-pass, bilinear transform of `ω₀² / (s² + s·ω₀/Q + ω₀²)`.
    pub fn low_pass(sample_rate: F, cutoff: F, q: F) -> Result<Self, FilterError> {
        check_frequency(sample_rate, cutoff)?;
        if !(q.is_finite() && q > F::zero()) {
            return Err(FilterError::InvalidQualityFactor);
        }

        let (cos_w0, alpha) = prewarp(sample_rate, cutoff, q);
        let one = F::one();
        let two = one + one;
        let b0 = (one - cos_w0) / two;
        Ok(Self::new(
            [b0, one - cos_w0, b0],
            [one + alpha, -two * cos_w0, one - alpha],
        ))
    }

    /// Second-order notch centered on `center` with a -3 dB width of `bandwidth`, both in Hz.
    pub fn notch(sample_rate: F, center: F, bandwidth: F) -> Result<Self, FilterError> {
        check_frequency(sample_rate, center)?;
        if !(bandwidth.is_finite() && bandwidth > F::zero()) {
            return Err(FilterError::InvalidBandwidth);
        }

        let (cos_w0, alpha) = prewarp(sample_rate, center, center / bandwidth);
        let one = F::one();
        let two = one + one;
        Ok(Self::new(
            [one, -two * cos_w0, one],
            [one + alpha, -two * cos_w0, one - alpha],
        ))
    }
}

fn check_frequency<F: Float>(sample_rate: F, frequency: F) -> Result<(), FilterError> {
    if !(sample_rate.is_finite() && sample_rate > F::zero()) {
        return Err(FilterError::InvalidSampleRate);
    }
    let nyquist = sample_rate / (F::one() + F::one());
    if !(frequency.is_finite() && frequency > F::zero() && frequency < nyquist) {
        return Err(FilterError::InvalidFrequency);
    }
    Ok(())
}

fn prewarp<F: Float + FloatConst>(sample_rate: F, frequency: F, q: F) -> (F, F) {
    let two = F::one() + F::one();
    let w0 = two * F::PI() * frequency / sample_rate;
    (w0.cos(), w0.sin() / (two * q))
}

/// Delay taps of a Direct Form I biquad.
///
/// Kept separate from [`BiquadCoefficients`] so that a coefficient set living in a shared,
/// read-only configuration can drive many independent filter states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadState<F> {
    x1: F,
    x2: F,
    y1: F,
    y2: F,
}

impl<F: Float> Default for BiquadState<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> BiquadState<F> {
    /// All taps zero.
    pub fn new() -> Self {
        Self {
            x1: F::zero(),
            x2: F::zero(),
            y1: F::zero(),
            y2: F::zero(),
        }
    }

    /// Filters one sample.
    ///
    /// If the result is not finite the taps are cleared and the input is passed through, so a
    /// single corrupt sample cannot latch the filter at NaN.
    #[inline]
    pub fn step(&mut self, coeffs: &BiquadCoefficients<F>, x: F) -> F {
        let c = coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        if !y.is_finite() {
            self.reset();
            return x;
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    /// Loads the taps with the steady state for a constant input `x`, so the first samples do
    /// not ring up from zero.
    pub fn prime(&mut self, coeffs: &BiquadCoefficients<F>, x: F) {
        let gain = coeffs.dc_gain();
        let y = if gain.is_finite() { gain * x } else { x };
        self.x1 = x;
        self.x2 = x;
        self.y1 = y;
        self.y2 = y;
    }

    /// Clears all taps.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// A self-contained biquad: coefficients plus their delay taps.
///
/// ```
/// use rt_pid::filter::{Biquad, FilterConfig};
///
/// let mut notch = Biquad::new(FilterConfig::Notch {
///     sample_rate: 1000.0,
///     center: 50.0,
///     bandwidth: 10.0,
/// })
/// .expect("valid notch design");
/// let y: f64 = notch.step(1.0);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad<F> {
    coeffs: BiquadCoefficients<F>,
    state: BiquadState<F>,
}

impl<F: Float + FloatConst> Biquad<F> {
    /// Designs the filter and returns it with cleared taps.
    pub fn new(config: FilterConfig<F>) -> Result<Self, FilterError> {
        BiquadCoefficients::from_config(config).map(Self::from_coefficients)
    }
}

impl<F: Float> Biquad<F> {
    /// Wraps an existing coefficient set.
    pub fn from_coefficients(coeffs: BiquadCoefficients<F>) -> Self {
        Self {
            coeffs,
            state: BiquadState::new(),
        }
    }

    /// Filters one sample.
    #[inline]
    pub fn step(&mut self, x: F) -> F {
        self.state.step(&self.coeffs, x)
    }

    /// See [`BiquadState::prime`].
    pub fn prime(&mut self, x: F) {
        self.state.prime(&self.coeffs, x);
    }

    /// Clears the delay taps, keeping the coefficients.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Filters a buffer in place.
    pub fn process_inplace(&mut self, data: &mut [F]) {
        for sample in data.iter_mut() {
            *sample = self.step(*sample);
        }
    }

    /// Returns the coefficient set.
    pub fn coefficients(&self) -> &BiquadCoefficients<F> {
        &self.coeffs
    }
}

/// Single-pole low-pass `y += α·(x - y)`.
///
/// The smoothing factor is supplied on every step, either fixed or derived from a time constant
/// with [`LowPass::alpha_from_time_constant`] so the cutoff frequency stays put when the sampling
/// interval jitters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPass<F> {
    value: F,
}

impl<F: Float> Default for LowPass<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> LowPass<F> {
    /// Starts at zero.
    pub fn new() -> Self {
        Self { value: F::zero() }
    }

    /// `α = dt / (τ + dt)`; `τ = 0` disables smoothing.
    #[inline]
    pub fn alpha_from_time_constant(time_constant: F, dt: F) -> F {
        dt / (time_constant + dt)
    }

    /// Moves the state a fraction `alpha` of the way towards `x` and returns it.
    #[inline]
    pub fn step(&mut self, x: F, alpha: F) -> F {
        self.value = self.value + alpha * (x - self.value);
        self.value
    }

    /// A zero time constant passes `x` through exactly.
    #[inline]
    pub fn step_with_time_constant(&mut self, x: F, time_constant: F, dt: F) -> F {
        if time_constant <= F::zero() {
            self.value = x;
            return x;
        }
        self.step(x, Self::alpha_from_time_constant(time_constant, dt))
    }

    /// Jumps straight to `x`.
    pub fn prime(&mut self, x: F) {
        self.value = x;
    }

    /// Returns the current filter state.
    pub fn value(&self) -> F {
        self.value
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        self.value = F::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;

    const FS: f64 = 1000.0;

    fn sine(freq: f64, i: usize) -> f64 {
        (2.0 * PI * freq * i as f64 / FS).sin()
    }

    fn peak_after_settling(filter: &mut Biquad<f64>, freq: f64) -> f64 {
        let mut peak: f64 = 0.0;
        for i in 0..2000 {
            let y = filter.step(sine(freq, i));
            if i >= 1000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut bq = Biquad::from_coefficients(BiquadCoefficients::<f64>::passthrough());
        for x in [0.0, 1.5, -3.0, 42.0] {
            assert_eq!(bq.step(x), x);
        }
    }

    #[test]
    fn test_coefficients_are_normalized() {
        let c = BiquadCoefficients::new([2.0, 4.0, 2.0], [2.0, -1.0, 0.2]);
        let (b, a) = c.coefficients();
        assert_eq!(a, [1.0, -0.5, 0.1]);
        assert_eq!(b, [1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_low_pass_unity_dc_gain_and_attenuation() {
        let coeffs = BiquadCoefficients::low_pass(FS, 10.0, core::f64::consts::FRAC_1_SQRT_2)
            .expect("valid design");
        assert!(coeffs.is_valid());
        assert_abs_diff_eq!(coeffs.dc_gain(), 1.0, epsilon = 1e-9);

        let mut step = Biquad::from_coefficients(coeffs);
        let settled = (0..500).fold(0.0, |_, _| step.step(1.0));
        assert_abs_diff_eq!(settled, 1.0, epsilon = 1e-3);

        let mut lpf = Biquad::from_coefficients(coeffs);
        assert!(peak_after_settling(&mut lpf, 200.0) < 0.02);
    }

    #[test]
    fn test_notch_rejects_center_and_passes_elsewhere() {
        let config = FilterConfig::Notch {
            sample_rate: FS,
            center: 50.0,
            bandwidth: 10.0,
        };
        let mut at_center = Biquad::new(config).expect("valid design");
        assert!(peak_after_settling(&mut at_center, 50.0) < 0.05);

        let mut off_center = Biquad::new(config).expect("valid design");
        assert!(peak_after_settling(&mut off_center, 5.0) > 0.9);
    }

    #[test]
    fn test_invalid_designs_are_rejected() {
        assert_eq!(
            BiquadCoefficients::low_pass(0.0, 10.0, 0.7),
            Err(FilterError::InvalidSampleRate)
        );
        assert_eq!(
            BiquadCoefficients::low_pass(FS, 500.0, 0.7),
            Err(FilterError::InvalidFrequency)
        );
        assert_eq!(
            BiquadCoefficients::low_pass(FS, f64::NAN, 0.7),
            Err(FilterError::InvalidFrequency)
        );
        assert_eq!(
            BiquadCoefficients::low_pass(FS, 10.0, 0.0),
            Err(FilterError::InvalidQualityFactor)
        );
        assert_eq!(
            BiquadCoefficients::notch(FS, 50.0, -1.0),
            Err(FilterError::InvalidBandwidth)
        );
    }

    #[test]
    fn test_non_finite_output_resets_taps() {
        let mut bq = Biquad::from_coefficients(
            BiquadCoefficients::low_pass(FS, 10.0, 0.7).expect("valid design"),
        );
        bq.step(1.0);
        assert_eq!(bq.step(f64::INFINITY), f64::INFINITY);
        // Taps were cleared, so the filter restarts from rest
        let mut fresh = Biquad::from_coefficients(*bq.coefficients());
        assert_eq!(bq.step(1.0), fresh.step(1.0));
    }

    #[test]
    fn test_primed_filter_has_no_startup_transient() {
        let mut bq = Biquad::new(FilterConfig::LowPass {
            sample_rate: FS,
            cutoff: 5.0,
            q: 0.7,
        })
        .expect("valid design");
        bq.prime(20.0);
        for _ in 0..10 {
            assert_abs_diff_eq!(bq.step(20.0), 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_time_constant_keeps_cutoff_across_sample_rates() {
        const TAU: f64 = 0.1;
        let respond = |dt: f64| {
            let mut lpf = LowPass::new();
            let n = (TAU / dt).round() as usize;
            (0..n).fold(0.0, |_, _| lpf.step_with_time_constant(1.0, TAU, dt))
        };
        // Both land near 1 - 1/e after one time constant
        assert_abs_diff_eq!(respond(0.01), respond(0.001), epsilon = 0.03);

        // A fixed alpha tuned for 10 ms converges far too fast when sampled at 1 ms
        let alpha = LowPass::alpha_from_time_constant(TAU, 0.01);
        let mut fixed = LowPass::new();
        let fixed_response = (0..100).fold(0.0, |_, _| fixed.step(1.0, alpha));
        assert!(fixed_response - respond(0.001) > 0.3);
    }

    #[test]
    fn test_zero_time_constant_passes_through() {
        let mut lpf = LowPass::new();
        lpf.prime(1e12);
        assert_eq!(lpf.step_with_time_constant(0.1, 0.0, 0.01), 0.1);
        assert_eq!(lpf.value(), 0.1);
    }
}
