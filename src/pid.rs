// Configuration, per-instance context and update engines of the PID controller
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

use num_traits::{clamp, Float};

use crate::filter::{BiquadCoefficients, BiquadState, LowPass};
use crate::time::InstantLike;

/// Errors reported when a configuration parameter is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum PidConfigError {
    /// kp is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("Proportional gain must be non-negative and finite")
    )]
    InvalidProportionalGain,

    /// ki is negative or not finite
    #[cfg_attr(feature = "std", error("Integral gain must be non-negative and finite"))]
    InvalidIntegralGain,

    /// kd is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("Derivative gain must be non-negative and finite")
    )]
    InvalidDerivativeGain,

    /// kf is not finite
    #[cfg_attr(feature = "std", error("Feed-forward gain must be finite"))]
    InvalidFeedForwardGain,

    /// Limits are not finite or not strictly ordered
    #[cfg_attr(
        feature = "std",
        error("Output limits must be finite with output_min < output_max")
    )]
    InvalidOutputLimits,

    /// Deadband is negative or not finite
    #[cfg_attr(feature = "std", error("Deadband must be non-negative and finite"))]
    InvalidDeadband,

    /// Output rate limit is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("Maximum output rate must be non-negative and finite")
    )]
    InvalidMaxRate,

    /// Setpoint ramp limit is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("Maximum setpoint ramp must be non-negative and finite")
    )]
    InvalidSetpointRamp,

    /// Back-calculation tracking gain is not positive or not finite
    #[cfg_attr(
        feature = "std",
        error("Anti-windup tracking gain must be positive and finite")
    )]
    InvalidTrackingGain,

    /// Fixed smoothing factor outside `(0, 1]`
    #[cfg_attr(feature = "std", error("Filter alpha must lie in (0, 1]"))]
    InvalidFilterAlpha,

    /// A filter time constant is negative or not finite
    #[cfg_attr(
        feature = "std",
        error("Filter time constant must be non-negative and finite")
    )]
    InvalidFilterTimeConstant,

    /// Biquad coefficients are not finite or describe an unstable filter
    #[cfg_attr(
        feature = "std",
        error("Biquad coefficients must be finite and describe a stable filter")
    )]
    InvalidFilterCoefficients,

    /// Proportional setpoint weight outside `[0, 1]`
    #[cfg_attr(feature = "std", error("Setpoint weight must lie in [0, 1]"))]
    InvalidSetpointWeight,
}

/// Reasons a tick is rejected. A rejected tick leaves the context untouched and the previous
/// output is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum TickError {
    /// The interval is zero, negative or not finite
    #[cfg_attr(feature = "std", error("Tick interval must be positive and finite"))]
    InvalidInterval,

    /// The setpoint, measurement or manual output is NaN or infinite
    #[cfg_attr(feature = "std", error("Controller inputs must be finite"))]
    NonFiniteInput,

    /// The control law overflowed
    #[cfg_attr(feature = "std", error("Controller output is not finite"))]
    NonFiniteOutput,
}

/// Strategy keeping the integral term from winding up while the output is saturated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AntiWindup<F> {
    /// Skip this tick's integration when the output is saturated and the error would push it
    /// further into saturation.
    ConditionalIntegration,

    /// Bleed the integral by `tracking_gain * (output - unclamped) * dt` every tick. The
    /// per-tick correction factor `tracking_gain * dt` is capped at 1. The gain must be positive.
    BackCalculation {
        /// Correction rate `kw` in 1/s
        tracking_gain: F,
    },

    /// Clamp the integral state itself to the output limits.
    IntegralClamp,

    /// Clamp the integral to the headroom left between the limits and `P + D + F`.
    DynamicClamp,
}

impl<F> Default for AntiWindup<F> {
    fn default() -> Self {
        AntiWindup::ConditionalIntegration
    }
}

/// Smoothing applied to the raw derivative before it is scaled by `kd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivativeFilter<F> {
    /// Single pole with time constant `tau` (seconds); `alpha = dt / (tau + dt)` is recomputed
    /// from every tick's interval so the cutoff does not drift with the sampling rate.
    /// `tau = 0` passes the raw derivative through.
    TimeConstant(F),

    /// Single pole with a fixed smoothing factor in `(0, 1]`. Its cutoff scales with the
    /// sampling rate.
    FixedAlpha(F),

    /// Second-order section, e.g. [`BiquadCoefficients::low_pass`] or a notch.
    Biquad(BiquadCoefficients<F>),
}

impl<F: Float> Default for DerivativeFilter<F> {
    fn default() -> Self {
        DerivativeFilter::TimeConstant(F::zero())
    }
}

/// Optional conditioning of the measurement before it enters the control law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFilter<F> {
    /// Measurement used as is.
    Off,
    /// Single pole with time constant `tau` (seconds), primed with the first sample.
    TimeConstant(F),
    /// Second-order section primed to steady state with the first sample.
    Biquad(BiquadCoefficients<F>),
}

impl<F> Default for InputFilter<F> {
    fn default() -> Self {
        InputFilter::Off
    }
}

fn check_non_negative<F: Float>(value: F, err: PidConfigError) -> Result<(), PidConfigError> {
    if value.is_finite() && value >= F::zero() {
        Ok(())
    } else {
        Err(err)
    }
}

fn check_output_limits<F: Float>(output_min: F, output_max: F) -> Result<(), PidConfigError> {
    if output_min.is_finite() && output_max.is_finite() && output_min < output_max {
        Ok(())
    } else {
        Err(PidConfigError::InvalidOutputLimits)
    }
}

fn check_anti_windup<F: Float>(anti_windup: &AntiWindup<F>) -> Result<(), PidConfigError> {
    match *anti_windup {
        AntiWindup::BackCalculation { tracking_gain } => {
            if tracking_gain.is_finite() && tracking_gain > F::zero() {
                Ok(())
            } else {
                Err(PidConfigError::InvalidTrackingGain)
            }
        }
        _ => Ok(()),
    }
}

fn check_derivative_filter<F: Float>(filter: &DerivativeFilter<F>) -> Result<(), PidConfigError> {
    match *filter {
        DerivativeFilter::TimeConstant(tau) => {
            check_non_negative(tau, PidConfigError::InvalidFilterTimeConstant)
        }
        DerivativeFilter::FixedAlpha(alpha) => {
            if alpha.is_finite() && alpha > F::zero() && alpha <= F::one() {
                Ok(())
            } else {
                Err(PidConfigError::InvalidFilterAlpha)
            }
        }
        DerivativeFilter::Biquad(ref coeffs) => check_coefficients(coeffs),
    }
}

fn check_input_filter<F: Float>(filter: &InputFilter<F>) -> Result<(), PidConfigError> {
    match *filter {
        InputFilter::Off => Ok(()),
        InputFilter::TimeConstant(tau) => {
            check_non_negative(tau, PidConfigError::InvalidFilterTimeConstant)
        }
        InputFilter::Biquad(ref coeffs) => check_coefficients(coeffs),
    }
}

fn check_coefficients<F: Float>(coeffs: &BiquadCoefficients<F>) -> Result<(), PidConfigError> {
    if coeffs.is_valid() {
        Ok(())
    } else {
        Err(PidConfigError::InvalidFilterCoefficients)
    }
}

/// Tuning parameters and limits of one controller.
///
/// Fields are private and every setter validates its argument, leaving the previous value in
/// place on failure. Use [`PidConfigBuilder`] to assemble a configuration in one expression.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidConfig<F> {
    /// Proportional gain coefficient.
    /// Defaults to 1.0.
    kp: F,

    /// Integral gain coefficient, applied as `ki * error * dt`.
    /// Defaults to 0.0.
    ki: F,

    /// Derivative gain coefficient, applied to the (filtered) rate of change per second.
    /// Defaults to 0.0.
    kd: F,

    /// Feed-forward gain applied to the ramped setpoint.
    /// Defaults to 0.0.
    kf: F,

    /// Defaults to -1.0.
    output_min: F,

    /// Defaults to 1.0.
    output_max: F,

    /// Error magnitudes up to this value are treated as zero; larger errors are shrunk by it so
    /// the proportional action has no step at the band edge.
    /// Defaults to 0.0 (disabled).
    deadband: F,

    /// Maximum output change per second. Defaults to 0.0 (disabled).
    max_rate: F,

    /// Maximum change of the internal setpoint per second. Defaults to 0.0 (disabled).
    max_setpoint_ramp: F,

    anti_windup: AntiWindup<F>,

    derivative_filter: DerivativeFilter<F>,

    input_filter: InputFilter<F>,

    /// Weight of the setpoint in the proportional term (two-degree-of-freedom β).
    /// Defaults to 1.0, i.e. proportional on error.
    setpoint_weight: F,

    /// Whether to apply the derivative on the measurement.
    /// if true, the derivative term is computed using the NEGATIVE backward difference between the
    /// current and previous measurement.
    /// Defaults to false.
    use_derivative_on_measurement: bool,
}

impl<F: Float> Default for PidConfig<F> {
    fn default() -> Self {
        PidConfig {
            kp: F::one(),
            ki: F::zero(),
            kd: F::zero(),
            kf: F::zero(),
            output_min: -F::one(),
            output_max: F::one(),
            deadband: F::zero(),
            max_rate: F::zero(),
            max_setpoint_ramp: F::zero(),
            anti_windup: AntiWindup::default(),
            derivative_filter: DerivativeFilter::default(),
            input_filter: InputFilter::default(),
            setpoint_weight: F::one(),
            use_derivative_on_measurement: false,
        }
    }
}

impl<F: Float> PidConfig<F> {
    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Returns the feed-forward gain.
    pub fn kf(&self) -> F {
        self.kf
    }

    /// Convenience method that returns the proportional, integral, and derivative gains together as a tuple.
    pub fn gains(&self) -> (F, F, F) {
        (self.kp, self.ki, self.kd)
    }

    /// Returns the minimum output limit.
    pub fn output_min(&self) -> F {
        self.output_min
    }

    /// Returns the maximum output limit.
    pub fn output_max(&self) -> F {
        self.output_max
    }

    /// Returns the deadband half-width.
    pub fn deadband(&self) -> F {
        self.deadband
    }

    /// Returns the output rate limit in units per second (0 when disabled).
    pub fn max_rate(&self) -> F {
        self.max_rate
    }

    /// Returns the setpoint ramp limit in units per second (0 when disabled).
    pub fn max_setpoint_ramp(&self) -> F {
        self.max_setpoint_ramp
    }

    /// Returns the anti-windup strategy.
    pub fn anti_windup(&self) -> AntiWindup<F> {
        self.anti_windup
    }

    /// Returns the derivative filter.
    pub fn derivative_filter(&self) -> DerivativeFilter<F> {
        self.derivative_filter
    }

    /// Returns the measurement filter.
    pub fn input_filter(&self) -> InputFilter<F> {
        self.input_filter
    }

    /// Returns the proportional setpoint weight β.
    pub fn setpoint_weight(&self) -> F {
        self.setpoint_weight
    }

    /// Returns the flag indicating whether to apply the derivative on the measurement.
    pub fn use_derivative_on_measurement(&self) -> bool {
        self.use_derivative_on_measurement
    }

    /// Sets the proportional gain.
    ///
    /// Zero is accepted so that pure I or pure D controllers can be expressed.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidProportionalGain)` if the gain is negative or not finite.
    pub fn set_kp(&mut self, kp: F) -> Result<(), PidConfigError> {
        check_non_negative(kp, PidConfigError::InvalidProportionalGain)?;
        self.kp = kp;
        Ok(())
    }

    /// Sets the integral gain.
    ///
    /// The integral term is not rescaled, so changing `ki` mid-run changes only the rate at which
    /// the integral accumulates from now on and causes no output step.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidIntegralGain)` if the gain is negative or not finite.
    pub fn set_ki(&mut self, ki: F) -> Result<(), PidConfigError> {
        check_non_negative(ki, PidConfigError::InvalidIntegralGain)?;
        self.ki = ki;
        Ok(())
    }

    /// Sets the derivative gain.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidDerivativeGain)` if the gain is negative or not finite.
    pub fn set_kd(&mut self, kd: F) -> Result<(), PidConfigError> {
        check_non_negative(kd, PidConfigError::InvalidDerivativeGain)?;
        self.kd = kd;
        Ok(())
    }

    /// Sets the feed-forward gain. Negative values are allowed.
    pub fn set_kf(&mut self, kf: F) -> Result<(), PidConfigError> {
        if !kf.is_finite() {
            return Err(PidConfigError::InvalidFeedForwardGain);
        }
        self.kf = kf;
        Ok(())
    }

    /// Convenience method to set the proportional, integral, and derivative gains together.
    ///
    /// Nothing is changed unless all three gains are valid.
    pub fn set_gains(&mut self, kp: F, ki: F, kd: F) -> Result<(), PidConfigError> {
        check_non_negative(kp, PidConfigError::InvalidProportionalGain)?;
        check_non_negative(ki, PidConfigError::InvalidIntegralGain)?;
        check_non_negative(kd, PidConfigError::InvalidDerivativeGain)?;
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        Ok(())
    }

    /// Sets the minimum and maximum output limits.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidOutputLimits)` if either limit is not finite or
    ///   `output_min >= output_max`.
    pub fn set_output_limits(&mut self, output_min: F, output_max: F) -> Result<(), PidConfigError> {
        check_output_limits(output_min, output_max)?;
        self.output_min = output_min;
        self.output_max = output_max;
        Ok(())
    }

    /// Sets the deadband half-width; zero disables it.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidDeadband)` if the value is negative or not finite.
    pub fn set_deadband(&mut self, deadband: F) -> Result<(), PidConfigError> {
        check_non_negative(deadband, PidConfigError::InvalidDeadband)?;
        self.deadband = deadband;
        Ok(())
    }

    /// Sets the maximum output change per second; zero disables rate limiting.
    pub fn set_max_rate(&mut self, max_rate: F) -> Result<(), PidConfigError> {
        check_non_negative(max_rate, PidConfigError::InvalidMaxRate)?;
        self.max_rate = max_rate;
        Ok(())
    }

    /// Sets the maximum setpoint change per second; zero disables ramping.
    pub fn set_max_setpoint_ramp(&mut self, max_setpoint_ramp: F) -> Result<(), PidConfigError> {
        check_non_negative(max_setpoint_ramp, PidConfigError::InvalidSetpointRamp)?;
        self.max_setpoint_ramp = max_setpoint_ramp;
        Ok(())
    }

    /// Sets the anti-windup strategy.
    ///
    /// The current integral is kept, so switching strategies mid-run causes no output step.
    ///
    /// # Returns
    /// - `Err(PidConfigError::InvalidTrackingGain)` for a back-calculation gain that is not positive
    ///   and finite.
    pub fn set_anti_windup(&mut self, anti_windup: AntiWindup<F>) -> Result<(), PidConfigError> {
        check_anti_windup(&anti_windup)?;
        self.anti_windup = anti_windup;
        Ok(())
    }

    /// Sets the filter applied to the raw derivative.
    pub fn set_derivative_filter(
        &mut self,
        derivative_filter: DerivativeFilter<F>,
    ) -> Result<(), PidConfigError> {
        check_derivative_filter(&derivative_filter)?;
        self.derivative_filter = derivative_filter;
        Ok(())
    }

    /// Sets the filter applied to the measurement. Biquad coefficients must describe a stable filter.
    pub fn set_input_filter(&mut self, input_filter: InputFilter<F>) -> Result<(), PidConfigError> {
        check_input_filter(&input_filter)?;
        self.input_filter = input_filter;
        Ok(())
    }

    /// Sets the proportional setpoint weight β in `[0, 1]`.
    ///
    /// With β < 1 the proportional term becomes `kp * (β * setpoint - measurement)`, softening
    /// the reaction to setpoint steps while keeping full disturbance rejection. The deadband does
    /// not apply to this form.
    pub fn set_setpoint_weight(&mut self, setpoint_weight: F) -> Result<(), PidConfigError> {
        if !(setpoint_weight >= F::zero() && setpoint_weight <= F::one()) {
            return Err(PidConfigError::InvalidSetpointWeight);
        }
        self.setpoint_weight = setpoint_weight;
        Ok(())
    }

    /// Sets whether to apply the derivative on the measurement.
    pub fn set_use_derivative_on_measurement(&mut self, use_derivative_on_measurement: bool) {
        self.use_derivative_on_measurement = use_derivative_on_measurement;
    }

    /// Checks every parameter at once.
    pub fn validate(&self) -> Result<(), PidConfigError> {
        check_non_negative(self.kp, PidConfigError::InvalidProportionalGain)?;
        check_non_negative(self.ki, PidConfigError::InvalidIntegralGain)?;
        check_non_negative(self.kd, PidConfigError::InvalidDerivativeGain)?;
        if !self.kf.is_finite() {
            return Err(PidConfigError::InvalidFeedForwardGain);
        }
        check_output_limits(self.output_min, self.output_max)?;
        check_non_negative(self.deadband, PidConfigError::InvalidDeadband)?;
        check_non_negative(self.max_rate, PidConfigError::InvalidMaxRate)?;
        check_non_negative(self.max_setpoint_ramp, PidConfigError::InvalidSetpointRamp)?;
        check_anti_windup(&self.anti_windup)?;
        check_derivative_filter(&self.derivative_filter)?;
        check_input_filter(&self.input_filter)?;
        if !(self.setpoint_weight >= F::zero() && self.setpoint_weight <= F::one()) {
            return Err(PidConfigError::InvalidSetpointWeight);
        }
        Ok(())
    }

    fn clamp_output(&self, value: F) -> F {
        clamp(value, self.output_min, self.output_max)
    }

    fn apply_deadband(&self, error: F) -> F {
        let band = self.deadband;
        if band <= F::zero() {
            error
        } else if error > band {
            error - band
        } else if error < -band {
            error + band
        } else {
            F::zero()
        }
    }
}

/// Builder for [`PidConfig`]. Every value goes through the matching setter in
/// [`build`](PidConfigBuilder::build), so the first invalid parameter is reported.
#[derive(Copy, Clone, Debug)]
pub struct PidConfigBuilder<F> {
    kp: F,
    ki: F,
    kd: F,
    kf: F,
    output_limits: (F, F),
    deadband: F,
    max_rate: F,
    max_setpoint_ramp: F,
    anti_windup: AntiWindup<F>,
    derivative_filter: DerivativeFilter<F>,
    input_filter: InputFilter<F>,
    setpoint_weight: F,
    use_derivative_on_measurement: bool,
}

impl<F: Float> Default for PidConfigBuilder<F> {
    fn default() -> Self {
        let config = PidConfig::default();
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            kf: config.kf,
            output_limits: (config.output_min, config.output_max),
            deadband: config.deadband,
            max_rate: config.max_rate,
            max_setpoint_ramp: config.max_setpoint_ramp,
            anti_windup: config.anti_windup,
            derivative_filter: config.derivative_filter,
            input_filter: config.input_filter,
            setpoint_weight: config.setpoint_weight,
            use_derivative_on_measurement: config.use_derivative_on_measurement,
        }
    }
}

impl<F: Float> PidConfigBuilder<F> {
    /// Value handed to [`PidConfig::set_kp`] by [`build`](Self::build).
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = kp;
        self
    }

    /// Value handed to [`PidConfig::set_ki`] by [`build`](Self::build).
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = ki;
        self
    }

    /// Value handed to [`PidConfig::set_kd`] by [`build`](Self::build).
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = kd;
        self
    }

    /// Value handed to [`PidConfig::set_kf`] by [`build`](Self::build).
    pub fn kf(mut self, kf: F) -> Self {
        self.kf = kf;
        self
    }

    /// Value handed to [`PidConfig::set_output_limits`] by [`build`](Self::build).
    pub fn output_limits(mut self, output_min: F, output_max: F) -> Self {
        self.output_limits = (output_min, output_max);
        self
    }

    /// Value handed to [`PidConfig::set_deadband`] by [`build`](Self::build).
    pub fn deadband(mut self, deadband: F) -> Self {
        self.deadband = deadband;
        self
    }

    /// Value handed to [`PidConfig::set_max_rate`] by [`build`](Self::build).
    pub fn max_rate(mut self, max_rate: F) -> Self {
        self.max_rate = max_rate;
        self
    }

    /// Value handed to [`PidConfig::set_max_setpoint_ramp`] by [`build`](Self::build).
    pub fn max_setpoint_ramp(mut self, max_setpoint_ramp: F) -> Self {
        self.max_setpoint_ramp = max_setpoint_ramp;
        self
    }

    /// Value handed to [`PidConfig::set_anti_windup`] by [`build`](Self::build).
    pub fn anti_windup(mut self, anti_windup: AntiWindup<F>) -> Self {
        self.anti_windup = anti_windup;
        self
    }

    /// Value handed to [`PidConfig::set_derivative_filter`] by [`build`](Self::build).
    pub fn derivative_filter(mut self, derivative_filter: DerivativeFilter<F>) -> Self {
        self.derivative_filter = derivative_filter;
        self
    }

    /// Value handed to [`PidConfig::set_input_filter`] by [`build`](Self::build).
    pub fn input_filter(mut self, input_filter: InputFilter<F>) -> Self {
        self.input_filter = input_filter;
        self
    }

    /// Value handed to [`PidConfig::set_setpoint_weight`] by [`build`](Self::build).
    pub fn setpoint_weight(mut self, setpoint_weight: F) -> Self {
        self.setpoint_weight = setpoint_weight;
        self
    }

    /// Value handed to [`PidConfig::set_use_derivative_on_measurement`] by [`build`](Self::build).
    pub fn use_derivative_on_measurement(mut self, use_derivative_on_measurement: bool) -> Self {
        self.use_derivative_on_measurement = use_derivative_on_measurement;
        self
    }

    /// Validates every parameter and returns the configuration.
    ///
    /// # Returns
    /// - The first [`PidConfigError`] encountered, checked in field order.
    pub fn build(self) -> Result<PidConfig<F>, PidConfigError> {
        let mut config = PidConfig::default();
        config.set_kp(self.kp)?;
        config.set_ki(self.ki)?;
        config.set_kd(self.kd)?;
        config.set_kf(self.kf)?;
        config.set_output_limits(self.output_limits.0, self.output_limits.1)?;
        config.set_deadband(self.deadband)?;
        config.set_max_rate(self.max_rate)?;
        config.set_max_setpoint_ramp(self.max_setpoint_ramp)?;
        config.set_anti_windup(self.anti_windup)?;
        config.set_derivative_filter(self.derivative_filter)?;
        config.set_input_filter(self.input_filter)?;
        config.set_setpoint_weight(self.setpoint_weight)?;
        config.set_use_derivative_on_measurement(self.use_derivative_on_measurement);
        Ok(config)
    }
}

/// Internal values worth recording for offline analysis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Snapshot<F> {
    /// Output emitted on the last tick
    pub output: F,
    /// Integral term in output units
    pub integral: F,
    /// Ramp-limited setpoint
    pub internal_setpoint: F,
    /// Filtered derivative before scaling by `kd`
    pub d_filtered: F,
}

/// Mutable state of one controller instance, advanced once per tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidContext<I, F> {
    integral: F,
    prev_measurement: F,
    prev_error: F,
    derivative: LowPass<F>,
    derivative_biquad: BiquadState<F>,
    input: LowPass<F>,
    input_biquad: BiquadState<F>,
    internal_setpoint: F,
    prev_output: F,
    last_tick: Option<I>,
    first_run: bool,
}

impl<I: InstantLike, F: Float> Default for PidContext<I, F> {
    fn default() -> Self {
        Self::new_uninit()
    }
}

impl<I: InstantLike, F: Float> PidContext<I, F> {
    /// Creates a neutral context: zero integral, history and output. The first update seeds the
    /// history from its inputs, so the first derivative is zero and the setpoint is not ramped.
    pub fn new_uninit() -> Self {
        Self {
            integral: F::zero(),
            prev_measurement: F::zero(),
            prev_error: F::zero(),
            derivative: LowPass::new(),
            derivative_biquad: BiquadState::new(),
            input: LowPass::new(),
            input_biquad: BiquadState::new(),
            internal_setpoint: F::zero(),
            prev_output: F::zero(),
            last_tick: None,
            first_run: true,
        }
    }

    /// Returns to the neutral state of [`new_uninit`](PidContext::new_uninit).
    pub fn reset(&mut self) {
        *self = Self::new_uninit();
    }

    /// Zeroes the integral alone.
    pub fn reset_integral(&mut self) {
        self.integral = F::zero();
    }

    /// Returns the last emitted output.
    pub fn output(&self) -> F {
        self.prev_output
    }

    /// Returns the error of the last tick, after the deadband.
    pub fn error(&self) -> F {
        self.prev_error
    }

    /// Returns the integral term, already scaled by `ki`.
    pub fn integral(&self) -> F {
        self.integral
    }

    /// Returns the ramp-limited setpoint the control law is tracking.
    pub fn internal_setpoint(&self) -> F {
        self.internal_setpoint
    }

    /// Returns the filtered (unscaled) derivative.
    pub fn d_filtered(&self) -> F {
        self.derivative.value()
    }

    /// Returns the timestamp of the last tick-driven update.
    pub fn last_time(&self) -> Option<I> {
        self.last_tick
    }

    /// False until the first accepted tick.
    pub fn is_initialized(&self) -> bool {
        !self.first_run
    }

    /// Collects the internal values of interest in one record.
    pub fn snapshot(&self) -> Snapshot<F> {
        Snapshot {
            output: self.prev_output,
            integral: self.integral,
            internal_setpoint: self.internal_setpoint,
            d_filtered: self.derivative.value(),
        }
    }
}

fn check_tick<F: Float>(setpoint: F, measurement: F, dt: F) -> Result<(), TickError> {
    if !(dt.is_finite() && dt > F::zero()) {
        return Err(TickError::InvalidInterval);
    }
    if !(setpoint.is_finite() && measurement.is_finite()) {
        return Err(TickError::NonFiniteInput);
    }
    Ok(())
}

fn interval<I: InstantLike, F: Float>(now: I, last: I) -> Result<F, TickError> {
    F::from(now.duration_since(last).as_secs_f64()).ok_or(TickError::InvalidInterval)
}

/// A functional implementation of the PID controller.
///
/// The controller only borrows its configuration, which must outlive it, and holds no mutable
/// state: a [`PidContext`] is passed in and the advanced context returned with each call. A
/// rejected tick returns the context unchanged.
#[derive(Copy, Clone, Debug)]
pub struct FuncPidController<'a, F> {
    config: &'a PidConfig<F>,
}

impl<'a, F: Float> FuncPidController<'a, F> {
    /// Validates `config` and binds the controller to it.
    pub fn new(config: &'a PidConfig<F>) -> Result<Self, PidConfigError> {
        config.validate()?;
        Ok(FuncPidController { config })
    }

    /// Returns the configuration this controller is bound to.
    pub fn config(&self) -> &'a PidConfig<F> {
        self.config
    }

    /// Runs one tick of the absolute (positional) control law.
    ///
    /// # Arguments
    /// - `ctx`: The context to advance.
    /// - `setpoint`: The requested setpoint; it is ramp-limited internally.
    /// - `measurement`: The process value.
    /// - `dt`: Seconds elapsed since the previous tick, must be positive.
    ///
    /// # Returns
    /// The bounded, rate-limited output and the advanced context, or the reason the tick was
    /// rejected.
    pub fn try_update<I: InstantLike>(
        &self,
        mut ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        dt: F,
    ) -> Result<(F, PidContext<I, F>), TickError> {
        check_tick(setpoint, measurement, dt)?;
        let cfg = self.config;
        let measurement = self.filter_input(&mut ctx, measurement, dt);

        if ctx.first_run {
            ctx.internal_setpoint = setpoint;
            ctx.prev_measurement = measurement;
            ctx.prev_error = cfg.apply_deadband(setpoint - measurement);
            ctx.prev_output = cfg.clamp_output(ctx.prev_output);
        }

        ctx.internal_setpoint = self.ramp_setpoint(ctx.internal_setpoint, setpoint, dt);
        let setpoint = ctx.internal_setpoint;

        let error = cfg.apply_deadband(setpoint - measurement);
        let p_term = cfg.kp * self.proportional_error(error, setpoint, measurement);

        // Optional derivative on measurement to mitigate derivative kick
        let raw_derivative = if cfg.use_derivative_on_measurement {
            -(measurement - ctx.prev_measurement) / dt
        } else {
            (error - ctx.prev_error) / dt
        };
        let d_term = cfg.kd * self.filter_derivative(&mut ctx, raw_derivative, dt);

        let f_term = cfg.kf * setpoint;

        let pdf = p_term + d_term + f_term;
        if !pdf.is_finite() {
            return Err(TickError::NonFiniteOutput);
        }

        let (integral, output) = self.integrate(ctx.integral, cfg.ki * error * dt, pdf, dt);
        let output = self.limit_rate(ctx.prev_output, output, dt);

        if !(output.is_finite() && integral.is_finite()) {
            return Err(TickError::NonFiniteOutput);
        }

        ctx.integral = integral;
        ctx.prev_measurement = measurement;
        ctx.prev_error = error;
        ctx.prev_output = output;
        ctx.first_run = false;
        Ok((output, ctx))
    }

    /// Like [`try_update`](Self::try_update), but a rejected tick holds the previous output.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn update<I: InstantLike>(
        &self,
        ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        dt: F,
    ) -> (F, PidContext<I, F>) {
        match self.try_update(ctx, setpoint, measurement, dt) {
            Ok(result) => result,
            Err(err) => {
                log_warn!(
                    ?err,
                    setpoint = ?setpoint.to_f64(),
                    measurement = ?measurement.to_f64(),
                    dt = ?dt.to_f64(),
                    "rejected tick, holding previous output"
                );
                (ctx.prev_output, ctx)
            }
        }
    }

    /// Runs one tick with the interval measured from the previous tick's timestamp.
    ///
    /// The first call only records `now` and returns the current output, since no interval can
    /// be formed yet. A timestamp equal to the previous one is rejected as a zero interval.
    pub fn try_update_at<I: InstantLike>(
        &self,
        mut ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        now: I,
    ) -> Result<(F, PidContext<I, F>), TickError> {
        let Some(last) = ctx.last_tick else {
            ctx.last_tick = Some(now);
            return Ok((ctx.prev_output, ctx));
        };
        let dt = interval(now, last)?;
        let (output, mut ctx) = self.try_update(ctx, setpoint, measurement, dt)?;
        ctx.last_tick = Some(now);
        Ok((output, ctx))
    }

    /// Like [`try_update_at`](Self::try_update_at), but a rejected tick holds the previous output.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn update_at<I: InstantLike>(
        &self,
        ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        now: I,
    ) -> (F, PidContext<I, F>) {
        match self.try_update_at(ctx, setpoint, measurement, now) {
            Ok(result) => result,
            Err(err) => {
                log_warn!(?err, ?now, "rejected timestamped tick, holding previous output");
                (ctx.prev_output, ctx)
            }
        }
    }

    /// Runs one tick of the incremental (velocity) form and returns the change in output.
    ///
    /// The first call after initialization seeds the history and returns exactly zero. The
    /// setpoint ramp and the deadband are not applied in this form; the caller accumulates the
    /// returned deltas and owns the absolute actuator command.
    pub fn try_update_incremental<I: InstantLike>(
        &self,
        mut ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        dt: F,
    ) -> Result<(F, PidContext<I, F>), TickError> {
        check_tick(setpoint, measurement, dt)?;
        let cfg = self.config;
        let measurement = self.filter_input(&mut ctx, measurement, dt);
        let error = setpoint - measurement;

        if ctx.first_run {
            ctx.derivative.reset();
            ctx.derivative_biquad.reset();
            ctx.prev_measurement = measurement;
            ctx.prev_error = error;
            ctx.internal_setpoint = setpoint;
            ctx.first_run = false;
            return Ok((F::zero(), ctx));
        }

        let p_delta = cfg.kp * (error - ctx.prev_error);
        let i_delta = cfg.ki * error * dt;

        let raw_derivative = if cfg.use_derivative_on_measurement {
            -(measurement - ctx.prev_measurement) / dt
        } else {
            (error - ctx.prev_error) / dt
        };
        let previous = ctx.derivative.value();
        let d_delta = cfg.kd * (self.filter_derivative(&mut ctx, raw_derivative, dt) - previous);

        let delta = self.limit_rate(F::zero(), p_delta + i_delta + d_delta, dt);
        if !delta.is_finite() {
            return Err(TickError::NonFiniteOutput);
        }

        ctx.prev_measurement = measurement;
        ctx.prev_error = error;
        ctx.internal_setpoint = setpoint;
        Ok((delta, ctx))
    }

    /// Like [`try_update_incremental`](Self::try_update_incremental), but a rejected tick
    /// returns a zero change.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn update_incremental<I: InstantLike>(
        &self,
        ctx: PidContext<I, F>,
        setpoint: F,
        measurement: F,
        dt: F,
    ) -> (F, PidContext<I, F>) {
        match self.try_update_incremental(ctx, setpoint, measurement, dt) {
            Ok(result) => result,
            Err(err) => {
                log_warn!(?err, dt = ?dt.to_f64(), "rejected incremental tick");
                (F::zero(), ctx)
            }
        }
    }

    /// Keeps the context consistent with an externally imposed output, against the setpoint the
    /// controller is currently tracking (or zero error before the first tick).
    ///
    /// See [`track_manual_setpoint`](Self::track_manual_setpoint).
    pub fn track_manual<I: InstantLike>(
        &self,
        ctx: PidContext<I, F>,
        manual_output: F,
        measurement: F,
    ) -> Result<PidContext<I, F>, TickError> {
        let setpoint = if ctx.first_run {
            measurement
        } else {
            ctx.internal_setpoint
        };
        self.track_manual_setpoint(ctx, manual_output, measurement, setpoint)
    }

    /// Back-calculates the integral so that `P + I + F` reproduces `manual_output` under the
    /// present error, with the derivative path and its filter reset to rest.
    ///
    /// Call this every tick while a supervisor drives the actuator. The next automatic update
    /// then continues from the manual value without a step, and the rate limiter starts from it.
    /// Timekeeping restarts as well: the first [`update_at`](Self::update_at) after tracking only
    /// records its timestamp, so the manual stretch is never integrated as one long interval.
    pub fn track_manual_setpoint<I: InstantLike>(
        &self,
        mut ctx: PidContext<I, F>,
        manual_output: F,
        measurement: F,
        setpoint: F,
    ) -> Result<PidContext<I, F>, TickError> {
        if !(manual_output.is_finite() && measurement.is_finite() && setpoint.is_finite()) {
            return Err(TickError::NonFiniteInput);
        }
        let cfg = self.config;
        let manual_output = cfg.clamp_output(manual_output);
        ctx.input.prime(measurement);
        ctx.input_biquad = BiquadState::new();
        if let InputFilter::Biquad(ref coeffs) = cfg.input_filter {
            ctx.input_biquad.prime(coeffs, measurement);
        }

        let error = cfg.apply_deadband(setpoint - measurement);
        let p_term = cfg.kp * self.proportional_error(error, setpoint, measurement);
        let f_term = cfg.kf * setpoint;
        let integral = manual_output - p_term - f_term;
        if !integral.is_finite() {
            return Err(TickError::NonFiniteOutput);
        }

        ctx.integral = integral;
        ctx.derivative.reset();
        ctx.derivative_biquad.reset();
        ctx.prev_measurement = measurement;
        ctx.prev_error = error;
        ctx.internal_setpoint = setpoint;
        ctx.prev_output = manual_output;
        ctx.last_tick = None;
        ctx.first_run = false;
        Ok(ctx)
    }

    /// Preloads the integral, clamped to the output limits. Non-finite values are ignored.
    pub fn set_integral<I: InstantLike>(&self, mut ctx: PidContext<I, F>, value: F) -> PidContext<I, F> {
        if value.is_finite() {
            ctx.integral = self.config.clamp_output(value);
        }
        ctx
    }

    fn filter_input<I: InstantLike>(&self, ctx: &mut PidContext<I, F>, measurement: F, dt: F) -> F {
        match self.config.input_filter {
            InputFilter::Off => measurement,
            InputFilter::TimeConstant(tau) => {
                if ctx.first_run {
                    ctx.input.prime(measurement);
                }
                ctx.input.step_with_time_constant(measurement, tau, dt)
            }
            InputFilter::Biquad(ref coeffs) => {
                if ctx.first_run {
                    ctx.input_biquad.prime(coeffs, measurement);
                }
                ctx.input_biquad.step(coeffs, measurement)
            }
        }
    }

    fn filter_derivative<I: InstantLike>(&self, ctx: &mut PidContext<I, F>, raw: F, dt: F) -> F {
        match self.config.derivative_filter {
            DerivativeFilter::TimeConstant(tau) => {
                ctx.derivative.step_with_time_constant(raw, tau, dt)
            }
            DerivativeFilter::FixedAlpha(alpha) => ctx.derivative.step(raw, alpha),
            DerivativeFilter::Biquad(ref coeffs) => {
                let filtered = ctx.derivative_biquad.step(coeffs, raw);
                ctx.derivative.prime(filtered);
                filtered
            }
        }
    }

    fn proportional_error(&self, error: F, setpoint: F, measurement: F) -> F {
        let beta = self.config.setpoint_weight;
        if beta == F::one() {
            error
        } else {
            beta * setpoint - measurement
        }
    }

    fn ramp_setpoint(&self, current: F, target: F, dt: F) -> F {
        let max_ramp = self.config.max_setpoint_ramp;
        if max_ramp > F::zero() {
            let step = max_ramp * dt;
            current + clamp(target - current, -step, step)
        } else {
            target
        }
    }

    fn limit_rate(&self, previous: F, output: F, dt: F) -> F {
        let max_rate = self.config.max_rate;
        if max_rate > F::zero() {
            let step = max_rate * dt;
            previous + clamp(output - previous, -step, step)
        } else {
            output
        }
    }

    /// Accumulates `i_change` into `integral` under the configured anti-windup strategy and
    /// saturates `pdf + integral`. Returns the new integral and the clamped output.
    fn integrate(&self, integral: F, i_change: F, pdf: F, dt: F) -> (F, F) {
        let cfg = self.config;
        let (lo, hi) = (cfg.output_min, cfg.output_max);
        let zero = F::zero();

        let integral = match cfg.anti_windup {
            AntiWindup::ConditionalIntegration => {
                let unclamped = pdf + integral + i_change;
                let winding_up =
                    (unclamped > hi && i_change > zero) || (unclamped < lo && i_change < zero);
                if winding_up {
                    integral
                } else {
                    integral + i_change
                }
            }
            AntiWindup::BackCalculation { tracking_gain } => {
                let integral = integral + i_change;
                let unclamped = pdf + integral;
                let gain = (tracking_gain * dt).min(F::one());
                integral + gain * (cfg.clamp_output(unclamped) - unclamped)
            }
            AntiWindup::IntegralClamp => clamp(integral + i_change, lo, hi),
            AntiWindup::DynamicClamp => {
                let floor = if pdf < lo { zero } else { lo - pdf };
                let ceiling = if pdf > hi { zero } else { hi - pdf };
                clamp(integral + i_change, floor, ceiling)
            }
        };

        // A back-calculated integral stays between the saturated and unsaturated sums, so the
        // clamped output equals the one it was tracked against
        (integral, cfg.clamp_output(pdf + integral))
    }
}

/// A stateful PID controller keeping its [`PidContext`] inline.
///
/// This is a thin wrapper over [`FuncPidController`]: every method forwards to the functional
/// controller and stores the returned context.
#[derive(Copy, Clone, Debug)]
pub struct PidController<'a, I, F> {
    ctx: PidContext<I, F>,
    controller: FuncPidController<'a, F>,
}

impl<'a, I: InstantLike, F: Float> PidController<'a, I, F> {
    /// Validates `config` and creates a controller with a neutral context.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn new(config: &'a PidConfig<F>) -> Result<Self, PidConfigError> {
        let controller = FuncPidController::new(config).map_err(|err| {
            log_warn!(?err, "rejected PID configuration");
            err
        })?;
        log_debug!(
            kp = ?config.kp().to_f64(),
            ki = ?config.ki().to_f64(),
            kd = ?config.kd().to_f64(),
            "PID controller initialized"
        );
        Ok(Self {
            ctx: PidContext::new_uninit(),
            controller,
        })
    }

    /// Rebinds the controller to `config` and resets its context.
    ///
    /// The context is reset even when the configuration is rejected, in which case the
    /// controller keeps its previous configuration. Calling this twice with the same
    /// configuration leaves the same state as calling it once.
    pub fn reinit(&mut self, config: &'a PidConfig<F>) -> Result<(), PidConfigError> {
        self.ctx.reset();
        self.controller = FuncPidController::new(config)?;
        log_debug!("PID controller reinitialized");
        Ok(())
    }

    /// Returns the bound configuration.
    pub fn config(&self) -> &'a PidConfig<F> {
        self.controller.config()
    }

    /// Borrows the internal context, e.g. to hand it to a [`FuncPidController`].
    pub fn context(&self) -> &PidContext<I, F> {
        &self.ctx
    }

    /// Runs one tick of the absolute control law; a rejected tick holds the previous output.
    pub fn update(&mut self, setpoint: F, measurement: F, dt: F) -> F {
        let (output, ctx) = self.controller.update(self.ctx, setpoint, measurement, dt);
        self.ctx = ctx;
        output
    }

    /// See [`FuncPidController::try_update`].
    pub fn try_update(&mut self, setpoint: F, measurement: F, dt: F) -> Result<F, TickError> {
        let (output, ctx) = self
            .controller
            .try_update(self.ctx, setpoint, measurement, dt)?;
        self.ctx = ctx;
        Ok(output)
    }

    /// Runs one tick with the interval derived from the previous call's timestamp.
    pub fn update_at(&mut self, setpoint: F, measurement: F, now: I) -> F {
        let (output, ctx) = self
            .controller
            .update_at(self.ctx, setpoint, measurement, now);
        self.ctx = ctx;
        output
    }

    /// See [`FuncPidController::try_update_at`].
    pub fn try_update_at(&mut self, setpoint: F, measurement: F, now: I) -> Result<F, TickError> {
        let (output, ctx) = self
            .controller
            .try_update_at(self.ctx, setpoint, measurement, now)?;
        self.ctx = ctx;
        Ok(output)
    }

    /// Runs one tick of the incremental form and returns the change in output.
    pub fn update_incremental(&mut self, setpoint: F, measurement: F, dt: F) -> F {
        let (delta, ctx) = self
            .controller
            .update_incremental(self.ctx, setpoint, measurement, dt);
        self.ctx = ctx;
        delta
    }

    /// See [`FuncPidController::try_update_incremental`].
    pub fn try_update_incremental(
        &mut self,
        setpoint: F,
        measurement: F,
        dt: F,
    ) -> Result<F, TickError> {
        let (delta, ctx) = self
            .controller
            .try_update_incremental(self.ctx, setpoint, measurement, dt)?;
        self.ctx = ctx;
        Ok(delta)
    }

    /// See [`FuncPidController::track_manual`].
    pub fn track_manual(&mut self, manual_output: F, measurement: F) -> Result<(), TickError> {
        self.ctx = self
            .controller
            .track_manual(self.ctx, manual_output, measurement)?;
        Ok(())
    }

    /// See [`FuncPidController::track_manual_setpoint`].
    pub fn track_manual_setpoint(
        &mut self,
        manual_output: F,
        measurement: F,
        setpoint: F,
    ) -> Result<(), TickError> {
        self.ctx = self.controller.track_manual_setpoint(
            self.ctx,
            manual_output,
            measurement,
            setpoint,
        )?;
        Ok(())
    }

    /// Preloads the integral, clamped to the output limits.
    pub fn set_integral(&mut self, value: F) {
        self.ctx = self.controller.set_integral(self.ctx, value);
    }

    /// Returns the controller to its freshly initialized state, keeping the configuration.
    pub fn reset(&mut self) {
        self.ctx.reset();
    }

    /// Zeroes the integral, leaving the rest of the state untouched.
    pub fn reset_integral(&mut self) {
        self.ctx.reset_integral();
    }

    /// Returns the last emitted output.
    pub fn output(&self) -> F {
        self.ctx.output()
    }

    /// Returns the error of the last tick, after the deadband.
    pub fn error(&self) -> F {
        self.ctx.error()
    }

    /// Returns the integral term.
    pub fn integral(&self) -> F {
        self.ctx.integral()
    }

    /// Returns the ramp-limited setpoint.
    pub fn internal_setpoint(&self) -> F {
        self.ctx.internal_setpoint()
    }

    /// Returns the filtered derivative.
    pub fn d_filtered(&self) -> F {
        self.ctx.d_filtered()
    }

    /// Returns the timestamp of the last tick-driven update, if any.
    pub fn last_time(&self) -> Option<I> {
        self.ctx.last_time()
    }

    /// False until the first accepted tick.
    pub fn is_initialized(&self) -> bool {
        self.ctx.is_initialized()
    }

    /// See [`PidContext::snapshot`].
    pub fn snapshot(&self) -> Snapshot<F> {
        self.ctx.snapshot()
    }
}
