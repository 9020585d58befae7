#![warn(missing_docs)]

//! # Real-Time PID Controller Engine
//!
//! This library provides a bounded, rate-limited PID (Proportional-Integral-Derivative)
//! controller designed to be called once per tick from a timer interrupt or fixed-period task.
//!
//! Every update runs in constant time, never allocates and never blocks. Invalid ticks (a
//! non-positive interval, a NaN measurement) are rejected and the previous output is held, so a
//! single corrupt sample cannot poison the integrator.
//!
//! ## Features
//!
//! - Validated configuration: gains, output limits, deadband, rate limits and filters are all
//!   checked when the configuration is built and again when a controller is initialized.
//! - Four anti-windup strategies selected by one enum: conditional integration,
//!   back-calculation, integral clamping and dynamic (headroom) clamping.
//! - Setpoint ramping and output slew-rate limiting.
//! - Derivative-on-measurement to eliminate derivative kick, and a derivative low-pass whose
//!   cutoff stays fixed under a jittering sampling interval.
//! - Incremental (velocity-form) updates returning the change in output.
//! - Bumpless manual/automatic transfer through integral back-calculation.
//! - Cascade composition of two loops with optional outer-loop decimation.
//! - Biquad low-pass and notch filters for measurement conditioning.
//!
//! ## Usage
//!
//! ### Functional PID Controller
//!
//! The functional controller borrows its configuration and threads a `PidContext` value through
//! every call. `update` is pure: the same context and inputs always give the same output.
//!
//! ```rust
//! use rt_pid::pid::{FuncPidController, PidConfigBuilder, PidContext};
//! use rt_pid::time::Millis;
//!
//! let config = PidConfigBuilder::default()
//!     .kp(2.0)
//!     .ki(0.5)
//!     .output_limits(-10.0, 10.0)
//!     .build()
//!     .expect("Invalid PID config");
//! let pid = FuncPidController::new(&config).expect("Invalid PID config");
//! let ctx = PidContext::<Millis, f64>::new_uninit();
//!
//! let (output, ctx) = pid.update(ctx, 1.0, 0.0, 0.01);
//! assert_eq!(output, 2.0 + 0.5 * 0.01);
//! assert_eq!(ctx.output(), output);
//! ```
//!
//! ### Stateful PID Controller
//!
//! The stateful controller keeps the context inline and must be `mut`.
//!
//! ```rust
//! use rt_pid::pid::{AntiWindup, PidConfigBuilder, PidController};
//! use rt_pid::time::Millis;
//!
//! let config = PidConfigBuilder::default()
//!     .kp(1.0)
//!     .ki(10.0)
//!     .output_limits(-10.0, 10.0)
//!     .anti_windup(AntiWindup::BackCalculation { tracking_gain: 1.0 })
//!     .build()
//!     .expect("Invalid PID config");
//! let mut pid = PidController::<Millis, f64>::new(&config).expect("Invalid PID config");
//!
//! let output = pid.update(20.0, 0.0, 0.1);
//! assert_eq!(output, 10.0);
//! assert!((pid.integral() - 17.0).abs() < 1e-9);
//! ```
//!
//! ### Driving the controller from a tick counter
//!
//! ```rust
//! use rt_pid::pid::{PidConfig, PidController};
//! use rt_pid::time::Millis;
//!
//! let config = PidConfig::default();
//! let mut pid = PidController::new(&config).expect("Invalid PID config");
//!
//! // The first tick only starts timekeeping
//! pid.update_at(0.5, 0.0, Millis(u32::MAX - 4));
//! // 10 ms later, across the counter overflow
//! let output = pid.update_at(0.5, 0.0, Millis(5));
//! assert_eq!(output, 0.5);
//! ```
//!
//! ## License
//!
#![no_std]

#[cfg(feature = "std")]
extern crate std;

macro_rules! log_warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)+);
    }};
}

macro_rules! log_debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)+);
    }};
}

/// The PID controller: configuration, context and the update engines.
pub mod pid;

/// Biquad and single-pole filters for measurement and derivative conditioning.
pub mod filter;

/// Cascade composition of two PID controllers.
pub mod cascade;

/// The module containing time-related utilities to derive tick intervals from timestamps
pub mod time;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
