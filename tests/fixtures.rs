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

#[cfg(test)]
#[allow(dead_code)]
pub mod test_pid {

    use rt_pid::pid::*;
    use rt_pid::time::Millis;

    pub const DT: f64 = 0.01;

    /// Controllers borrow their configuration, so fixtures hand out a config and bind to it
    pub fn make_config() -> PidConfig<f64> {
        PidConfigBuilder::default()
            .kp(2.0)
            .ki(0.5)
            .output_limits(-100.0, 100.0)
            .build()
            .expect("Fixture config must be valid")
    }

    pub fn make_controller(
        config: &PidConfig<f64>,
    ) -> (FuncPidController<'_, f64>, PidContext<Millis, f64>) {
        let controller = FuncPidController::new(config).expect("Fixture config must be valid");
        (controller, PidContext::new_uninit())
    }

    pub fn make_stateful_controller(config: &PidConfig<f64>) -> PidController<'_, Millis, f64> {
        PidController::new(config).expect("Fixture config must be valid")
    }

    /// Runs `n` absolute updates at a constant setpoint and measurement, collecting the outputs
    pub fn run_constant(
        pid: &mut PidController<'_, Millis, f64>,
        setpoint: f64,
        measurement: f64,
        n: usize,
    ) -> Vec<f64> {
        (0..n).map(|_| pid.update(setpoint, measurement, DT)).collect()
    }
}
