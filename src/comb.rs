use crate::delay_line::{Coefficients, DelayFilter, DelaySpec};
use crate::error::Result;

/// Feedback comb filter.
///
/// A single feedback tap `N` samples back. The impulse response has non-zero
/// samples only at multiples of `N`, decaying geometrically by the dampening
/// coefficient. The coefficient must lie in `[0, 1)` for the output to stay
/// bounded; it is not clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct CombFilter {
    delay: DelaySpec,
}

impl CombFilter {
    pub fn new(delay_in_ms: f64, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            delay: DelaySpec::new(delay_in_ms, sample_rate)?,
        })
    }
}

impl DelayFilter for CombFilter {
    fn delay(&self) -> &DelaySpec {
        &self.delay
    }

    /// feedforward `[1, 0, …, 0]`, feedback `[1, 0, …, 0, dampening]`
    fn coefficients(&self, dampening_coefficient: f32) -> Coefficients {
        let n = self.delay.delay_in_samples();
        Coefficients::sparse(n, &[(0, 1.0)], &[(0, 1.0), (n, dampening_coefficient)])
    }
}
