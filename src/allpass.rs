use crate::delay_line::{Coefficients, DelayFilter, DelaySpec};
use crate::error::Result;

/// Schroeder all-pass filter.
///
/// Feedforward and feedback taps share the same delay, giving a flat
/// magnitude response with a frequency dependent phase shift. Used to
/// thicken the echo density without colouring the sound. Stable for
/// `|attenuation| < 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AllPassFilter {
    delay: DelaySpec,
}

impl AllPassFilter {
    pub fn new(delay_in_ms: f64, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            delay: DelaySpec::new(delay_in_ms, sample_rate)?,
        })
    }
}

impl DelayFilter for AllPassFilter {
    fn delay(&self) -> &DelaySpec {
        &self.delay
    }

    /// feedforward `[attenuation, 0, …, 0, 1]`, feedback `[1, 0, …, 0, attenuation]`
    fn coefficients(&self, attenuation_coefficient: f32) -> Coefficients {
        let n = self.delay.delay_in_samples();
        Coefficients::sparse(
            n,
            &[(0, attenuation_coefficient), (n, 1.0)],
            &[(0, 1.0), (n, attenuation_coefficient)],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use super::*;

    const TEST_SAMPLE_RATE: u32 = 1000;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_coefficient_shape() {
        let allpass = AllPassFilter::new(3.0, TEST_SAMPLE_RATE).unwrap();
        let c = allpass.coefficients(0.5);
        assert_eq!(c.feedforward, vec![0.5, 0.0, 0.0, 1.0]);
        assert_eq!(c.feedback, vec![1.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_impulse_response() {
        // y[n] = g x[n] + x[n-N] - g y[n-N]
        let allpass = AllPassFilter::new(2.0, TEST_SAMPLE_RATE).unwrap();
        let g = 0.5;
        let mut input = vec![0.0; 7];
        input[0] = 1.0;
        let output = allpass.process_buffer(&input, g).unwrap();
        let expected = [g, 0.0, 1.0 - g * g, 0.0, -g * (1.0 - g * g), 0.0, g * g * (1.0 - g * g)];
        for (i, (got, want)) in output.iter().zip(expected.iter()).enumerate() {
            assert!((got - want).abs() < 1e-6, "Sample {i}: expected {want}, got {got}");
        }
    }

    #[test]
    fn test_unity_gain_at_every_frequency() {
        let allpass = AllPassFilter::new(7.0, TEST_SAMPLE_RATE).unwrap();
        let g = 0.5;

        // Whole periods only, so the steady state windows compare exactly
        for period in [5usize, 8, 40, 100] {
            let input: Vec<f32> = (0..6000)
                .map(|i| (TAU * i as f32 / period as f32).sin())
                .collect();
            let output = allpass.process_buffer(&input, g).unwrap();

            let window = 4000..6000;
            let input_rms = rms(&input[window.clone()]);
            let output_rms = rms(&output[window]);
            assert!(
                (input_rms - output_rms).abs() < 1e-3,
                "Period {period}: input rms {input_rms}, output rms {output_rms}"
            );
        }
    }

    #[test]
    fn test_zero_delay_is_identity() {
        let allpass = AllPassFilter::new(0.0, TEST_SAMPLE_RATE).unwrap();
        let input = [0.5, -1.0, 0.25];
        let output = allpass.process_buffer(&input, 0.5).unwrap();
        for (got, want) in output.iter().zip(input.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
