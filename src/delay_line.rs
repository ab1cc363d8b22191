//! Delay line core shared by every filter in the pipeline.
//!
//! Delays are specified in milliseconds and converted once, at construction,
//! to a whole number of samples. Filtering is a plain linear difference
//! equation evaluated over a whole buffer:
//!
//! ```text
//! a[0]·y[n] = Σ b[k]·x[n-k] - Σ a[k]·y[n-k]    (k ≥ 1 in the second sum)
//! ```
//!
//! `b` is the feedforward and `a` the feedback sequence. Samples before the
//! start of the buffer count as zero, so every call starts from silence.

use crate::error::{ReverbError, Result};

const MS_PER_SECOND: f64 = 1000.0;

/// Number of samples covering `delay_in_ms` at `sample_rate`.
///
/// Rounds up, so the delay is never shorter than requested:
/// 25 ms at 44.1 kHz is 1102.5 samples and becomes 1103.
pub fn samples_for_delay(delay_in_ms: f64, sample_rate: u32) -> Result<usize> {
    if sample_rate == 0 {
        return Err(ReverbError::InvalidParameter(
            "sample rate must be positive".to_string(),
        ));
    }
    if !delay_in_ms.is_finite() || delay_in_ms < 0.0 {
        return Err(ReverbError::InvalidParameter(format!(
            "delay must be a non-negative number of milliseconds, got {delay_in_ms}"
        )));
    }
    let samples = (delay_in_ms / MS_PER_SECOND * f64::from(sample_rate)).ceil();
    // Filters of order N carry N + 1 coefficients, so N + 1 has to fit too
    if samples >= usize::MAX as f64 {
        return Err(ReverbError::InvalidParameter(format!(
            "delay of {delay_in_ms} ms is too long to represent in samples"
        )));
    }
    Ok(samples as usize)
}

/// A delay time and the sample count it was resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySpec {
    delay_in_ms: f64,
    delay_in_samples: usize,
}

impl DelaySpec {
    pub fn new(delay_in_ms: f64, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            delay_in_ms,
            delay_in_samples: samples_for_delay(delay_in_ms, sample_rate)?,
        })
    }

    pub fn delay_in_ms(&self) -> f64 {
        self.delay_in_ms
    }

    pub fn delay_in_samples(&self) -> usize {
        self.delay_in_samples
    }
}

/// Feedforward and feedback sequences of a filter of order `N`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub feedforward: Vec<f32>,
    pub feedback: Vec<f32>,
}

impl Coefficients {
    /// Builds both sequences with length `order + 1`, zero except at the given
    /// taps. Taps landing on the same index are summed, which is what a zero
    /// sample delay collapses to.
    pub fn sparse(order: usize, feedforward: &[(usize, f32)], feedback: &[(usize, f32)]) -> Self {
        Self {
            feedforward: tapped(order, feedforward),
            feedback: tapped(order, feedback),
        }
    }
}

fn tapped(order: usize, taps: &[(usize, f32)]) -> Vec<f32> {
    let mut coefficients = vec![0.0; order + 1];
    for &(index, gain) in taps {
        coefficients[index] += gain;
    }
    coefficients
}

/// A non-zero coefficient and how many samples back it looks.
#[derive(Debug, Clone, Copy)]
struct Tap {
    delay: usize,
    gain: f32,
}

fn nonzero_taps(coefficients: &[f32], first_delay: usize, normalize: f32) -> Vec<Tap> {
    coefficients
        .iter()
        .enumerate()
        .filter(|(_, gain)| **gain != 0.0)
        .map(|(index, gain)| Tap {
            delay: index + first_delay,
            gain: gain / normalize,
        })
        .collect()
}

/// Runs `input` through the difference equation described in the module docs.
///
/// Coefficients are normalised by `feedback[0]`. Only non-zero taps are
/// visited, so long and mostly empty delay sequences stay cheap. The output
/// always has the same length as the input.
pub fn apply_filter(feedforward: &[f32], feedback: &[f32], input: &[f32]) -> Result<Vec<f32>> {
    let lead = match feedback.first() {
        Some(&lead) if lead != 0.0 && lead.is_finite() => lead,
        Some(&lead) => {
            return Err(ReverbError::InvalidParameter(format!(
                "leading feedback coefficient must be finite and non-zero, got {lead}"
            )));
        }
        None => {
            return Err(ReverbError::InvalidParameter(
                "feedback coefficients must not be empty".to_string(),
            ));
        }
    };

    let forward_taps = nonzero_taps(feedforward, 0, lead);
    let feedback_taps = nonzero_taps(&feedback[1..], 1, lead);

    let mut output: Vec<f32> = Vec::with_capacity(input.len());
    for n in 0..input.len() {
        let forward: f32 = forward_taps
            .iter()
            .take_while(|tap| tap.delay <= n)
            .map(|tap| tap.gain * input[n - tap.delay])
            .sum();
        let recursive: f32 = feedback_taps
            .iter()
            .take_while(|tap| tap.delay <= n)
            .map(|tap| tap.gain * output[n - tap.delay])
            .sum();
        output.push(forward - recursive);
    }
    Ok(output)
}

/// A filter built around a single delay line.
///
/// Implementors only decide how the scalar coefficient shapes the two
/// coefficient sequences; evaluation always goes through [`apply_filter`].
pub trait DelayFilter {
    fn delay(&self) -> &DelaySpec;

    fn coefficients(&self, coefficient: f32) -> Coefficients;

    fn delay_in_samples(&self) -> usize {
        self.delay().delay_in_samples()
    }

    fn process_buffer(&self, input: &[f32], coefficient: f32) -> Result<Vec<f32>> {
        let Coefficients {
            feedforward,
            feedback,
        } = self.coefficients(coefficient);
        apply_filter(&feedforward, &feedback, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_rounds_up() {
        assert_eq!(samples_for_delay(25.0, 44100).unwrap(), 1103);
        assert_eq!(samples_for_delay(1000.0, 44100).unwrap(), 44100);
        assert_eq!(samples_for_delay(0.0, 48000).unwrap(), 0);
        // 0.25 ms at 1 kHz is a quarter sample, still one full sample of delay
        assert_eq!(samples_for_delay(0.25, 1000).unwrap(), 1);
    }

    #[test]
    fn test_delay_rejects_bad_input() {
        assert!(matches!(
            samples_for_delay(25.0, 0),
            Err(ReverbError::InvalidParameter(_))
        ));
        assert!(matches!(
            samples_for_delay(-1.0, 44100),
            Err(ReverbError::InvalidParameter(_))
        ));
        assert!(matches!(
            samples_for_delay(f64::NAN, 44100),
            Err(ReverbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_delay_rejects_unrepresentable_lengths() {
        assert!(matches!(
            samples_for_delay(1e30, 44100),
            Err(ReverbError::InvalidParameter(_))
        ));
        assert!(matches!(
            DelaySpec::new(f64::MAX, 1),
            Err(ReverbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_delay_spec_keeps_both_units() {
        let spec = DelaySpec::new(30.0, 1000).unwrap();
        assert_eq!(spec.delay_in_ms(), 30.0);
        assert_eq!(spec.delay_in_samples(), 30);
    }

    #[test]
    fn test_sparse_coefficients_sum_colliding_taps() {
        let c = Coefficients::sparse(3, &[(0, 0.5), (3, 1.0)], &[(0, 1.0), (3, 0.5)]);
        assert_eq!(c.feedforward, vec![0.5, 0.0, 0.0, 1.0]);
        assert_eq!(c.feedback, vec![1.0, 0.0, 0.0, 0.5]);

        let collapsed = Coefficients::sparse(0, &[(0, 0.5), (0, 1.0)], &[(0, 1.0)]);
        assert_eq!(collapsed.feedforward, vec![1.5]);
        assert_eq!(collapsed.feedback, vec![1.0]);
    }

    #[test]
    fn test_identity_filter() {
        let input = [0.25, -0.5, 1.0, 0.0, 0.75];
        let output = apply_filter(&[1.0], &[1.0], &input).unwrap();
        assert_eq!(output, input.to_vec());
    }

    #[test]
    fn test_feedforward_delay_and_gain() {
        // y[n] = x[n] + 0.5 x[n-2]
        let input = [1.0, 2.0, 3.0, 0.0, 0.0];
        let output = apply_filter(&[1.0, 0.0, 0.5], &[1.0], &input).unwrap();
        assert_eq!(output, vec![1.0, 2.0, 3.5, 1.0, 1.5]);
    }

    #[test]
    fn test_recursive_one_pole() {
        // y[n] = x[n] + 0.5 y[n-1]
        let input = [1.0, 0.0, 0.0, 0.0];
        let output = apply_filter(&[1.0], &[1.0, -0.5], &input).unwrap();
        assert_eq!(output, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_normalizes_by_leading_feedback() {
        let input = [2.0, 4.0];
        let output = apply_filter(&[1.0], &[2.0], &input).unwrap();
        assert_eq!(output, vec![1.0, 2.0]);
    }

    #[test]
    fn test_output_length_matches_input() {
        let taps = vec![0.0f32; 64];
        let mut feedback = taps.clone();
        feedback[0] = 1.0;
        for len in [0, 1, 10, 100] {
            let input = vec![1.0; len];
            let output = apply_filter(&taps, &feedback, &input).unwrap();
            assert_eq!(output.len(), len, "Output length should equal input length");
        }
    }

    #[test]
    fn test_rejects_degenerate_feedback() {
        assert!(matches!(
            apply_filter(&[1.0], &[], &[1.0]),
            Err(ReverbError::InvalidParameter(_))
        ));
        assert!(matches!(
            apply_filter(&[1.0], &[0.0, 1.0], &[1.0]),
            Err(ReverbError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_starts_from_silence_every_call() {
        let feedforward = [1.0];
        let feedback = [1.0, -0.9];
        let input = [1.0, 0.5, -0.25];
        let first = apply_filter(&feedforward, &feedback, &input).unwrap();
        let second = apply_filter(&feedforward, &feedback, &input).unwrap();
        assert_eq!(first, second, "No state should carry over between calls");
    }
}
