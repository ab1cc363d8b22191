use itertools::Itertools;
use log::{debug, warn};
use reverb_types::ReverbConfig;

use crate::allpass::AllPassFilter;
use crate::comb::CombFilter;
use crate::delay_line::{DelayFilter, DelaySpec};
use crate::error::{ReverbError, Result};

/// One entry of the processing pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Comb(CombFilter),
    AllPass(AllPassFilter),
}

impl Stage {
    pub fn delay(&self) -> &DelaySpec {
        match self {
            Stage::Comb(filter) => filter.delay(),
            Stage::AllPass(filter) => filter.delay(),
        }
    }

    fn as_comb(&self) -> Option<&CombFilter> {
        match self {
            Stage::Comb(filter) => Some(filter),
            Stage::AllPass(_) => None,
        }
    }

    fn as_allpass(&self) -> Option<&AllPassFilter> {
        match self {
            Stage::AllPass(filter) => Some(filter),
            Stage::Comb(_) => None,
        }
    }
}

/// Schroeder reverb
///
/// A bank of comb filters runs in parallel on the dry input, their average is
/// diffused by a chain of all-pass filters, and the result is blended with the
/// dry signal. Everything is fixed at construction and processing keeps no
/// state between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Reverberator {
    sample_rate: u32,
    amount: f32,
    num_combs: usize,
    num_allpasses: usize,
    // Gains the filters run with, the complements of the configured amounts
    comb_dampening: f32,
    allpass_attenuation: f32,

    // Combs first, then all-passes
    pipeline: Vec<Stage>,
    parallel_combs: bool,
}

impl Reverberator {
    /// Builds the pipeline from `delay_times` (ms), combs first.
    ///
    /// `comb_dampening` and `allpass_attenuation` are decay amounts; the
    /// filters get `1 - value`. None of `amount`, `comb_dampening` or
    /// `allpass_attenuation` are clamped.
    pub fn configure(
        sample_rate: u32,
        amount: f32,
        num_combs: usize,
        comb_dampening: f32,
        num_allpasses: usize,
        allpass_attenuation: f32,
        delay_times: &[f64],
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ReverbError::InvalidParameter(
                "sample rate must be positive".to_string(),
            ));
        }
        let stages = num_combs + num_allpasses;
        if delay_times.len() < stages {
            return Err(ReverbError::InvalidParameter(format!(
                "{num_combs} combs and {num_allpasses} all-passes need {stages} delay times, got {}",
                delay_times.len()
            )));
        }

        let effective_dampening = 1.0 - comb_dampening;
        let effective_attenuation = 1.0 - allpass_attenuation;
        if !(0.0..=1.0).contains(&amount) {
            warn!("amount {amount} is outside [0, 1]");
        }
        warn_if_unstable("comb dampening", comb_dampening, effective_dampening);
        warn_if_unstable("all-pass attenuation", allpass_attenuation, effective_attenuation);
        if num_combs == 0 {
            warn!("Reverberator has no comb filters, the wet signal will be silent");
        }

        let (comb_delays, allpass_delays) = delay_times[..stages].split_at(num_combs);
        let mut pipeline = Vec::with_capacity(stages);
        for &delay in comb_delays {
            pipeline.push(Stage::Comb(CombFilter::new(delay, sample_rate)?));
        }
        for &delay in allpass_delays {
            pipeline.push(Stage::AllPass(AllPassFilter::new(delay, sample_rate)?));
        }
        check_layout(&pipeline, num_combs)?;

        debug!(
            "Reverberator at {sample_rate} Hz, delays in samples: [{}]",
            pipeline
                .iter()
                .map(|stage| stage.delay().delay_in_samples())
                .join(", ")
        );

        Ok(Self {
            sample_rate,
            amount,
            num_combs,
            num_allpasses,
            comb_dampening: effective_dampening,
            allpass_attenuation: effective_attenuation,
            pipeline,
            parallel_combs: false,
        })
    }

    pub fn from_config(config: &ReverbConfig) -> Result<Self> {
        let reverb = Self::configure(
            config.sample_rate,
            config.amount,
            config.num_combs,
            config.comb_dampening,
            config.num_allpasses,
            config.allpass_attenuation,
            &config.delay_times,
        )?;
        Ok(reverb.with_parallel_combs(config.parallel_combs))
    }

    /// Run the comb bank on scoped worker threads. Output is unchanged.
    pub fn with_parallel_combs(mut self, parallel: bool) -> Self {
        self.parallel_combs = parallel;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn num_combs(&self) -> usize {
        self.num_combs
    }

    pub fn num_allpasses(&self) -> usize {
        self.num_allpasses
    }

    /// Feedback gain the combs run with
    pub fn comb_dampening(&self) -> f32 {
        self.comb_dampening
    }

    /// Coefficient the all-passes run with
    pub fn allpass_attenuation(&self) -> f32 {
        self.allpass_attenuation
    }

    pub fn pipeline(&self) -> &[Stage] {
        &self.pipeline
    }

    fn combs(&self) -> impl Iterator<Item = &CombFilter> {
        self.pipeline[..self.num_combs]
            .iter()
            .filter_map(Stage::as_comb)
    }

    fn allpasses(&self) -> impl Iterator<Item = &AllPassFilter> {
        self.pipeline[self.num_combs..]
            .iter()
            .filter_map(Stage::as_allpass)
    }

    /// Average of every comb filter run on `input`.
    pub fn comb_bank(&self, input: &[f32]) -> Result<Vec<f32>> {
        let outputs = if self.parallel_combs && self.num_combs > 1 {
            self.comb_outputs_parallel(input)?
        } else {
            self.combs()
                .map(|comb| comb.process_buffer(input, self.comb_dampening))
                .collect::<Result<Vec<_>>>()?
        };
        average(&outputs, input.len())
    }

    fn comb_outputs_parallel(&self, input: &[f32]) -> Result<Vec<Vec<f32>>> {
        let dampening = self.comb_dampening;
        let joined = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = self
                .combs()
                .map(|comb| scope.spawn(move |_| comb.process_buffer(input, dampening)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Result<Vec<_>>>()
        });
        joined.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }

    /// Process one mono buffer.
    pub fn process_buffer(&self, input: &[f32]) -> Result<Vec<f32>> {
        debug!("Processing {} samples", input.len());

        let mut wet = self.comb_bank(input)?;
        for allpass in self.allpasses() {
            wet = allpass.process_buffer(&wet, self.allpass_attenuation)?;
        }

        if wet.len() < input.len() {
            return Err(ReverbError::InvalidState(format!(
                "wet signal has {} samples, shorter than the {} dry samples",
                wet.len(),
                input.len()
            )));
        }

        // Dry is zero padded up to the wet length
        let dry_level = 1.0 - self.amount;
        Ok(wet
            .iter()
            .zip_longest(input)
            .map(|pair| {
                let (wet_sample, dry_sample) = pair.or(&0.0, &0.0);
                wet_sample * self.amount + dry_sample * dry_level
            })
            .collect())
    }

    /// Process each channel on its own, as separate `process_buffer` calls.
    pub fn process_channels(&self, channels: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        channels
            .iter()
            .map(|channel| self.process_buffer(channel))
            .collect()
    }
}

fn average(buffers: &[Vec<f32>], len: usize) -> Result<Vec<f32>> {
    let mut sum = vec![0.0; len];
    if buffers.is_empty() {
        return Ok(sum);
    }
    for buffer in buffers {
        if buffer.len() != len {
            return Err(ReverbError::InvalidState(format!(
                "comb output has {} samples, expected {len}",
                buffer.len()
            )));
        }
        for (acc, sample) in sum.iter_mut().zip(buffer) {
            *acc += sample;
        }
    }
    let count = buffers.len() as f32;
    sum.iter_mut().for_each(|sample| *sample /= count);
    Ok(sum)
}

/// Combs must all come before the all-passes
fn check_layout(pipeline: &[Stage], num_combs: usize) -> Result<()> {
    if num_combs > pipeline.len() {
        return Err(ReverbError::InvalidState(format!(
            "pipeline has {} stages, fewer than its {num_combs} combs",
            pipeline.len()
        )));
    }
    let (combs, allpasses) = pipeline.split_at(num_combs);
    if let Some(index) = combs.iter().position(|stage| stage.as_comb().is_none()) {
        return Err(ReverbError::InvalidState(format!(
            "stage {index} should be a comb filter"
        )));
    }
    if let Some(index) = allpasses
        .iter()
        .position(|stage| stage.as_allpass().is_none())
    {
        return Err(ReverbError::InvalidState(format!(
            "stage {} should be an all-pass filter",
            num_combs + index
        )));
    }
    Ok(())
}

/// Feedback gains in `[0, 1)` decay; anything else rings forever or grows.
fn is_decaying_gain(gain: f32) -> bool {
    (0.0..1.0).contains(&gain)
}

fn warn_if_unstable(name: &str, configured: f32, gain: f32) {
    if !is_decaying_gain(gain) {
        warn!("{name} {configured} gives a filter gain of {gain}, output will not decay");
    }
}
