use serde::{Deserialize, Serialize};

/// Delay times in ms, combs first, then all-passes
pub const DEFAULT_DELAY_TIMES_MS: [f64; 6] = [25.0, 30.0, 35.0, 40.0, 25.0, 50.0];
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_AMOUNT: f32 = 0.5;
pub const DEFAULT_NUM_COMBS: usize = 4;
pub const DEFAULT_COMB_DAMPENING: f32 = 0.5;
pub const DEFAULT_NUM_ALLPASSES: usize = 2;
pub const DEFAULT_ALLPASS_ATTENUATION: f32 = 0.5;

/// Configuration for a Schroeder reverberator.
///
/// `comb_dampening` and `allpass_attenuation` are the user facing decay
/// amounts. The filters run with their complements (`1 - value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    pub sample_rate: u32,
    /// Dry/wet mix, 0 is fully dry and 1 fully wet. Not clamped.
    pub amount: f32,
    pub num_combs: usize,
    pub comb_dampening: f32,
    pub num_allpasses: usize,
    pub allpass_attenuation: f32,
    /// Needs at least `num_combs + num_allpasses` entries.
    pub delay_times: Vec<f64>,
    /// Run the comb bank on scoped worker threads.
    pub parallel_combs: bool,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            amount: DEFAULT_AMOUNT,
            num_combs: DEFAULT_NUM_COMBS,
            comb_dampening: DEFAULT_COMB_DAMPENING,
            num_allpasses: DEFAULT_NUM_ALLPASSES,
            allpass_attenuation: DEFAULT_ALLPASS_ATTENUATION,
            delay_times: DEFAULT_DELAY_TIMES_MS.to_vec(),
            parallel_combs: false,
        }
    }
}

impl ReverbConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Number of delay times the pipeline will consume
    pub fn stage_count(&self) -> usize {
        self.num_combs + self.num_allpasses
    }
}
