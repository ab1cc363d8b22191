#![warn(clippy::all, rust_2018_idioms)]

mod allpass;
mod comb;
mod delay_line;
mod error;
mod reverb;

pub use allpass::AllPassFilter;
pub use comb::CombFilter;
pub use delay_line::{apply_filter, samples_for_delay, Coefficients, DelayFilter, DelaySpec};
pub use error::{ReverbError, Result};
pub use reverb::{Reverberator, Stage};
pub use reverb_types::ReverbConfig;
