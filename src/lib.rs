//! Renders text scores into WAV tracks from sampled instruments.

pub mod generator;
pub mod pipeline;
pub mod wav;
