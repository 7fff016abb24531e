//! Timeline composer
//!
//! Renders a score in two passes over the same text. The first pass only
//! advances the parser to learn how long the track is; the second mixes
//! every note into a buffer allocated from that length. A fade-out tail is
//! appended and faded before the track is saved.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::instrument::{DefinitionFailure, Registry, ResolveError};
use crate::pipeline::parser::{Diagnostic, ScoreParser, DEFAULT_SPACING};
use crate::wav::{Wav, WavError};

/// Instrument definitions inside a project directory
pub const INSTRUMENTS_FILE: &str = "instruments.txt";
/// Score inside a project directory
pub const SCORE_FILE: &str = "score.txt";
/// Rendered track written into a project directory
pub const OUTPUT_FILE: &str = "trackmaker_output.wav";

/// Errors that stop a render
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("couldn't read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("track would be {frames} frames long, above the limit of {limit}")]
    TooLong { frames: usize, limit: usize },
}

/// Configuration for the renderer
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample rate in Hz of the output track
    pub sample_rate: u32,
    /// Samples per score line until a `j:` directive changes it
    pub spacing: usize,
    /// Length of the fade-out tail in samples
    pub fade_samples: usize,
    /// Longest track that will be allocated, fade included
    pub max_frames: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            spacing: DEFAULT_SPACING, // 250ms at 44.1kHz
            fade_samples: 44100,      // 1s at 44.1kHz
            max_frames: 44100 * 60 * 60, // 1 hour at 44.1kHz
        }
    }
}

/// A rendered track and what was reported while rendering it
#[derive(Debug)]
pub struct Rendered {
    pub wav: Wav,
    /// Length found by the measurement pass
    pub measured_length: usize,
    /// Score diagnostics from the render pass
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of rendering a project directory
#[derive(Debug)]
pub struct ProjectSummary {
    pub output_path: PathBuf,
    pub frame_count: usize,
    pub measured_length: usize,
    pub definition_failures: Vec<DefinitionFailure>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Renders scores against one instrument registry
pub struct Pipeline<'r> {
    config: PipelineConfig,
    registry: &'r Registry,
}

impl<'r> Pipeline<'r> {
    /// Create a new pipeline
    ///
    /// # Arguments
    /// * `config` - Pipeline configuration
    /// * `registry` - Instruments the score can play
    pub fn new(config: PipelineConfig, registry: &'r Registry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Measurement pass: the position after the last line of `score`
    pub fn measure(&self, score: &str) -> Result<usize, PipelineError> {
        let mut parser = ScoreParser::new(self.registry, self.config.spacing);
        parser.run(score, None)?;
        Ok(parser.state().position)
    }

    /// Frames to allocate for a measured score, fade tail included
    fn track_length(&self, measured_length: usize) -> Result<usize, PipelineError> {
        let limit = self.config.max_frames;
        let frames = measured_length.saturating_add(self.config.fade_samples);
        if frames > limit {
            return Err(PipelineError::TooLong { frames, limit });
        }
        Ok(frames)
    }

    /// Render `score` into a faded track
    ///
    /// The buffer is the measured length plus the fade tail. Notes that ring
    /// past the end grow it further; the fade always covers the final
    /// `fade_samples` frames.
    pub fn render(&self, score: &str) -> Result<Rendered, PipelineError> {
        let measured_length = self.measure(score)?;
        info!(samples = measured_length, "measured score");

        let mut wav = Wav::new(self.track_length(measured_length)?, self.config.sample_rate);

        let mut parser = ScoreParser::new(self.registry, self.config.spacing);
        parser.run(score, Some(&mut wav))?;
        let (_, diagnostics) = parser.finish();

        for diagnostic in &diagnostics {
            warn!("{diagnostic}");
        }

        wav.fade_samples(self.config.fade_samples);

        Ok(Rendered {
            wav,
            measured_length,
            diagnostics,
        })
    }

    /// Render `score` and write it to `output_path`
    pub fn generate_wav(&self, score: &str, output_path: &Path) -> Result<Rendered, PipelineError> {
        let rendered = self.render(score)?;
        rendered.wav.save(output_path)?;
        info!(
            path = %output_path.display(),
            frames = rendered.wav.frame_count(),
            peak = rendered.wav.peak(),
            "wrote track"
        );
        Ok(rendered)
    }
}

fn read(path: &Path) -> Result<String, PipelineError> {
    fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the project in `dir`
///
/// Reads `instruments.txt` and `score.txt` from `dir` and writes
/// `output_name` there. Sample paths in the definitions are relative to
/// `dir`.
pub fn render_project(
    dir: &Path,
    output_name: &str,
    config: PipelineConfig,
) -> Result<ProjectSummary, PipelineError> {
    let definitions = read(&dir.join(INSTRUMENTS_FILE))?;
    let score = read(&dir.join(SCORE_FILE))?;

    let (registry, definition_failures) = Registry::load_definitions(&definitions, dir);
    info!(
        instruments = registry.len(),
        default_instrument = registry.default_instrument().unwrap_or("<none>"),
        "loaded instruments"
    );

    for (name, instrument) in registry.iter() {
        for (pitch, sample) in instrument.originals() {
            if sample.sample_rate() != config.sample_rate {
                warn!(
                    instrument = name,
                    pitch,
                    rate = sample.sample_rate(),
                    "sample rate differs from output rate {}; it will play off-pitch",
                    config.sample_rate
                );
            }
        }
    }

    let output_path = dir.join(output_name);
    let rendered = Pipeline::new(config, &registry).generate_wav(&score, &output_path)?;

    Ok(ProjectSummary {
        output_path,
        frame_count: rendered.wav.frame_count(),
        measured_length: rendered.measured_length,
        definition_failures,
        diagnostics: rendered.diagnostics,
    })
}
