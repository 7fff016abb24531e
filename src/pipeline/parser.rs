//! Score parser
//!
//! Format: one step per line, whitespace-separated tokens
//!
//! Tokens:
//! - Note:        `C4`, `C#4`, `Db4`, ... played at the current position
//! - Instrument:  any loaded instrument name, selects it from here on
//! - Spacing:     `j:<samples>`, samples to advance per line from here on
//!
//! Every line, including blank ones, advances the position by the current
//! spacing once all of its tokens are handled. Notes sharing a line start
//! together.

use std::fmt;

use thiserror::Error;

use crate::pipeline::instrument::{Registry, ResolveError};
use crate::pipeline::note::parse_note_name;
use crate::wav::Wav;

/// Samples per line before any `j:` directive (a quarter second at 44.1kHz)
pub const DEFAULT_SPACING: usize = 11025;

/// Largest accepted spacing (one hour at 44.1kHz)
pub const MAX_SPACING: usize = 44100 * 60 * 60;

const SPACING_PREFIX: &str = "j:";

/// Playback state threaded through every line of a score
#[derive(Debug, Clone, PartialEq)]
pub struct ParserState {
    /// 0-based line counter
    pub line: usize,
    /// Instrument that notes are played on
    pub instrument_name: String,
    /// Volume multiplier. Not applied by the renderer.
    pub volume: f64,
    /// Output position in samples
    pub position: usize,
    /// Samples to advance after each line
    pub spacing: usize,
}

impl ParserState {
    pub fn new(instrument_name: impl Into<String>, spacing: usize) -> Self {
        Self {
            line: 0,
            instrument_name: instrument_name.into(),
            volume: 1.0,
            position: 0,
            spacing,
        }
    }
}

/// A recognised score token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Note { name: &'a str, pitch: u8 },
    Instrument(&'a str),
    Spacing(usize),
}

/// Recoverable score problems; the token is skipped
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("unknown token {0:?}")]
    UnknownToken(String),

    #[error("bad token {0:?}")]
    BadSpacing(String),

    #[error("spacing must be positive in {0:?}")]
    ZeroSpacing(String),

    #[error("spacing in {0:?} is above the limit of {MAX_SPACING} samples")]
    SpacingTooLarge(String),

    #[error("couldn't play {token:?}: {source}")]
    Placement {
        token: String,
        #[source]
        source: ResolveError,
    },
}

/// A score problem with the line it happened on
#[derive(Debug)]
pub struct Diagnostic {
    /// 0-based line number
    pub line: usize,
    pub error: ScoreError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Work out what a token means
///
/// Anything shaped like a note name is a note, even if an instrument has
/// the same name.
pub fn classify<'a>(token: &'a str, registry: &Registry) -> Result<Token<'a>, ScoreError> {
    if let Ok(pitch) = parse_note_name(token) {
        return Ok(Token::Note { name: token, pitch });
    }

    if registry.contains(token) {
        return Ok(Token::Instrument(token));
    }

    if let Some(value) = token.strip_prefix(SPACING_PREFIX) {
        return match value.parse::<usize>() {
            Ok(0) => Err(ScoreError::ZeroSpacing(token.to_string())),
            Ok(spacing) if spacing > MAX_SPACING => {
                Err(ScoreError::SpacingTooLarge(token.to_string()))
            }
            Ok(spacing) => Ok(Token::Spacing(spacing)),
            Err(_) => Err(ScoreError::BadSpacing(token.to_string())),
        };
    }

    Err(ScoreError::UnknownToken(token.to_string()))
}

/// Runs score lines against a registry, placing notes when given an output
pub struct ScoreParser<'r> {
    registry: &'r Registry,
    state: ParserState,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> ScoreParser<'r> {
    /// Start at the top of a score on the registry's default instrument
    pub fn new(registry: &'r Registry, spacing: usize) -> Self {
        let instrument = registry.default_instrument().unwrap_or_default();
        Self::with_state(registry, ParserState::new(instrument, spacing))
    }

    pub fn with_state(registry: &'r Registry, state: ParserState) -> Self {
        Self {
            registry,
            state,
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Finish, returning the final state and everything reported on the way
    pub fn finish(self) -> (ParserState, Vec<Diagnostic>) {
        (self.state, self.diagnostics)
    }

    /// Handle every line of `score`
    pub fn run(&mut self, score: &str, mut output: Option<&mut Wav>) -> Result<(), ResolveError> {
        for line in score.lines() {
            self.handle_line(line, output.as_deref_mut())?;
        }
        Ok(())
    }

    /// Handle one line, then advance to the next
    ///
    /// Without an output, notes only take up time. The only error returned
    /// is a missing reference sample, which means the registry is broken;
    /// everything else becomes a diagnostic.
    pub fn handle_line(&mut self, line: &str, mut output: Option<&mut Wav>) -> Result<(), ResolveError> {
        for token in line.split_whitespace() {
            match classify(token, self.registry) {
                Ok(Token::Note { name, .. }) => {
                    if let Some(output) = output.as_deref_mut() {
                        self.place(name, output)?;
                    }
                }
                Ok(Token::Instrument(name)) => self.state.instrument_name = name.to_string(),
                Ok(Token::Spacing(spacing)) => self.state.spacing = spacing,
                Err(error) => self.report(error),
            }
        }

        self.state.line += 1;
        // Saturates so an oversized score fails the length check instead
        self.state.position = self.state.position.saturating_add(self.state.spacing);
        Ok(())
    }

    fn place(&mut self, note: &str, output: &mut Wav) -> Result<(), ResolveError> {
        match self.registry.resolve(&self.state.instrument_name, note) {
            Ok(sample) => {
                output.add(self.state.position, &sample);
                Ok(())
            }
            Err(fatal @ ResolveError::NoReference { .. }) => Err(fatal),
            Err(source) => {
                self.report(ScoreError::Placement {
                    token: note.to_string(),
                    source,
                });
                Ok(())
            }
        }
    }

    fn report(&mut self, error: ScoreError) {
        self.diagnostics.push(Diagnostic {
            line: self.state.line,
            error,
        });
    }
}
