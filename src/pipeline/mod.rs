//! Score rendering pipeline
//!
//! - Note: Parse note names into pitch indices
//! - Instrument: Sample banks with nearest-sample stretching
//! - Parser: Score line state machine
//! - Scheduler: Two-pass rendering of a score into a track

pub mod instrument;
pub mod note;
pub mod parser;
pub mod scheduler;

pub use instrument::{DefineError, Instrument, Registry, ResolveError};
pub use note::{frequency, parse_note_name, NoteError};
pub use parser::{Diagnostic, ParserState, ScoreError, ScoreParser, Token};
pub use scheduler::{render_project, Pipeline, PipelineConfig, PipelineError};
