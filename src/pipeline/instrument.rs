//! Sampled instruments and the instrument registry
//!
//! An instrument is a sparse bank of recorded samples indexed by pitch.
//! Pitches without a recording are derived on demand by stretching the
//! nearest recorded sample, and the derived copy is cached on the
//! instrument so each pitch is stretched at most once.
//!
//! Definition file format, one sample per line:
//! `<instrument> <note> <sample path>`  (e.g. `piano G4 piano.ff.G4.wav`)

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::pipeline::note::{frequency, note_name, parse_note_name, NoteError, PITCH_COUNT};
use crate::wav::{Wav, WavError};

/// Failure to add one sample definition
#[derive(Debug, Error)]
pub enum DefineError {
    #[error(transparent)]
    Note(#[from] NoteError),
    #[error(transparent)]
    Load(#[from] WavError),
}

/// A definition line that couldn't be applied
#[derive(Debug, Error)]
#[error("couldn't add {} to {instrument}: {source}", .path.display())]
pub struct DefinitionFailure {
    /// 0-based line number in the definition file
    pub line: usize,
    pub instrument: String,
    pub path: PathBuf,
    #[source]
    pub source: DefineError,
}

/// Failure to find a sample for a note
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("couldn't find instrument {0:?}")]
    UnknownInstrument(String),
    #[error("instrument {0:?} has no samples")]
    EmptyInstrument(String),
    #[error(transparent)]
    Note(#[from] NoteError),
    /// No recorded sample anywhere in the pitch range. Instruments with at
    /// least one recording can't get here, so callers treat it as fatal.
    #[error("instrument {instrument:?} has no reference sample for pitch {pitch}")]
    NoReference { instrument: String, pitch: u8 },
}

/// A bank of samples for one instrument
#[derive(Debug, Default)]
pub struct Instrument {
    /// Samples loaded from files, by pitch index
    originals: BTreeMap<u8, Rc<Wav>>,
    /// Stretched copies of originals, filled in lazily while rendering
    derived: RefCell<BTreeMap<u8, Rc<Wav>>>,
}

impl Instrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a recorded sample at `pitch`, replacing any sample there
    pub fn add_original(&mut self, pitch: u8, sample: Wav) {
        self.derived.get_mut().remove(&pitch);
        self.originals.insert(pitch, Rc::new(sample));
    }

    /// True once at least one recorded sample is present
    pub fn is_ready(&self) -> bool {
        !self.originals.is_empty()
    }

    pub fn is_original(&self, pitch: u8) -> bool {
        self.originals.contains_key(&pitch)
    }

    /// Recorded samples in pitch order
    pub fn originals(&self) -> impl Iterator<Item = (u8, &Wav)> + '_ {
        self.originals.iter().map(|(&pitch, wav)| (pitch, wav.as_ref()))
    }

    /// Number of stretched copies cached so far
    pub fn derived_count(&self) -> usize {
        self.derived.borrow().len()
    }

    /// Sample at exactly `pitch`, recorded or previously derived
    pub fn sample(&self, pitch: u8) -> Option<Rc<Wav>> {
        if let Some(sample) = self.originals.get(&pitch) {
            return Some(Rc::clone(sample));
        }
        self.derived.borrow().get(&pitch).cloned()
    }

    /// Nearest pitch with a recorded sample
    ///
    /// Searches outwards from `pitch` one semitone at a time, checking
    /// below before above, so ties go to the lower pitch.
    pub fn nearest_original(&self, pitch: u8) -> Option<u8> {
        let pitch = pitch as usize;
        (1..PITCH_COUNT).find_map(|distance| {
            let below = pitch.checked_sub(distance);
            let above = Some(pitch + distance).filter(|&b| b < PITCH_COUNT);
            [below, above]
                .into_iter()
                .flatten()
                .map(|p| p as u8)
                .find(|p| self.originals.contains_key(p))
        })
    }

    /// Sample for `pitch`, stretching and caching the nearest recording if
    /// there is no sample at that exact pitch
    fn resolve_pitch(&self, name: &str, pitch: u8) -> Result<Rc<Wav>, ResolveError> {
        if let Some(sample) = self.sample(pitch) {
            return Ok(sample);
        }

        let reference = self
            .nearest_original(pitch)
            .ok_or_else(|| ResolveError::NoReference {
                instrument: name.to_string(),
                pitch,
            })?;

        let ratio = frequency(reference) / frequency(pitch);
        debug!(
            instrument = name,
            note = %note_name(pitch),
            reference = %note_name(reference),
            ratio,
            "stretching sample"
        );

        let stretched = Rc::new(self.originals[&reference].stretched_relative(ratio));
        self.derived.borrow_mut().insert(pitch, Rc::clone(&stretched));
        Ok(stretched)
    }
}

/// Instruments by name, plus the default instrument for a score
#[derive(Debug, Default)]
pub struct Registry {
    instruments: HashMap<String, Instrument>,
    default_instrument: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definition file text
    ///
    /// Sample paths are resolved against `base_dir`. Lines that don't have
    /// exactly three fields are skipped; lines that fail to parse or load
    /// are logged and returned, and the rest still load.
    pub fn load_definitions(text: &str, base_dir: &Path) -> (Self, Vec<DefinitionFailure>) {
        let mut registry = Self::new();
        let mut failures = Vec::new();

        for (line, content) in text.lines().enumerate() {
            let fields: Vec<&str> = content.split_whitespace().collect();
            let &[instrument, note, file] = fields.as_slice() else {
                continue;
            };

            let path = base_dir.join(file);
            if let Err(source) = registry.define(instrument, note, &path) {
                let failure = DefinitionFailure {
                    line,
                    instrument: instrument.to_string(),
                    path,
                    source,
                };
                warn!(line, "{failure}");
                failures.push(failure);
            }
        }

        (registry, failures)
    }

    /// Load a sample file as the recording of `note` for `instrument`
    ///
    /// The instrument is created on first reference even if the sample then
    /// fails to load, and the first instrument named becomes the default.
    pub fn define(&mut self, instrument: &str, note: &str, path: &Path) -> Result<(), DefineError> {
        self.entry(instrument);
        let pitch = parse_note_name(note)?;
        let sample = Wav::load(path)?;
        self.entry(instrument).add_original(pitch, sample);
        Ok(())
    }

    /// Add an already decoded sample as the recording of `note`
    pub fn insert_sample(&mut self, instrument: &str, note: &str, sample: Wav) -> Result<(), NoteError> {
        let pitch = parse_note_name(note)?;
        self.entry(instrument).add_original(pitch, sample);
        Ok(())
    }

    fn entry(&mut self, instrument: &str) -> &mut Instrument {
        if self.default_instrument.is_none() {
            self.default_instrument = Some(instrument.to_string());
        }
        self.instruments.entry(instrument.to_string()).or_default()
    }

    /// Find the sample to play for `note` on `instrument`
    pub fn resolve(&self, instrument: &str, note: &str) -> Result<Rc<Wav>, ResolveError> {
        let bank = self
            .instruments
            .get(instrument)
            .ok_or_else(|| ResolveError::UnknownInstrument(instrument.to_string()))?;

        if !bank.is_ready() {
            return Err(ResolveError::EmptyInstrument(instrument.to_string()));
        }

        let pitch = parse_note_name(note)?;
        bank.resolve_pitch(instrument, pitch)
    }

    pub fn get(&self, instrument: &str) -> Option<&Instrument> {
        self.instruments.get(instrument)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instrument)> + '_ {
        self.instruments.iter().map(|(name, bank)| (name.as_str(), bank))
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.instruments.contains_key(instrument)
    }

    /// First instrument named while loading definitions
    pub fn default_instrument(&self) -> Option<&str> {
        self.default_instrument.as_deref()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
