//! Note names and pitch indices
//!
//! Format: `<letter><octave>`, `<letter><accidental><octave>` or
//! `<letter><octave><accidental>`
//!
//! - Letters: c, d, e, f, g, a, b (either case)
//! - Accidentals: `#` raises a semitone, `b` lowers one
//! - Octaves: 0-9, with C4 = 60 (middle C)
//!
//! Examples: `C4`, `C#4`, `C4#`, `Db4`, `D4b`

use std::str::FromStr;
use std::sync::LazyLock;

use thiserror::Error;

/// Number of addressable pitches (MIDI note numbers 0-127)
pub const PITCH_COUNT: usize = 128;

/// Pitch index of A4, the tuning reference
const A4: usize = 69;
const A4_FREQUENCY: f64 = 440.0;

/// Equal-tempered frequency of every pitch index
static FREQUENCIES: LazyLock<[f64; PITCH_COUNT]> = LazyLock::new(|| {
    let mut table = [0.0; PITCH_COUNT];
    for (index, freq) in table.iter_mut().enumerate() {
        *freq = A4_FREQUENCY * 2f64.powf((index as f64 - A4 as f64) / 12.0);
    }
    table
});

/// Note name errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("note name {0:?} has the wrong length")]
    Length(String),
    #[error("note name {0:?} has no accidental in the expected place")]
    Format(String),
    #[error("note name {0:?} has an invalid octave")]
    Octave(String),
    #[error("note name {0:?} has an invalid letter")]
    Letter(String),
    #[error("note name {0:?} is outside the range 0-127")]
    Range(String),
}

/// Natural pitch classes (note letters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PitchClass {
    /// Semitones above C (C=0, D=2, E=4, ...)
    pub fn semitone(&self) -> u8 {
        match self {
            PitchClass::C => 0,
            PitchClass::D => 2,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::G => 7,
            PitchClass::A => 9,
            PitchClass::B => 11,
        }
    }

    fn from_letter(letter: u8) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            b'C' => Some(PitchClass::C),
            b'D' => Some(PitchClass::D),
            b'E' => Some(PitchClass::E),
            b'F' => Some(PitchClass::F),
            b'G' => Some(PitchClass::G),
            b'A' => Some(PitchClass::A),
            b'B' => Some(PitchClass::B),
            _ => None,
        }
    }
}

impl FromStr for PitchClass {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [letter] => Self::from_letter(*letter).ok_or_else(|| NoteError::Letter(s.to_string())),
            _ => Err(NoteError::Letter(s.to_string())),
        }
    }
}

fn accidental(c: u8) -> Option<i32> {
    match c {
        b'#' => Some(1),
        b'b' => Some(-1),
        _ => None,
    }
}

/// Parse a note name into a pitch index (0-127)
///
/// Only the shape of the token is checked, so this also answers "is this
/// token a note?" for the score parser.
pub fn parse_note_name(name: &str) -> Result<u8, NoteError> {
    let bytes = name.as_bytes();

    let (letter, octave, shift) = match *bytes {
        [letter, octave] => (letter, octave, 0),
        [letter, mid, last] => {
            if let Some(shift) = accidental(mid) {
                (letter, last, shift)
            } else if let Some(shift) = accidental(last) {
                (letter, mid, shift)
            } else {
                return Err(NoteError::Format(name.to_string()));
            }
        }
        _ => return Err(NoteError::Length(name.to_string())),
    };

    if !octave.is_ascii_digit() {
        return Err(NoteError::Octave(name.to_string()));
    }
    let base = 12 * (i32::from(octave - b'0') + 1);

    let pitch_class =
        PitchClass::from_letter(letter).ok_or_else(|| NoteError::Letter(name.to_string()))?;

    let index = base + i32::from(pitch_class.semitone()) + shift;
    u8::try_from(index)
        .ok()
        .filter(|&i| (i as usize) < PITCH_COUNT)
        .ok_or_else(|| NoteError::Range(name.to_string()))
}

/// Frequency in Hz of a pitch index
///
/// # Panics
/// If `index` is 128 or above.
pub fn frequency(index: u8) -> f64 {
    FREQUENCIES[index as usize]
}

/// Spell a pitch index with sharps, e.g. 61 -> `C#4`
///
/// Indices 0-11 sit below octave 0 and are spelled with octave `-1`.
pub fn note_name(index: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = i32::from(index / 12) - 1;
    format!("{}{}", NAMES[(index % 12) as usize], octave)
}
