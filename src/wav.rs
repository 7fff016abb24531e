//! Stereo sample buffers and WAV file I/O
//!
//! `Wav` is the sample container the renderer works with: instrument
//! samples are loaded into it, stretched copies are derived from it, and
//! the output track is mixed into one and saved as 16-bit PCM.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use crate::generator::{GeneratorState, RampGenerator, SignalGenerator};

/// Number of interleaved channels in every buffer
pub const CHANNELS: usize = 2;

/// One stereo frame: `[left, right]`
pub type Frame = [f32; CHANNELS];

/// Frames of gain computed at a time while fading
const FADE_FRAME_SIZE: usize = 64;

/// Errors from reading or writing WAV files
#[derive(Debug, Error)]
pub enum WavError {
    #[error("couldn't decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("{}: unsupported channel count {channels}", .path.display())]
    Channels { path: PathBuf, channels: u16 },

    #[error("{}: unsupported sample format {bits}-bit {format:?}", .path.display())]
    Format {
        path: PathBuf,
        format: SampleFormat,
        bits: u16,
    },

    #[error("couldn't write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// A stereo buffer of `f32` frames in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct Wav {
    frames: Vec<Frame>,
    sample_rate: u32,
}

impl Wav {
    /// Create a silent buffer of `frame_count` frames
    pub fn new(frame_count: usize, sample_rate: u32) -> Self {
        Self {
            frames: vec![[0.0; CHANNELS]; frame_count],
            sample_rate,
        }
    }

    /// Wrap existing frames
    pub fn from_frames(frames: Vec<Frame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    /// Load a PCM WAV file
    ///
    /// Integer formats up to 32 bits and 32-bit float are accepted. Mono
    /// files are spread to both channels.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        let path = path.as_ref();
        let decode = |source| WavError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = WavReader::open(path).map_err(decode)?;
        let spec = reader.spec();

        let channels = spec.channels as usize;
        if channels == 0 || channels > CHANNELS {
            return Err(WavError::Channels {
                path: path.to_path_buf(),
                channels: spec.channels,
            });
        }

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode)?,
            (SampleFormat::Int, bits @ 1..=32) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode)?
            }
            (format, bits) => {
                return Err(WavError::Format {
                    path: path.to_path_buf(),
                    format,
                    bits,
                })
            }
        };

        let frames = samples
            .chunks_exact(channels)
            .map(|c| if channels == 1 { [c[0], c[0]] } else { [c[0], c[1]] })
            .collect();

        Ok(Self {
            frames,
            sample_rate: spec.sample_rate,
        })
    }

    /// Write the buffer as a 16-bit PCM stereo WAV file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WavError> {
        let path = path.as_ref();
        write_wav_16bit(path, &self.frames, self.sample_rate).map_err(|source| WavError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Largest absolute sample value over both channels
    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .flat_map(|f| f.iter())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Produce a copy played back at a different speed
    ///
    /// The copy is `ratio` times as long as the original, so a ratio below
    /// 1.0 raises the pitch and a ratio above 1.0 lowers it. Frames are
    /// linearly interpolated between neighbouring source frames.
    pub fn stretched_relative(&self, ratio: f64) -> Wav {
        let source_len = self.frames.len();
        if source_len == 0 || !ratio.is_finite() || ratio <= 0.0 {
            return self.clone();
        }

        let new_len = ((source_len as f64 * ratio).round() as usize).max(1);
        let step = 1.0 / ratio;
        let last = source_len - 1;

        let frames = (0..new_len)
            .map(|i| {
                let pos = i as f64 * step;
                let index = (pos as usize).min(last);
                let next = (index + 1).min(last);
                let frac = (pos - index as f64).clamp(0.0, 1.0) as f32;

                let a = self.frames[index];
                let b = self.frames[next];
                [a[0] + (b[0] - a[0]) * frac, a[1] + (b[1] - a[1]) * frac]
            })
            .collect();

        Wav {
            frames,
            sample_rate: self.sample_rate,
        }
    }

    /// Mix all of `source` into this buffer starting at frame `offset`
    ///
    /// The buffer grows with silence when `source` runs past its end.
    pub fn add(&mut self, offset: usize, source: &Wav) {
        let end = offset + source.frames.len();
        if end > self.frames.len() {
            self.frames.resize(end, [0.0; CHANNELS]);
        }

        for (dst, src) in self.frames[offset..end].iter_mut().zip(&source.frames) {
            dst[0] += src[0];
            dst[1] += src[1];
        }
    }

    /// Fade the last `count` frames linearly down to silence
    pub fn fade_samples(&mut self, count: usize) {
        let count = count.min(self.frames.len());
        if count == 0 {
            return;
        }

        let start = self.frames.len() - count;
        let mut ramp = RampGenerator::fade_out(count);
        let mut gains = [0.0f32; FADE_FRAME_SIZE];

        for chunk in self.frames[start..].chunks_mut(FADE_FRAME_SIZE) {
            let gains = &mut gains[..chunk.len()];
            let state = ramp.process(gains);

            for (frame, gain) in chunk.iter_mut().zip(gains.iter()) {
                frame[0] *= gain;
                frame[1] *= gain;
            }

            if state == GeneratorState::Complete {
                break;
            }
        }
    }
}

/// Write a 16-bit PCM stereo WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `frames` - Stereo frames (f32, range [-1.0, 1.0], clamped)
/// * `sample_rate` - Sample rate in Hz (only for header)
pub fn write_wav_16bit(path: &Path, frames: &[Frame], sample_rate: u32) -> hound::Result<()> {
    let spec = WavSpec {
        channels: CHANNELS as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for frame in frames {
        for &sample in frame {
            writer.write_sample(to_i16(sample))?;
        }
    }
    writer.finalize()
}

fn to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        // -1.0 maps to i16::MIN
        (clamped * -(i16::MIN as f32)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ramp_wav(len: usize) -> Wav {
        let frames = (0..len).map(|i| [i as f32, -(i as f32)]).collect();
        Wav::from_frames(frames, 44100)
    }

    #[test]
    fn test_new_is_silent() {
        let wav = Wav::new(100, 44100);
        assert_eq!(wav.frame_count(), 100);
        assert_eq!(wav.peak(), 0.0);
    }

    #[test]
    fn test_save_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let wav = Wav::from_frames(vec![[1.0, -1.0], [0.5, -0.5], [0.0, 0.0]], 44100);
        wav.save(&path).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");

        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.duration(), 3);
        assert_eq!(reader.len(), 6);
    }

    #[test]
    fn test_save_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clamp.wav");
        Wav::from_frames(vec![[2.0, -2.0], [0.5, -0.5]], 44100)
            .save(&path)
            .unwrap();

        let samples: Vec<i16> = WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(samples, vec![i16::MAX, i16::MIN, to_i16(0.5), to_i16(-0.5)]);
    }

    #[test]
    fn test_save_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let err = Wav::new(4, 44100).save(&path).unwrap_err();
        assert!(matches!(err, WavError::Write { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reload.wav");
        let wav = Wav::from_frames(vec![[0.5, -0.25], [0.0, 1.0]], 22050);
        wav.save(&path).unwrap();

        let loaded = Wav::load(&path).unwrap();
        assert_eq!(loaded.sample_rate(), 22050);
        assert_eq!(loaded.frame_count(), 2);
        for (a, b) in loaded.frames().iter().zip(wav.frames()) {
            assert!((a[0] - b[0]).abs() < 1e-3);
            assert!((a[1] - b[1]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_load_mono_spreads_to_both_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-16384i16).unwrap();
        writer.finalize().unwrap();

        let wav = Wav::load(&path).unwrap();
        assert_eq!(wav.frames(), &[[0.5, 0.5], [-0.5, -0.5]]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Wav::load("/nonexistent/definitely/missing.wav").unwrap_err();
        assert!(matches!(err, WavError::Decode { .. }));
    }

    #[test]
    fn test_load_rejects_surround() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.wav");
        let spec = hound::WavSpec {
            channels: 4,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let err = Wav::load(&path).unwrap_err();
        assert!(matches!(err, WavError::Channels { channels: 4, .. }));
    }

    #[test]
    fn test_stretch_length() {
        let wav = ramp_wav(100);
        assert_eq!(wav.stretched_relative(0.5).frame_count(), 50);
        assert_eq!(wav.stretched_relative(2.0).frame_count(), 200);
        assert_eq!(wav.stretched_relative(1.0), wav);
    }

    #[test]
    fn test_stretch_interpolates() {
        let wav = ramp_wav(10);

        // Twice as long: every other frame falls halfway between two source frames
        let slow = wav.stretched_relative(2.0);
        assert_eq!(slow.frames()[2], [1.0, -1.0]);
        assert_eq!(slow.frames()[3], [1.5, -1.5]);

        // Half as long: skips every other source frame
        let fast = wav.stretched_relative(0.5);
        assert_eq!(fast.frames()[1], [2.0, -2.0]);
        assert_eq!(fast.frames()[4], [8.0, -8.0]);
    }

    #[test]
    fn test_add_mixes_at_offset() {
        let mut target = Wav::new(10, 44100);
        let source = Wav::from_frames(vec![[0.25, 0.5]; 3], 44100);

        target.add(2, &source);
        target.add(3, &source);

        assert_eq!(target.frame_count(), 10);
        assert_eq!(target.frames()[1], [0.0, 0.0]);
        assert_eq!(target.frames()[2], [0.25, 0.5]);
        assert_eq!(target.frames()[3], [0.5, 1.0]);
        assert_eq!(target.frames()[5], [0.25, 0.5]);
        assert_eq!(target.frames()[6], [0.0, 0.0]);
    }

    #[test]
    fn test_add_past_end_grows_buffer() {
        let mut target = Wav::new(4, 44100);
        let source = Wav::from_frames(vec![[0.1, 0.1]; 3], 44100);

        target.add(3, &source);
        assert_eq!(target.frame_count(), 6);
        assert_eq!(target.frames()[5], [0.1, 0.1]);
    }

    #[test]
    fn test_fade_samples() {
        let mut wav = Wav::from_frames(vec![[1.0, -1.0]; 20], 44100);
        wav.fade_samples(10);

        assert_eq!(wav.frames()[9], [1.0, -1.0]);
        assert_eq!(wav.frames()[10], [1.0, -1.0]);
        assert!(wav.frames()[15][0] < 1.0 && wav.frames()[15][0] > 0.0);
        assert_eq!(wav.frames()[19], [0.0, 0.0]);
    }

    #[test]
    fn test_fade_spans_several_frames() {
        // Not a multiple of the gain frame size
        let count = FADE_FRAME_SIZE * 3 + 7;
        let mut wav = Wav::from_frames(vec![[1.0, -1.0]; count + 5], 44100);
        wav.fade_samples(count);

        let tail = &wav.frames()[5..];
        assert_eq!(wav.frames()[4], [1.0, -1.0]);
        assert_eq!(tail[0], [1.0, -1.0]);
        assert_eq!(tail[count - 1], [0.0, 0.0]);
        for pair in tail.windows(2) {
            assert!(pair[1][0] < pair[0][0]);
            assert_eq!(pair[1][1], -pair[1][0]);
        }

        // Same curve as one ramp over the whole tail
        let mut gains = vec![0.0f32; count];
        RampGenerator::fade_out(count).process(&mut gains);
        for (frame, gain) in tail.iter().zip(gains) {
            assert!((frame[0] - gain).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fade_longer_than_buffer() {
        let mut wav = Wav::from_frames(vec![[1.0, 1.0]; 5], 44100);
        wav.fade_samples(44100);

        assert_eq!(wav.frames()[0], [1.0, 1.0]);
        assert_eq!(wav.frames()[4], [0.0, 0.0]);
    }
}
