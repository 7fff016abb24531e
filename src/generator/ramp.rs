use super::{GeneratorState, SignalGenerator};

/// A linear gain ramp between two levels
///
/// Moves from `start` to `end` over a fixed number of samples, then holds
/// `end`. Used to shape fades over the tail of a rendered track.
pub struct RampGenerator {
    /// Current sample position
    position: usize,
    /// Total duration in samples
    duration: usize,
    start: f32,
    end: f32,
    /// Whether the generator has completed
    completed: bool,
}

impl RampGenerator {
    /// Create a new ramp generator
    ///
    /// # Arguments
    /// * `duration_samples` - Duration of the ramp in samples
    /// * `start` - Level of the first sample
    /// * `end` - Level of the last sample, held afterwards
    ///
    /// # Example
    /// ```
    /// use trackmaker::generator::RampGenerator;
    ///
    /// let fade = RampGenerator::new(44100, 1.0, 0.0); // 1 second fade-out at 44.1kHz
    /// ```
    pub fn new(duration_samples: usize, start: f32, end: f32) -> Self {
        Self {
            position: 0,
            duration: duration_samples.max(1), // Ensure at least 1 sample
            start,
            end,
            completed: false,
        }
    }

    /// A ramp from full level down to silence
    pub fn fade_out(duration_samples: usize) -> Self {
        Self::new(duration_samples, 1.0, 0.0)
    }
}

impl SignalGenerator for RampGenerator {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        if self.completed {
            buffer.fill(self.end);
            return GeneratorState::Complete;
        }

        let remaining = self.duration.saturating_sub(self.position);
        let span = (self.duration - 1).max(1) as f32;

        for (i, sample) in buffer.iter_mut().enumerate() {
            if i < remaining {
                let t = (self.position + i) as f32 / span;
                *sample = self.start + (self.end - self.start) * t;
            } else {
                *sample = self.end;
            }
        }

        self.position += buffer.len();

        if self.position >= self.duration {
            self.completed = true;
            GeneratorState::Complete
        } else {
            GeneratorState::Running
        }
    }
}
