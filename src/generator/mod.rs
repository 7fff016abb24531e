pub mod ramp;

pub use ramp::RampGenerator;

/// Represents the current state of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Generator is still producing samples
    Running,
    /// Generator has completed and will produce no more samples
    Complete,
}

/// Core trait for all signal generators
///
/// Signal generators fill a caller-owned buffer one frame at a time and
/// pick up where the previous frame ended.
pub trait SignalGenerator {
    /// Process the next frame of samples
    ///
    /// # Arguments
    /// * `buffer` - Mutable slice to write samples into. The length determines frame size.
    ///
    /// # Returns
    /// * `GeneratorState::Running` if the generator is still active
    /// * `GeneratorState::Complete` if the generator has finished
    ///
    /// # Note
    /// Even when Complete is returned, the buffer is still filled with valid samples
    /// (the final held value) for the current frame.
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState;
}
