//! Classifier boundary.
//!
//! An [`InferenceEngine`] takes one 96×96 [`SampleBuffer`] and returns the
//! "target present" output in whatever representation the model uses.
//! [`EngineOutput::confidence`] turns that into a probability in `[0, 1]`.

use turret_types::{SampleBuffer, TurretError};

/// Raw classifier output for the "target present" class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineOutput {
    /// Already a probability.
    Probability(f32),
    /// Unsigned 8-bit quantized output: `(value - zero_point) * scale`.
    QuantizedU8 { value: u8, scale: f32, zero_point: i32 },
    /// Signed 8-bit quantized output: `(value - zero_point) * scale`.
    QuantizedI8 { value: i8, scale: f32, zero_point: i32 },
}

impl EngineOutput {
    /// The output as a probability clamped to `[0, 1]`.  Non-finite values
    /// map to `0.0`.
    pub fn confidence(&self) -> f32 {
        let raw = match *self {
            EngineOutput::Probability(p) => p,
            EngineOutput::QuantizedU8 {
                value,
                scale,
                zero_point,
            } => (i32::from(value) - zero_point) as f32 * scale,
            EngineOutput::QuantizedI8 {
                value,
                scale,
                zero_point,
            } => (i32::from(value) - zero_point) as f32 * scale,
        };
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// A binary image classifier.
///
/// Engines are moved onto a worker thread by
/// [`TimedEngine`][crate::timed::TimedEngine], hence the `Send` bound.
pub trait InferenceEngine: Send {
    /// Stable identifier, e.g. `"person_detect_v2"`.
    fn id(&self) -> &str;

    /// Classify one sample.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ScoreUnavailable`] if the model cannot produce
    /// an output for this input.
    fn infer(&mut self, input: &SampleBuffer) -> Result<EngineOutput, TurretError>;
}
