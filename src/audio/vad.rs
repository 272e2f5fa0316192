//! Voice activity gating
//!
//! Classifies the frame stream into speech/silence with energy
//! thresholding and hysteresis, so clicks don't open the gate and brief
//! pauses don't cut an utterance short. An optional secondary confidence
//! model confirms borderline frames.

use crate::Result;
use crate::audio::frame::AudioFrame;

/// Voice activity gate configuration
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// RMS energy above which a frame is a speech candidate
    pub threshold: f32,

    /// Consecutive speech frames required to enter SPEECH (~400ms at 80ms frames)
    pub min_speech_frames: usize,

    /// Consecutive quiet frames required to return to SILENCE (~800ms)
    pub min_silence_frames: usize,

    /// Confidence the secondary model must report for a borderline frame
    pub confidence_threshold: f32,

    /// Upper bound of the borderline band, as a multiple of `threshold`;
    /// frames louder than this count as speech without consulting the model
    pub pre_filter_ratio: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            min_speech_frames: 5,
            min_silence_frames: 10,
            confidence_threshold: 0.5,
            pre_filter_ratio: 3.0,
        }
    }
}

/// Gate classification state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No sustained speech
    Silence,
    /// Sustained speech in progress
    Speech,
}

/// Secondary speech/non-speech confirmation model
///
/// Only consulted for frames in the borderline energy band; obvious
/// silence never reaches it.
pub trait ConfidenceModel: Send {
    /// Speech confidence in [0,1] for one frame
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot score the frame; the error is
    /// fatal to the current turn, never swallowed.
    fn confidence(&mut self, frame: &AudioFrame) -> Result<f32>;
}

/// Energy-hysteresis voice activity gate
pub struct VoiceActivityGate {
    config: VadConfig,
    state: GateState,
    speech_run: usize,
    silence_run: usize,
    confidence: Option<Box<dyn ConfidenceModel>>,
}

impl VoiceActivityGate {
    /// Create a gate in the SILENCE state
    #[must_use]
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: GateState::Silence,
            speech_run: 0,
            silence_run: 0,
            confidence: None,
        }
    }

    /// Enable hybrid mode with a secondary confidence model
    #[must_use]
    pub fn with_confidence_model(mut self, model: Box<dyn ConfidenceModel>) -> Self {
        self.confidence = Some(model);
        self
    }

    /// Classify one frame and return whether speech is currently sustained
    ///
    /// # Errors
    ///
    /// Returns error if the secondary confidence model fails.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> Result<bool> {
        let energy = frame.rms();
        let is_speech = self.classify(frame, energy)?;

        if is_speech {
            self.speech_run += 1;
            self.silence_run = 0;
        } else {
            self.silence_run += 1;
            self.speech_run = 0;
        }

        match self.state {
            GateState::Silence if self.speech_run >= self.config.min_speech_frames => {
                tracing::debug!(energy, frames = self.speech_run, "speech started");
                self.state = GateState::Speech;
            }
            GateState::Speech if self.silence_run >= self.config.min_silence_frames => {
                tracing::debug!(frames = self.silence_run, "speech ended");
                self.state = GateState::Silence;
            }
            _ => {}
        }

        Ok(self.state == GateState::Speech)
    }

    /// Instantaneous frame classification, before hysteresis
    fn classify(&mut self, frame: &AudioFrame, energy: f32) -> Result<bool> {
        if energy <= self.config.threshold {
            return Ok(false);
        }

        // Borderline band: amplitude alone is not conclusive, ask the
        // secondary model when one is configured.
        if let Some(model) = self.confidence.as_mut() {
            if energy < self.config.threshold * self.config.pre_filter_ratio {
                let score = model.confidence(frame)?;
                tracing::trace!(energy, score, "borderline frame scored");
                return Ok(score > self.config.confidence_threshold);
            }
        }

        Ok(true)
    }

    /// Return to SILENCE and clear both counters
    ///
    /// Called at the start of every turn so state never leaks across turns.
    pub fn reset(&mut self) {
        self.state = GateState::Silence;
        self.speech_run = 0;
        self.silence_run = 0;
    }

    /// Current gate state
    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }
}
