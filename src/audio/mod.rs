//! Audio processing module
//!
//! Frame segmentation, voice activity gating, amplitude extraction, and
//! the cpal capture/playback endpoints.

mod amplitude;
mod capture;
mod frame;
mod playback;
mod vad;

pub use amplitude::{AmplitudeConfig, AmplitudeSample, AmplitudeSink, ChannelSink, Direction, NullSink};
pub use capture::AudioCapture;
pub use frame::{AudioFrame, FRAME_SIZE, FrameBuffer, SAMPLE_RATE, rms};
pub use playback::AudioPlayback;
pub use vad::{ConfidenceModel, GateState, VadConfig, VoiceActivityGate};
