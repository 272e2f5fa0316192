//! Telephony format bridge
//!
//! Converts between the telephone wire format (base64 mu-law, 8kHz) and
//! the model's native format (f32 PCM, 24kHz) so phone calls drive the
//! same conversation engine as local microphone audio. Conversion errors
//! are per-packet: the caller drops the packet and the call continues.

mod mulaw;
pub mod protocol;
mod resample;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::audio::FrameBuffer;
use crate::{Error, Result};

pub use mulaw::{linear_to_mulaw, mulaw_to_linear};
pub use resample::resample_exact;

/// Telephony sample rate (G.711)
pub const TELEPHONY_RATE: usize = 8_000;

/// Model sample rate
const MODEL_RATE: usize = 24_000;

/// Accumulates converted inbound audio until a full model frame exists
#[derive(Debug, Default)]
pub struct TelephonyBuffer {
    buffer: FrameBuffer,
}

impl TelephonyBuffer {
    /// Samples currently buffered
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Format converter between a telephony media stream and the engine
#[derive(Debug, Default)]
pub struct TelephonyBridge {
    inbound: TelephonyBuffer,
}

impl TelephonyBridge {
    /// Create a bridge with an empty inbound buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one base64 mu-law payload to model-format samples
    ///
    /// Returns exactly three output samples per input byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Telephony`] on malformed base64 or resampling
    /// failure; the caller should drop the packet and continue.
    pub fn to_model_format(&self, payload: &str) -> Result<Vec<f32>> {
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| Error::Telephony(format!("invalid payload base64: {e}")))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let linear: Vec<f32> = bytes
            .iter()
            .map(|&b| f32::from(mulaw_to_linear(b)) / 32768.0)
            .collect();

        resample_exact(&linear, TELEPHONY_RATE, MODEL_RATE)
    }

    /// Convert model-format samples to a base64 mu-law payload
    ///
    /// Returns exactly one mu-law byte per three input samples; a trailing
    /// remainder shorter than three samples is truncated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Telephony`] on resampling failure.
    pub fn from_model_format(&self, samples: &[f32]) -> Result<String> {
        let usable = samples.len() - samples.len() % 3;
        if usable == 0 {
            return Ok(String::new());
        }

        let telephony = resample_exact(&samples[..usable], MODEL_RATE, TELEPHONY_RATE)?;

        #[allow(clippy::cast_possible_truncation)]
        let bytes: Vec<u8> = telephony
            .iter()
            .map(|&s| linear_to_mulaw((s * 32767.0).clamp(-32768.0, 32767.0) as i16))
            .collect();

        Ok(BASE64.encode(bytes))
    }

    /// Decode one inbound payload into the frame accumulator
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::to_model_format`]; a failed packet leaves
    /// the buffer untouched.
    pub fn push_inbound(&mut self, payload: &str) -> Result<()> {
        let samples = self.to_model_format(payload)?;
        self.inbound.buffer.push(&samples);
        Ok(())
    }

    /// Take one model frame's worth of inbound samples, if available
    ///
    /// Call repeatedly to drain; partial trailing audio stays buffered for
    /// the next packet.
    pub fn pop_frame(&mut self) -> Option<Vec<f32>> {
        self.inbound
            .buffer
            .pop_frame()
            .map(|frame| frame.samples().to_vec())
    }

    /// Samples waiting for a full frame
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }
}
