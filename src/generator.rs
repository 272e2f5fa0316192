//! Autoregressive speech generation seam
//!
//! A generator session owns the model's incremental state for one
//! conversation turn stream. Steps are the quantized unit of work: one
//! input [`CodeFrame`] in, one predicted text token and (optionally) one
//! output [`CodeFrame`] out, issued once per 80ms of conversation time.
//! Steps must be strictly sequential on one session; batching, reordering,
//! or skipping steps corrupts the model's internal timing.

use async_trait::async_trait;

use crate::Result;
use crate::codec::CodeFrame;

/// One predicted text token
#[derive(Debug, Clone)]
pub struct TextToken {
    /// Vocabulary id
    pub id: u32,
    /// Decoded text piece, when the model server provides one
    pub piece: Option<String>,
}

/// Result of a single generator step
///
/// `token: None` and `codes: None` are expected empty results, not errors:
/// early steps of a turn may be silent while the model is still priming.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub token: Option<TextToken>,
    pub codes: Option<CodeFrame>,
}

/// Mutable autoregressive state for one session
///
/// Never share a session across concurrent turns; one session is one
/// single-threaded sequential stream of `step` calls. There is no per-step
/// timeout: a partial or abandoned step corrupts the state, so callers
/// bound turn duration with the `max_steps` budget instead.
#[async_trait]
pub trait GeneratorSession: Send {
    /// Advance the model by one input frame
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StepBudgetExhausted`] once `max_steps`
    /// steps have been taken, or a fatal generator error.
    async fn step(&mut self, input: &CodeFrame) -> Result<StepOutput>;

    /// Advance the model with an all-zero input frame
    ///
    /// Used to let the model finish speaking after real input is
    /// exhausted, and to generate a greeting with no user input at all.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::step`].
    async fn step_silence(&mut self) -> Result<StepOutput>;

    /// Inject priming text (persona preamble, recalled memory) ahead of
    /// generation; not spoken literally
    ///
    /// # Errors
    ///
    /// Returns error if the model rejects the text; fatal to the turn.
    async fn inject_text(&mut self, text: &str) -> Result<()>;

    /// Steps taken so far on this session
    fn steps_taken(&self) -> usize;

    /// The step budget this session was created with
    fn max_steps(&self) -> usize;
}

/// Handle to the loaded speech model
///
/// The model itself is process-wide and effectively read-only after
/// initialization; only sessions carry mutable state.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Allocate fresh generator state sized to `max_steps` frames
    ///
    /// # Errors
    ///
    /// Returns error if session state cannot be allocated.
    async fn create_generator(&self, max_steps: usize) -> Result<Box<dyn GeneratorSession>>;
}
