//! Shared test utilities
//!
//! Hardware-free fakes for the codec and model seams, plus signal
//! generators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use aria_voice::SAMPLE_RATE;
use aria_voice::audio::AudioFrame;
use aria_voice::codec::{CodeFrame, SpeechCodec};
use aria_voice::generator::{GeneratorSession, SpeechModel, StepOutput, TextToken};
use aria_voice::{Error, Result};

/// Generate sine wave audio samples at the model rate
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn sine(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Codec fake that quantizes frame energy into the codes
///
/// Encoding silence yields all-zero codes, and decoding all-zero codes
/// yields silence, so the silence round-trip property holds.
pub struct FakeCodec {
    codebooks: usize,
}

impl FakeCodec {
    #[must_use]
    pub fn new() -> Self {
        Self { codebooks: 8 }
    }
}

impl Default for FakeCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechCodec for FakeCodec {
    fn codebooks(&self) -> usize {
        self.codebooks
    }

    async fn encode(&self, frame: &AudioFrame) -> Result<CodeFrame> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let code = (frame.rms() * 1000.0).round() as u32;
        let rows: Vec<Vec<u32>> = (0..self.codebooks).map(|_| vec![code]).collect();
        CodeFrame::from_rows(&rows)
    }

    async fn decode(&self, codes: &CodeFrame) -> Result<AudioFrame> {
        let widened = codes.widened(self.codebooks);
        let code = widened
            .code(0, 0)
            .ok_or_else(|| Error::Codec("empty code frame".to_string()))?;

        #[allow(clippy::cast_precision_loss)]
        let amplitude = code as f32 / 1000.0;
        Ok(AudioFrame::from_padded(&vec![
            amplitude;
            aria_voice::FRAME_SIZE
        ]))
    }
}

/// A codec that always fails, for ERROR-state tests
pub struct FailingCodec;

#[async_trait]
impl SpeechCodec for FailingCodec {
    fn codebooks(&self) -> usize {
        8
    }

    async fn encode(&self, _frame: &AudioFrame) -> Result<CodeFrame> {
        Err(Error::Codec("synthetic encode failure".to_string()))
    }

    async fn decode(&self, _codes: &CodeFrame) -> Result<AudioFrame> {
        Err(Error::Codec("synthetic decode failure".to_string()))
    }
}

/// Scripted model fake
///
/// Each session: `silent_prefix` audio-less priming steps, then
/// `speak_steps` steps that produce one audio code frame each (and one
/// text piece while any remain), then quiet steps forever. Pad tokens use
/// id 3 between pieces.
#[derive(Clone)]
pub struct FakeModel {
    pub silent_prefix: usize,
    pub speak_steps: usize,
    pub pieces: Vec<&'static str>,
    /// Total successful steps across all sessions
    pub steps: Arc<AtomicUsize>,
    /// Text injected via `inject_text`, across all sessions
    pub injected: Arc<Mutex<Vec<String>>>,
}

impl FakeModel {
    #[must_use]
    pub fn new(silent_prefix: usize, speak_steps: usize) -> Self {
        Self {
            silent_prefix,
            speak_steps,
            pieces: vec!["hello ", "there"],
            steps: Arc::new(AtomicUsize::new(0)),
            injected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechModel for FakeModel {
    async fn create_generator(&self, max_steps: usize) -> Result<Box<dyn GeneratorSession>> {
        Ok(Box::new(FakeSession {
            model: self.clone(),
            taken: 0,
            max_steps,
            spoken: 0,
            emitted_pieces: 0,
        }))
    }
}

pub struct FakeSession {
    model: FakeModel,
    taken: usize,
    max_steps: usize,
    spoken: usize,
    emitted_pieces: usize,
}

impl FakeSession {
    fn advance(&mut self) -> Result<StepOutput> {
        if self.taken >= self.max_steps {
            return Err(Error::StepBudgetExhausted(self.taken));
        }
        self.taken += 1;
        self.model.steps.fetch_add(1, Ordering::SeqCst);

        if self.taken <= self.model.silent_prefix || self.spoken >= self.model.speak_steps {
            // priming or finished speaking: pad token, no audio
            return Ok(StepOutput {
                token: Some(TextToken {
                    id: 3,
                    piece: None,
                }),
                codes: None,
            });
        }

        self.spoken += 1;
        let token = if self.emitted_pieces < self.model.pieces.len() {
            let piece = self.model.pieces[self.emitted_pieces];
            self.emitted_pieces += 1;
            TextToken {
                id: 100,
                piece: Some(piece.to_string()),
            }
        } else {
            TextToken {
                id: 3,
                piece: None,
            }
        };

        // constant-energy audio: FakeCodec decodes code 200 to 0.2
        let rows: Vec<Vec<u32>> = (0..8).map(|_| vec![200]).collect();
        Ok(StepOutput {
            token: Some(token),
            codes: Some(CodeFrame::from_rows(&rows)?),
        })
    }
}

#[async_trait]
impl GeneratorSession for FakeSession {
    async fn step(&mut self, _input: &CodeFrame) -> Result<StepOutput> {
        self.advance()
    }

    async fn step_silence(&mut self) -> Result<StepOutput> {
        self.advance()
    }

    async fn inject_text(&mut self, text: &str) -> Result<()> {
        self.model
            .injected
            .lock()
            .expect("injected lock")
            .push(text.to_string());
        Ok(())
    }

    fn steps_taken(&self) -> usize {
        self.taken
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }
}
