//! Conversation turn engine
//!
//! Orchestrates frame buffer → VAD gate → codec → generator → codec across
//! a turn: IDLE→LISTENING until the gate reports the end of a sustained
//! utterance, THINKING while the finalized segment is fed through the
//! model, SPEAKING from the first decoded output frame, back to LISTENING
//! when generation ends. Codec or generator failures latch the ERROR state;
//! the engine is then dead and must be re-created by the caller — model
//! reload is an explicit, user-visible operation, never a hidden retry.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::audio::{
    AmplitudeConfig, AmplitudeSample, AmplitudeSink, AudioFrame, Direction, FrameBuffer, NullSink,
    VadConfig, VoiceActivityGate,
};
use crate::codec::SpeechCodec;
use crate::events::{EngineEvent, EventBus, TurnRecord};
use crate::generator::{GeneratorSession, SpeechModel, StepOutput};
use crate::{Error, Result};

/// Conversation state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Engine constructed, session not started
    Idle,
    /// Gating input audio, waiting for an utterance
    Listening,
    /// Feeding a finalized utterance through the model
    Thinking,
    /// Model is producing audio
    Speaking,
    /// Unrecoverable codec/model failure; engine requires re-creation
    Error,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Turn execution configuration
///
/// The step and frame counts are tuned defaults, not protocol
/// requirements.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Generator step budget per turn (125 frames ≈ 10s)
    pub max_steps: usize,

    /// Maximum silence-fed continuation frames after input is exhausted
    pub max_response_frames: usize,

    /// Consecutive audio-less continuation steps that end the turn
    pub end_silence_steps: usize,

    /// Token ids meaning "no text produced this step"
    pub text_pad_tokens: Vec<u32>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_steps: 125,
            max_response_frames: 125,
            end_silence_steps: 10,
            text_pad_tokens: vec![0, 3],
        }
    }
}

/// The conversation turn orchestrator
///
/// One engine owns one generator session; concurrent calls each get their
/// own engine+session pair and share nothing.
pub struct TurnEngine {
    state: ConversationState,
    buffer: FrameBuffer,
    gate: VoiceActivityGate,
    codec: Arc<dyn SpeechCodec>,
    model: Arc<dyn SpeechModel>,
    session: Option<Box<dyn GeneratorSession>>,
    turn: TurnConfig,
    amplitude: AmplitudeConfig,
    sink: Arc<dyn AmplitudeSink>,
    events: EventBus,
    pending_context: Option<String>,
    utterance: Vec<AudioFrame>,
    output: VecDeque<f32>,
}

impl TurnEngine {
    /// Create an engine in the IDLE state
    #[must_use]
    pub fn new(
        codec: Arc<dyn SpeechCodec>,
        model: Arc<dyn SpeechModel>,
        events: EventBus,
        turn: TurnConfig,
        vad: VadConfig,
        amplitude: AmplitudeConfig,
    ) -> Self {
        Self {
            state: ConversationState::Idle,
            buffer: FrameBuffer::new(),
            gate: VoiceActivityGate::new(vad),
            codec,
            model,
            session: None,
            turn,
            amplitude,
            sink: Arc::new(NullSink),
            events,
            pending_context: None,
            utterance: Vec::new(),
            output: VecDeque::new(),
        }
    }

    /// Publish per-frame amplitude samples to `sink`
    #[must_use]
    pub fn with_amplitude_sink(mut self, sink: Arc<dyn AmplitudeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a gate with a secondary confidence model
    #[must_use]
    pub fn with_gate(mut self, gate: VoiceActivityGate) -> Self {
        self.gate = gate;
        self
    }

    /// Inject priming text consumed at the start of the next turn
    ///
    /// Carries persona preamble or recalled-memory context; it is not
    /// spoken literally.
    pub fn set_turn_context(&mut self, text: impl Into<String>) {
        self.pending_context = Some(text.into());
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.state
    }

    /// Create the generator session and begin listening
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be created; the engine stays
    /// IDLE and the call may be retried.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            ConversationState::Idle => {}
            ConversationState::Error => {
                return Err(Error::EngineDead("engine is in the error state".to_string()));
            }
            _ => return Ok(()),
        }

        let session = self.model.create_generator(self.turn.max_steps).await?;
        self.session = Some(session);
        self.transition(ConversationState::Listening);
        Ok(())
    }

    /// Feed input audio; returns the records of any turns completed while
    /// processing it
    ///
    /// # Errors
    ///
    /// Returns error if the engine is not listening, or on a fatal
    /// codec/generator failure (which latches the ERROR state).
    pub async fn push_audio(&mut self, chunk: &[f32]) -> Result<Vec<TurnRecord>> {
        self.ensure_listening()?;
        self.buffer.push(chunk);

        let mut completed = Vec::new();
        while let Some(frame) = self.buffer.pop_frame() {
            if let Some(record) = self.process_frame(frame).await? {
                completed.push(record);
            }
        }
        Ok(completed)
    }

    /// End-of-stream: pad the trailing partial frame and finalize any
    /// utterance in progress
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::push_audio`].
    pub async fn flush(&mut self) -> Result<Option<TurnRecord>> {
        self.ensure_listening()?;

        let mut completed = None;
        if let Some(frame) = self.buffer.flush() {
            completed = self.process_frame(frame).await?;
        }
        if completed.is_none() && !self.utterance.is_empty() {
            let frames = std::mem::take(&mut self.utterance);
            completed = Some(self.run_turn(frames).await?);
        }
        Ok(completed)
    }

    /// Generate speech with no user input at all (session greeting)
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::push_audio`].
    pub async fn generate_greeting(&mut self) -> Result<TurnRecord> {
        self.ensure_listening()?;
        tracing::debug!("generating greeting");
        self.run_turn(Vec::new()).await
    }

    /// Drain all generated audio queued for playback
    pub fn take_output(&mut self) -> Vec<f32> {
        self.output.drain(..).collect()
    }

    /// Generated samples currently queued
    #[must_use]
    pub fn queued_output(&self) -> usize {
        self.output.len()
    }

    fn ensure_listening(&self) -> Result<()> {
        match self.state {
            ConversationState::Listening => Ok(()),
            ConversationState::Error => {
                Err(Error::EngineDead("engine is in the error state".to_string()))
            }
            state => Err(Error::Config(format!(
                "engine is {state}; call start() before feeding audio"
            ))),
        }
    }

    /// Gate one frame; runs a turn when it closes an utterance
    async fn process_frame(&mut self, frame: AudioFrame) -> Result<Option<TurnRecord>> {
        self.sink.publish(AmplitudeSample {
            direction: Direction::Input,
            level: self.amplitude.level(frame.samples()),
        });

        let speaking = match self.gate.process_frame(&frame) {
            Ok(speaking) => speaking,
            Err(e) => return Err(self.fail(e)),
        };

        if speaking {
            self.utterance.push(frame);
            return Ok(None);
        }

        if self.utterance.is_empty() {
            return Ok(None);
        }

        // speech → silence: the utterance is finalized
        let frames = std::mem::take(&mut self.utterance);
        tracing::debug!(frames = frames.len(), "utterance finalized");
        self.run_turn(frames).await.map(Some)
    }

    /// Execute one turn: feed the utterance, then let the model finish
    #[allow(clippy::too_many_lines)]
    async fn run_turn(&mut self, frames: Vec<AudioFrame>) -> Result<TurnRecord> {
        self.transition(ConversationState::Thinking);

        let id = Uuid::new_v4();
        let started_at = Utc::now();
        self.events.publish(EngineEvent::TurnStarted { id });

        let input_peak = frames
            .iter()
            .map(|f| self.amplitude.level(f.samples()))
            .fold(0.0f32, f32::max);

        if let Some(context) = self.pending_context.take() {
            let result = self.session_mut()?.inject_text(&context).await;
            if let Err(e) = result {
                return Err(self.fail(e));
            }
        }

        let mut text = String::new();
        let mut audio: Vec<f32> = Vec::new();
        let mut output_peak = 0.0f32;
        let mut steps = 0usize;
        let mut truncated = false;

        // feed the finalized utterance, one frame per step
        for frame in &frames {
            let codes = match self.codec.encode(frame).await {
                Ok(codes) => codes,
                Err(e) => return Err(self.fail(e)),
            };

            match self.session_mut()?.step(&codes).await {
                Ok(out) => {
                    steps += 1;
                    if let Err(e) = self
                        .absorb(out, &mut text, &mut audio, &mut output_peak)
                        .await
                    {
                        return Err(self.fail(e));
                    }
                }
                Err(Error::StepBudgetExhausted(taken)) => {
                    tracing::debug!(steps = taken, "step budget exhausted mid-utterance");
                    truncated = true;
                    break;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        // response continuation: silence-feed until the model finishes
        if !truncated {
            let mut quiet_steps = 0usize;
            for _ in 0..self.turn.max_response_frames {
                match self.session_mut()?.step_silence().await {
                    Ok(out) => {
                        steps += 1;
                        let produced_audio = out.codes.is_some();
                        if let Err(e) = self
                            .absorb(out, &mut text, &mut audio, &mut output_peak)
                            .await
                        {
                            return Err(self.fail(e));
                        }

                        if produced_audio {
                            quiet_steps = 0;
                        } else {
                            quiet_steps += 1;
                            if quiet_steps >= self.turn.end_silence_steps {
                                break;
                            }
                        }
                    }
                    Err(Error::StepBudgetExhausted(taken)) => {
                        tracing::debug!(steps = taken, "step budget exhausted in continuation");
                        truncated = true;
                        break;
                    }
                    Err(e) => return Err(self.fail(e)),
                }
            }
        }

        let record = TurnRecord {
            id,
            started_at,
            completed_at: Utc::now(),
            text,
            audio,
            steps,
            input_peak,
            output_peak,
            truncated,
        };

        tracing::info!(
            turn = %id,
            steps,
            truncated,
            text_len = record.text.len(),
            audio_samples = record.audio.len(),
            "turn complete"
        );

        self.events.publish(EngineEvent::TurnComplete(record.clone()));
        self.gate.reset();
        self.transition(ConversationState::Listening);
        Ok(record)
    }

    /// Fold one step's output into the turn
    async fn absorb(
        &mut self,
        out: StepOutput,
        text: &mut String,
        audio: &mut Vec<f32>,
        output_peak: &mut f32,
    ) -> Result<()> {
        if let Some(token) = out.token {
            if !self.turn.text_pad_tokens.contains(&token.id) {
                if let Some(piece) = token.piece {
                    text.push_str(&piece);
                }
            }
        }

        if let Some(codes) = out.codes {
            let frame = self.codec.decode(&codes).await?;

            if self.state == ConversationState::Thinking {
                self.transition(ConversationState::Speaking);
            }

            let level = self.amplitude.level(frame.samples());
            *output_peak = output_peak.max(level);
            self.sink.publish(AmplitudeSample {
                direction: Direction::Output,
                level,
            });

            audio.extend_from_slice(frame.samples());
            self.output.extend(frame.samples().iter().copied());
        }

        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut (dyn GeneratorSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| Error::EngineDead("generator session missing".to_string()))
    }

    /// Latch the ERROR state; the engine is dead from here on
    fn fail(&mut self, e: Error) -> Error {
        tracing::error!(error = %e, "fatal pipeline error; engine requires re-initialization");
        self.session = None;
        self.utterance.clear();
        self.transition(ConversationState::Error);
        e
    }

    fn transition(&mut self, to: ConversationState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, "state transition");
        self.events.publish(EngineEvent::StateChanged { from, to });
    }
}
