//! Aria - full-duplex voice conversation engine for AI assistants
//!
//! This library provides the streaming audio pipeline of a voice
//! assistant built on a full-duplex speech model:
//! - Fixed-size frame segmentation and VAD-gated turn boundaries
//! - The per-frame codec + autoregressive generation step loop
//! - Amplitude extraction for UI visualization
//! - Mu-law 8kHz ⇄ f32 24kHz conversion for telephony calls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Interfaces                       │
//! │   Microphone/Speakers  │  Telephony WebSocket       │
//! └────────────┬───────────────────────┬────────────────┘
//!              │ 24kHz f32             │ mu-law 8kHz
//!              │                ┌──────▼───────┐
//!              │                │  Telephony   │
//!              │                │   Bridge     │
//! ┌────────────▼────────────────┴──────────────┐
//! │              TurnEngine                     │
//! │   FrameBuffer → VAD → encode → step → decode│
//! └────────────────────┬────────────────────────┘
//!                      │ WebSocket (codes, text, PCM)
//! ┌────────────────────▼────────────────────────┐
//! │         Speech-model inference server        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod codec;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod events;
pub mod generator;
pub mod moshi;
pub mod telephony;

pub use audio::{FRAME_SIZE, SAMPLE_RATE};
pub use config::Config;
pub use daemon::Daemon;
pub use engine::{ConversationState, TurnConfig, TurnEngine};
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus, TurnRecord};
