//! Error types for the Aria voice engine

use thiserror::Error;

/// Result type alias for Aria operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or buffer error
    #[error("audio error: {0}")]
    Audio(String),

    /// Neural codec failure; fatal to the current turn
    #[error("codec error: {0}")]
    Codec(String),

    /// Generator/model failure; fatal to the current turn
    #[error("generator error: {0}")]
    Generator(String),

    /// The per-turn step budget is spent; treated as normal truncation
    #[error("step budget exhausted after {0} steps")]
    StepBudgetExhausted(usize),

    /// The engine entered the ERROR state and must be re-created
    #[error("conversation engine is dead: {0}")]
    EngineDead(String),

    /// Telephony payload conversion failure; the caller drops the packet
    #[error("telephony error: {0}")]
    Telephony(String),

    /// Model server transport error
    #[error("model transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
