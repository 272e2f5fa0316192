//! TOML configuration file loading
//!
//! Supports `~/.config/aria/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of
//! defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AriaConfigFile {
    /// Speech-model inference server
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Voice activity gating
    #[serde(default)]
    pub vad: VadFileConfig,

    /// Turn execution budgets
    #[serde(default)]
    pub turn: TurnFileConfig,

    /// Amplitude visualization
    #[serde(default)]
    pub amplitude: AmplitudeFileConfig,

    /// Local audio devices
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// HTTP API server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Priming context injected ahead of each turn
    #[serde(default)]
    pub context: Option<String>,

    /// Speak a greeting when a session starts
    #[serde(default)]
    pub greet_on_start: Option<bool>,
}

/// Inference server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    /// WebSocket URL (e.g. "ws://127.0.0.1:8998")
    pub server_url: Option<String>,
}

/// Voice activity gate tuning
#[derive(Debug, Default, Deserialize)]
pub struct VadFileConfig {
    /// RMS speech threshold
    pub threshold: Option<f32>,

    /// Debounce frames to enter speech
    pub min_speech_frames: Option<usize>,

    /// Debounce frames to leave speech
    pub min_silence_frames: Option<usize>,

    /// Secondary-model confidence threshold
    pub confidence_threshold: Option<f32>,

    /// Borderline band cap as a multiple of the threshold
    pub pre_filter_ratio: Option<f32>,
}

/// Turn execution tuning
#[derive(Debug, Default, Deserialize)]
pub struct TurnFileConfig {
    /// Generator step budget per turn
    pub max_steps: Option<usize>,

    /// Maximum continuation frames after input ends
    pub max_response_frames: Option<usize>,

    /// Audio-less steps that end the continuation
    pub end_silence_steps: Option<usize>,

    /// Token ids meaning "no text this step"
    pub text_pad_tokens: Option<Vec<u32>>,
}

/// Amplitude visualization tuning
#[derive(Debug, Default, Deserialize)]
pub struct AmplitudeFileConfig {
    /// RMS multiplier before clamping to [0,1]
    pub scale: Option<f32>,
}

/// Local audio configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Enable capture/playback
    pub enabled: Option<bool>,

    /// WAV archive directory for generated turns
    pub archive_dir: Option<String>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `AriaConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> AriaConfigFile {
    let Some(path) = config_file_path() else {
        return AriaConfigFile::default();
    };

    if !path.exists() {
        return AriaConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                AriaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            AriaConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/aria/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("aria").join("config.toml"))
}
