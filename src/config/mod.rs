//! Configuration management
//!
//! Defaults overlaid with the optional TOML config file; the CLI applies
//! its own overrides on top. Every tuning knob the pipeline exposes
//! (VAD debounce, step budgets, amplitude scale) lives here rather than
//! as a hardcoded constant.

pub mod file;

use std::path::PathBuf;

use crate::audio::{AmplitudeConfig, VadConfig};
use crate::engine::TurnConfig;

/// Voice engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech-model inference server
    pub model: ModelConfig,

    /// Voice activity gating
    pub vad: VadConfig,

    /// Turn execution budgets
    pub turn: TurnConfig,

    /// Amplitude visualization scaling
    pub amplitude: AmplitudeConfig,

    /// Local audio devices
    pub audio: AudioConfig,

    /// HTTP API server
    pub server: ServerConfig,

    /// Opaque priming context injected ahead of each turn
    /// (persona preamble, recalled memory)
    pub context: Option<String>,

    /// Speak a greeting when a session starts
    pub greet_on_start: bool,
}

/// Speech-model inference server configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// WebSocket URL of the inference server
    pub server_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8998".to_string(),
        }
    }
}

/// Local audio device configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Enable microphone capture and speaker playback
    pub enabled: bool,

    /// Directory for WAV archives of generated turns
    pub archive_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            archive_dir: None,
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 18750 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            vad: VadConfig::default(),
            turn: TurnConfig::default(),
            amplitude: AmplitudeConfig::default(),
            audio: AudioConfig::default(),
            server: ServerConfig::default(),
            context: None,
            greet_on_start: false,
        }
    }
}

impl Config {
    /// Load defaults overlaid with the TOML config file
    #[must_use]
    pub fn load() -> Self {
        Self::from_file(file::load_config_file())
    }

    /// Apply a partial file overlay onto defaults
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_file(overlay: file::AriaConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(url) = overlay.model.server_url {
            config.model.server_url = url;
        }

        if let Some(threshold) = overlay.vad.threshold {
            config.vad.threshold = threshold;
        }
        if let Some(frames) = overlay.vad.min_speech_frames {
            config.vad.min_speech_frames = frames;
        }
        if let Some(frames) = overlay.vad.min_silence_frames {
            config.vad.min_silence_frames = frames;
        }
        if let Some(threshold) = overlay.vad.confidence_threshold {
            config.vad.confidence_threshold = threshold;
        }
        if let Some(ratio) = overlay.vad.pre_filter_ratio {
            config.vad.pre_filter_ratio = ratio;
        }

        if let Some(steps) = overlay.turn.max_steps {
            config.turn.max_steps = steps;
        }
        if let Some(frames) = overlay.turn.max_response_frames {
            config.turn.max_response_frames = frames;
        }
        if let Some(steps) = overlay.turn.end_silence_steps {
            config.turn.end_silence_steps = steps;
        }
        if let Some(tokens) = overlay.turn.text_pad_tokens {
            config.turn.text_pad_tokens = tokens;
        }

        if let Some(scale) = overlay.amplitude.scale {
            config.amplitude.scale = scale;
        }

        if let Some(enabled) = overlay.audio.enabled {
            config.audio.enabled = enabled;
        }
        if let Some(dir) = overlay.audio.archive_dir {
            config.audio.archive_dir = Some(PathBuf::from(dir));
        }

        if let Some(port) = overlay.server.port {
            config.server.port = port;
        }

        if let Some(context) = overlay.context {
            config.context = Some(context);
        }
        if let Some(greet) = overlay.greet_on_start {
            config.greet_on_start = greet;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.turn.max_steps, 125);
        assert_eq!(config.vad.min_speech_frames, 5);
        assert_eq!(config.vad.min_silence_frames, 10);
        assert!((config.vad.threshold - 0.02).abs() < f32::EPSILON);
        assert!(config.audio.enabled);
    }

    #[test]
    fn test_file_overlay() {
        let overlay: file::AriaConfigFile = toml::from_str(
            r#"
            greet_on_start = true

            [model]
            server_url = "ws://gpu-box:9000"

            [vad]
            threshold = 0.05

            [turn]
            max_steps = 250
            "#,
        )
        .unwrap();

        let config = Config::from_file(overlay);
        assert_eq!(config.model.server_url, "ws://gpu-box:9000");
        assert!((config.vad.threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.turn.max_steps, 250);
        assert!(config.greet_on_start);
        // untouched fields keep their defaults
        assert_eq!(config.turn.max_response_frames, 125);
    }
}
