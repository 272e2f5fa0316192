//! Daemon - the assistant runtime
//!
//! Builds the model clients, spawns the API server, and runs the local
//! conversation loop: a cooperative task that polls the capture queue on a
//! bounded interval, feeds the engine, and streams generated audio to the
//! speakers. Cancellation lets the in-flight iteration finish, then drains
//! playback instead of cutting speech mid-word.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{ApiServer, ApiState};
use crate::audio::{AudioCapture, AudioPlayback, SAMPLE_RATE};
use crate::codec::SpeechCodec;
use crate::engine::TurnEngine;
use crate::events::{EventBus, TurnRecord};
use crate::generator::SpeechModel;
use crate::moshi::{MoshiCodec, MoshiModel};
use crate::{Config, Error, Result};

/// Poll interval for the conversation loop
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long shutdown waits for queued speech to finish playing
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The Aria daemon - orchestrates local audio and telephony calls
pub struct Daemon {
    config: Config,
    events: EventBus,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            events: EventBus::default(),
        }
    }

    /// The daemon's event bus, for UI/state subscribers
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run until the token is cancelled
    ///
    /// # Errors
    ///
    /// Returns error if the model server is unreachable, audio devices
    /// fail to open, or the engine dies.
    #[allow(clippy::future_not_send)]
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let codec = Arc::new(MoshiCodec::connect(&self.config.model.server_url).await?);
        let model = Arc::new(MoshiModel::new(self.config.model.server_url.clone()));
        tracing::info!(url = %self.config.model.server_url, "model server connected");

        let api = ApiServer::new(
            self.config.server.port,
            ApiState {
                codec: Arc::clone(&codec) as Arc<dyn SpeechCodec>,
                model: Arc::clone(&model) as Arc<dyn SpeechModel>,
                events: self.events.clone(),
                turn: self.config.turn.clone(),
                vad: self.config.vad.clone(),
                amplitude: self.config.amplitude.clone(),
                context: self.config.context.clone(),
            },
        );
        let _api_handle = api.spawn();

        if self.config.audio.enabled {
            // cpal streams aren't Send; the voice loop stays on this task
            self.run_voice_loop(codec, model, &shutdown).await?;
        } else {
            tracing::info!("local audio disabled - telephony-only mode");
            shutdown.cancelled().await;
        }

        tracing::info!("daemon stopped");
        Ok(())
    }

    /// The local microphone conversation loop
    #[allow(clippy::future_not_send)]
    async fn run_voice_loop(
        &self,
        codec: Arc<MoshiCodec>,
        model: Arc<MoshiModel>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let mut engine = TurnEngine::new(
            codec,
            model,
            self.events.clone(),
            self.config.turn.clone(),
            self.config.vad.clone(),
            self.config.amplitude.clone(),
        );
        if let Some(context) = &self.config.context {
            engine.set_turn_context(context.clone());
        }
        engine.start().await?;

        let mut capture = AudioCapture::new()?;
        let mut playback = AudioPlayback::new()?;
        capture.start()?;
        playback.start()?;
        tracing::info!("listening");

        if self.config.greet_on_start {
            let record = engine.generate_greeting().await?;
            playback.enqueue(&engine.take_output());
            self.archive_turn(&record);
        }

        let result = loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                () = tokio::time::sleep(POLL_INTERVAL) => {
                    let chunk = capture.take_buffer();
                    if !chunk.is_empty() {
                        match engine.push_audio(&chunk).await {
                            Ok(records) => {
                                for record in &records {
                                    self.archive_turn(record);
                                }
                            }
                            Err(e) => break Err(e),
                        }
                    }

                    playback.enqueue(&engine.take_output());
                }
            }
        };

        // stop listening first, let queued speech finish
        capture.stop();
        playback.drain(DRAIN_TIMEOUT).await;
        playback.stop();
        result
    }

    /// Archive a turn's generated audio as WAV, when configured
    fn archive_turn(&self, record: &TurnRecord) {
        let Some(dir) = &self.config.audio.archive_dir else {
            return;
        };
        if record.audio.is_empty() {
            return;
        }

        if let Err(e) = write_turn_wav(dir, record) {
            tracing::warn!(turn = %record.id, error = %e, "failed to archive turn");
        }
    }
}

/// Write a turn's generated audio as a 16-bit mono WAV
fn write_turn_wav(dir: &Path, record: &TurnRecord) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("turn-{}.wav", record.id));

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(&path, spec).map_err(|e| Error::Audio(e.to_string()))?;
    for &sample in &record.audio {
        #[allow(clippy::cast_possible_truncation)]
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    tracing::debug!(path = %path.display(), "turn archived");
    Ok(())
}
