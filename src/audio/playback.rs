//! Speaker playback
//!
//! A persistent output stream drains a lock-protected queue; the engine
//! enqueues decoded frames as they are generated and underruns play
//! silence. Stopping waits for the queue to drain rather than cutting
//! audio mid-word.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::audio::frame::SAMPLE_RATE;
use crate::{Error, Result};

/// Plays 24kHz mono audio to the default output device
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    queue: Arc<Mutex<VecDeque<f32>>>,
    stream: Option<Stream>,
}

impl AudioPlayback {
    /// Create a new playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports 24kHz mono or stereo.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: duplicate the mono signal into a stereo stream
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            device,
            config,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            stream: None,
        })
    }

    /// Start the output stream
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let queue = Arc::clone(&self.queue);
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match queue.lock() {
                        Ok(q) => q,
                        Err(_) => return,
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::warn!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio playback started");
        Ok(())
    }

    /// Queue samples for playback
    pub fn enqueue(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples.iter().copied());
        }
    }

    /// Number of samples still waiting to be played
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Wait until the queue is drained, up to `timeout`
    pub async fn drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.queued() > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(remaining = self.queued(), "playback drain timed out");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stop the output stream, discarding anything still queued
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            if let Ok(mut queue) = self.queue.lock() {
                queue.clear();
            }
            tracing::debug!("audio playback stopped");
        }
    }

    /// Whether the output stream is running
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.stream.is_some()
    }
}
