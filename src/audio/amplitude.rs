//! Amplitude extraction for UI visualization
//!
//! Scaled RMS levels are published per frame through an injected sink so
//! the frame loop never blocks on a slow consumer.

use tokio::sync::mpsc;

use crate::audio::frame::rms;

/// Which side of the conversation a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// User/microphone audio
    Input,
    /// Generated/playback audio
    Output,
}

/// A visualization level in [0,1] for one frame
#[derive(Debug, Clone, Copy)]
pub struct AmplitudeSample {
    pub direction: Direction,
    pub level: f32,
}

/// Amplitude scaling configuration
///
/// The scale factor is cosmetic tuning for the meter, not a correctness
/// parameter.
#[derive(Debug, Clone)]
pub struct AmplitudeConfig {
    /// Multiplier applied to RMS before clamping to [0,1]
    pub scale: f32,
}

impl Default for AmplitudeConfig {
    fn default() -> Self {
        Self { scale: 3.0 }
    }
}

impl AmplitudeConfig {
    /// Visualization level for a block of samples
    #[must_use]
    pub fn level(&self, samples: &[f32]) -> f32 {
        (rms(samples) * self.scale).clamp(0.0, 1.0)
    }
}

/// Consumer of per-frame amplitude samples
///
/// Implementations must not block; drop samples when the consumer lags.
pub trait AmplitudeSink: Send + Sync {
    /// Accept one sample
    fn publish(&self, sample: AmplitudeSample);
}

/// Sink that discards every sample
#[derive(Debug, Default)]
pub struct NullSink;

impl AmplitudeSink for NullSink {
    fn publish(&self, _sample: AmplitudeSample) {}
}

/// Sink backed by a bounded channel; samples are dropped when it is full
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<AmplitudeSample>,
}

impl ChannelSink {
    /// Create a sink and the receiver the UI drains
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AmplitudeSample>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AmplitudeSink for ChannelSink {
    fn publish(&self, sample: AmplitudeSample) {
        // try_send keeps the frame loop non-blocking; a full channel means
        // the consumer is behind and the sample is stale anyway
        let _ = self.tx.try_send(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_clamped() {
        let config = AmplitudeConfig { scale: 100.0 };
        let loud = vec![0.9; 128];
        assert!((config.level(&loud) - 1.0).abs() < f32::EPSILON);

        let silence = vec![0.0; 128];
        assert!(config.level(&silence) < f32::EPSILON);
    }

    #[test]
    fn test_level_scales_rms() {
        let config = AmplitudeConfig { scale: 2.0 };
        let samples = vec![0.1; 128];
        assert!((config.level(&samples) - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.publish(AmplitudeSample {
            direction: Direction::Input,
            level: 0.5,
        });
        // capacity exhausted; this one is dropped, not blocked on
        sink.publish(AmplitudeSample {
            direction: Direction::Input,
            level: 0.7,
        });

        let first = rx.try_recv().expect("first sample");
        assert!((first.level - 0.5).abs() < f32::EPSILON);
        assert!(rx.try_recv().is_err());
    }
}
