//! Frequency-domain resampling between telephony and model rates
//!
//! Telephony audio is 8kHz; the model runs at 24kHz. The ratio is exactly
//! 3, and callers depend on the sample-count relationship being exactly
//! ×3 / ÷3 per segment, so the converter zero-pad-drains the resampler and
//! trims its latency instead of dropping the tail chunk.

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Largest chunk fed to the FFT resampler in one call
const MAX_CHUNK: usize = 1024;

/// Resample a finite segment, returning exactly
/// `len * to_rate / from_rate` samples
///
/// # Errors
///
/// Returns error if the resampler cannot be constructed or fails while
/// processing.
#[allow(clippy::cast_possible_truncation)]
pub fn resample_exact(samples: &[f32], from_rate: usize, to_rate: usize) -> Result<Vec<f32>> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let expected = samples.len() * to_rate / from_rate;
    let chunk_size = samples.len().min(MAX_CHUNK);

    let mut resampler = FftFixedIn::<f64>::new(from_rate, to_rate, chunk_size, 2, 1)
        .map_err(|e| Error::Telephony(format!("resampler init failed: {e}")))?;
    let delay = resampler.output_delay();

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output: Vec<f64> = Vec::with_capacity(expected + delay + chunk_size);

    for chunk in input.chunks(chunk_size) {
        // process_partial accepts short chunks, so the tail needs no
        // special casing and internal chunk rounding can't reject input
        let processed = resampler
            .process_partial(Some(&[chunk.to_vec()]), None)
            .map_err(|e| Error::Telephony(format!("resample failed: {e}")))?;
        output.extend_from_slice(&processed[0]);
    }

    // zero-feed until the resampler has flushed its internal latency
    while output.len() < delay + expected {
        let processed = resampler
            .process_partial(Option::<&[Vec<f64>]>::None, None)
            .map_err(|e| Error::Telephony(format!("resample drain failed: {e}")))?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
    }

    if output.len() < delay + expected {
        return Err(Error::Telephony(format!(
            "resampler produced {} of {} samples",
            output.len().saturating_sub(delay),
            expected
        )));
    }

    Ok(output[delay..delay + expected]
        .iter()
        .map(|&s| s as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(rate: usize, frequency: f32, count: usize) -> Vec<f32> {
        #[allow(clippy::cast_precision_loss)]
        (0..count)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
            })
            .collect()
    }

    /// Zero crossings per sample, a cheap dominant-frequency estimate
    fn zero_crossing_rate(samples: &[f32]) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        #[allow(clippy::cast_precision_loss)]
        {
            crossings as f32 / samples.len() as f32
        }
    }

    #[test]
    fn test_exact_upsample_count() {
        // one 20ms telephony packet
        let input = sine(8_000, 440.0, 160);
        let output = resample_exact(&input, 8_000, 24_000).unwrap();
        assert_eq!(output.len(), 480);
    }

    #[test]
    fn test_exact_downsample_count() {
        let input = sine(24_000, 440.0, 1920);
        let output = resample_exact(&input, 24_000, 8_000).unwrap();
        assert_eq!(output.len(), 640);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_exact(&[], 8_000, 24_000).unwrap().is_empty());
    }

    #[test]
    fn test_tone_survives_round_trip() {
        // 440Hz at 8kHz, long enough for a stable estimate
        let input = sine(8_000, 440.0, 8_000);
        let up = resample_exact(&input, 8_000, 24_000).unwrap();
        let down = resample_exact(&up, 24_000, 8_000).unwrap();
        assert_eq!(down.len(), input.len());

        let original = zero_crossing_rate(&input);
        let round_tripped = zero_crossing_rate(&down);
        // spectrum-similar, not bit-exact
        assert!(
            (original - round_tripped).abs() / original < 0.1,
            "dominant frequency drifted: {original} vs {round_tripped}"
        );
    }

    #[test]
    fn test_upsampled_tone_frequency() {
        let input = sine(8_000, 440.0, 8_000);
        let up = resample_exact(&input, 8_000, 24_000).unwrap();

        // same crossings per second means a third of the per-sample rate
        let original = zero_crossing_rate(&input);
        let upsampled = zero_crossing_rate(&up) * 3.0;
        assert!((original - upsampled).abs() / original < 0.1);
    }
}
