//! Neural audio codec seam
//!
//! A codec turns one [`AudioFrame`] into one [`CodeFrame`] of discrete
//! codes and back. Exactly one code frame corresponds to exactly one audio
//! frame; callers are responsible for preserving strict frame order, since
//! desynchronization is not detectable at this layer.

use async_trait::async_trait;

use crate::audio::AudioFrame;
use crate::{Error, Result};

/// Discrete tokenization of one audio frame (codebooks × steps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFrame {
    codebooks: usize,
    steps: usize,
    /// Row-major: `codes[codebook * steps + step]`
    codes: Vec<u32>,
}

impl CodeFrame {
    /// Build a code frame from row-major codes
    ///
    /// # Errors
    ///
    /// Returns error if `codes.len() != codebooks * steps` or either
    /// dimension is zero.
    pub fn new(codebooks: usize, steps: usize, codes: Vec<u32>) -> Result<Self> {
        if codebooks == 0 || steps == 0 {
            return Err(Error::Codec("code frame dimensions must be non-zero".to_string()));
        }
        if codes.len() != codebooks * steps {
            return Err(Error::Codec(format!(
                "code frame dimension mismatch: {} codes for {codebooks}x{steps}",
                codes.len()
            )));
        }
        Ok(Self {
            codebooks,
            steps,
            codes,
        })
    }

    /// Build a single-step code frame from one row per codebook
    ///
    /// # Errors
    ///
    /// Returns error if rows are empty or ragged.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let steps = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || steps == 0 {
            return Err(Error::Codec("empty code frame".to_string()));
        }
        if rows.iter().any(|r| r.len() != steps) {
            return Err(Error::Codec("ragged code frame rows".to_string()));
        }

        let codes = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::new(rows.len(), steps, codes)
    }

    /// An all-zero single-step frame (the silence input for priming steps)
    #[must_use]
    pub fn zeros(codebooks: usize) -> Self {
        Self {
            codebooks: codebooks.max(1),
            steps: 1,
            codes: vec![0; codebooks.max(1)],
        }
    }

    /// Number of codebooks
    #[must_use]
    pub const fn codebooks(&self) -> usize {
        self.codebooks
    }

    /// Number of time steps (1 for pipeline frames)
    #[must_use]
    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Code at (codebook, step)
    #[must_use]
    pub fn code(&self, codebook: usize, step: usize) -> Option<u32> {
        if codebook >= self.codebooks || step >= self.steps {
            return None;
        }
        Some(self.codes[codebook * self.steps + step])
    }

    /// The codes of one codebook
    #[must_use]
    pub fn row(&self, codebook: usize) -> Option<&[u32]> {
        if codebook >= self.codebooks {
            return None;
        }
        Some(&self.codes[codebook * self.steps..(codebook + 1) * self.steps])
    }

    /// Codes as one row per codebook
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.codebooks)
            .map(|cb| self.codes[cb * self.steps..(cb + 1) * self.steps].to_vec())
            .collect()
    }

    /// Whether every code is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.codes.iter().all(|&c| c == 0)
    }

    /// Copy widened to `codebooks` rows, zero-filling the missing ones
    ///
    /// Used before decoding frames whose upper codebooks were not
    /// populated by the generator.
    #[must_use]
    pub fn widened(&self, codebooks: usize) -> Self {
        if codebooks <= self.codebooks {
            return self.clone();
        }
        let mut codes = self.codes.clone();
        codes.resize(codebooks * self.steps, 0);
        Self {
            codebooks,
            steps: self.steps,
            codes,
        }
    }
}

/// Bidirectional transform between PCM frames and discrete codes
///
/// Implementations wrap an external neural codec; errors are raised, never
/// silently truncated.
#[async_trait]
pub trait SpeechCodec: Send + Sync {
    /// Number of codebooks this codec produces per frame
    fn codebooks(&self) -> usize;

    /// Tokenize one audio frame
    ///
    /// # Errors
    ///
    /// Returns error if the codec reports an internal failure; fatal to
    /// the current turn.
    async fn encode(&self, frame: &AudioFrame) -> Result<CodeFrame>;

    /// Reconstruct one audio frame from codes
    ///
    /// Accepts frames with fewer codebooks than [`Self::codebooks`];
    /// missing codebooks are zero-filled.
    ///
    /// # Errors
    ///
    /// Returns error if the codec reports an internal failure; fatal to
    /// the current turn.
    async fn decode(&self, codes: &CodeFrame) -> Result<AudioFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_is_error() {
        assert!(CodeFrame::new(8, 1, vec![0; 7]).is_err());
        assert!(CodeFrame::new(0, 1, Vec::new()).is_err());
        assert!(CodeFrame::new(8, 1, vec![0; 8]).is_ok());
    }

    #[test]
    fn test_rows_round_trip() {
        let rows = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let frame = CodeFrame::from_rows(&rows).unwrap();
        assert_eq!(frame.codebooks(), 3);
        assert_eq!(frame.steps(), 2);
        assert_eq!(frame.code(1, 1), Some(4));
        assert_eq!(frame.row(2), Some(&[5, 6][..]));
        assert_eq!(frame.to_rows(), rows);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(CodeFrame::from_rows(&[vec![1, 2], vec![3]]).is_err());
        assert!(CodeFrame::from_rows(&[]).is_err());
    }

    #[test]
    fn test_zeros_and_widened() {
        let zeros = CodeFrame::zeros(8);
        assert!(zeros.is_zero());
        assert_eq!(zeros.codebooks(), 8);
        assert_eq!(zeros.steps(), 1);

        let narrow = CodeFrame::from_rows(&[vec![7]]).unwrap();
        let wide = narrow.widened(4);
        assert_eq!(wide.codebooks(), 4);
        assert_eq!(wide.code(0, 0), Some(7));
        assert_eq!(wide.code(3, 0), Some(0));
    }
}
