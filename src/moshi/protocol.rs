//! Wire protocol for the speech-model inference server
//!
//! JSON text messages over a WebSocket. PCM travels as base64-encoded
//! little-endian f32. Every client message gets exactly one reply; the
//! strictly sequential request/response discipline mirrors the sequential
//! step contract of the generator itself.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Messages sent to the inference server
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Allocate generator state sized to `max_steps` frames
    Start { max_steps: usize },
    /// Tokenize one PCM frame
    Encode { pcm: String },
    /// Reconstruct PCM from one code frame
    Decode { codes: Vec<Vec<u32>> },
    /// Advance the autoregressive state by one frame
    Step { codes: Vec<Vec<u32>> },
    /// Inject priming text ahead of generation
    Text { text: String },
}

/// Messages received from the inference server
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake sent once per connection
    Ready {
        codebooks: usize,
        frame_size: usize,
        sample_rate: u32,
    },
    /// Codes for an `Encode` request
    Codes { codes: Vec<Vec<u32>> },
    /// PCM for a `Decode` request
    Pcm { pcm: String },
    /// Result of a `Step` request
    Stepped {
        #[serde(default)]
        token: Option<u32>,
        #[serde(default)]
        piece: Option<String>,
        #[serde(default)]
        codes: Option<Vec<Vec<u32>>>,
    },
    /// Acknowledgement for `Start` and `Text`
    Ok,
    /// Server-side failure
    Error { message: String },
}

/// Encode PCM samples as base64 little-endian f32
#[must_use]
pub fn encode_pcm(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Decode base64 little-endian f32 PCM
///
/// # Errors
///
/// Returns error on malformed base64 or a byte count that is not a
/// multiple of four.
pub fn decode_pcm(payload: &str) -> Result<Vec<f32>> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| Error::Transport(format!("invalid pcm base64: {e}")))?;

    if bytes.len() % 4 != 0 {
        return Err(Error::Transport(format!(
            "pcm byte count {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_round_trip() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let decoded = decode_pcm(&encode_pcm(&samples)).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_malformed_pcm_rejected() {
        assert!(decode_pcm("not base64!!").is_err());
        // valid base64, wrong byte count
        assert!(decode_pcm(&BASE64.encode([1u8, 2, 3])).is_err());
    }

    #[test]
    fn test_message_serialization() {
        let msg = ClientMessage::Step {
            codes: vec![vec![1], vec![2]],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""op":"step""#));

        let reply: ServerMessage =
            serde_json::from_str(r#"{"op":"stepped","token":3,"codes":[[5],[6]]}"#).unwrap();
        match reply {
            ServerMessage::Stepped { token, piece, codes } => {
                assert_eq!(token, Some(3));
                assert!(piece.is_none());
                assert_eq!(codes.unwrap().len(), 2);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
