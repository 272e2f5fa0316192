//! Telephony provider WebSocket schema
//!
//! Media streams arrive as JSON events wrapping base64 mu-law payloads;
//! generated audio is sent back in the same envelope.

use serde::{Deserialize, Serialize};

/// One event on a telephony media stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MediaEvent {
    /// Connection handshake
    Connected,
    /// Stream metadata, sent once before media flows
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<StreamStart>,
    },
    /// One audio packet
    Media { media: MediaPayload },
    /// A provider marker echoed back when queued audio finishes playing
    Mark {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mark: Option<MarkPayload>,
    },
    /// End of the stream
    Stop,
}

impl MediaEvent {
    /// Build an outbound media event from an encoded payload
    #[must_use]
    pub fn outbound(payload: String) -> Self {
        Self::Media {
            media: MediaPayload {
                payload,
                track: None,
                timestamp: None,
            },
        }
    }
}

/// Stream metadata from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    #[serde(default)]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

/// Wire audio format description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
}

/// One base64 mu-law audio packet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded mu-law bytes
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Provider marker name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_event_parses() {
        let json = r#"{"event":"media","media":{"payload":"//8A","track":"inbound"}}"#;
        let event: MediaEvent = serde_json::from_str(json).unwrap();
        match event {
            MediaEvent::Media { media } => {
                assert_eq!(media.payload, "//8A");
                assert_eq!(media.track.as_deref(), Some("inbound"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_start_event_parses() {
        let json = r#"{"event":"start","start":{"streamSid":"MZ123","mediaFormat":{"encoding":"audio/x-mulaw","sampleRate":8000,"channels":1}}}"#;
        let event: MediaEvent = serde_json::from_str(json).unwrap();
        match event {
            MediaEvent::Start { start } => {
                let start = start.unwrap();
                assert_eq!(start.stream_sid.as_deref(), Some("MZ123"));
                assert_eq!(start.media_format.unwrap().sample_rate, Some(8000));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_outbound_serializes() {
        let event = MediaEvent::outbound("AAAA".to_string());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"media","media":{"payload":"AAAA"}}"#);
    }
}
