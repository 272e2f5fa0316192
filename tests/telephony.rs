//! Telephony bridge integration tests
//!
//! Exercises the wire-format conversion contracts and drives a phone-call
//! audio path through the conversation engine with scripted fakes.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use aria_voice::FRAME_SIZE;
use aria_voice::audio::{AmplitudeConfig, VadConfig};
use aria_voice::engine::{ConversationState, TurnConfig, TurnEngine};
use aria_voice::events::EventBus;
use aria_voice::telephony::{TelephonyBridge, linear_to_mulaw, mulaw_to_linear, protocol::MediaEvent};

mod common;
use common::{FakeCodec, FakeModel};

/// Telephony packet length: 20ms at 8kHz
const PACKET_SAMPLES: usize = 160;

/// Encode a 440Hz tone as one base64 mu-law packet
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn tone_packet(packet_index: usize, amplitude: f32) -> String {
    let bytes: Vec<u8> = (0..PACKET_SAMPLES)
        .map(|i| {
            let t = (packet_index * PACKET_SAMPLES + i) as f32 / 8000.0;
            let sample = amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            linear_to_mulaw((sample * 32767.0) as i16)
        })
        .collect();
    BASE64.encode(bytes)
}

/// A packet of telephone silence
fn silence_packet() -> String {
    BASE64.encode(vec![linear_to_mulaw(0); PACKET_SAMPLES])
}

#[test]
fn test_provider_packet_upsamples_exactly() {
    // 160 8kHz samples in, exactly 480 24kHz samples out
    let bridge = TelephonyBridge::new();
    let samples = bridge.to_model_format(&tone_packet(0, 0.5)).unwrap();
    assert_eq!(samples.len(), PACKET_SAMPLES * 3);
    assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn test_reverse_path_yields_exact_byte_count() {
    let bridge = TelephonyBridge::new();
    let samples = bridge.to_model_format(&tone_packet(0, 0.5)).unwrap();

    let payload = bridge.from_model_format(&samples).unwrap();
    let bytes = BASE64.decode(payload).unwrap();
    assert_eq!(bytes.len(), PACKET_SAMPLES);
}

#[test]
fn test_tone_round_trip_preserves_frequency() {
    // a sustained tone through mu-law + double resampling keeps its
    // dominant frequency (spectrum-similar, not bit-exact)
    let bridge = TelephonyBridge::new();

    let mut model_side = Vec::new();
    for packet in 0..25 {
        model_side.extend(bridge.to_model_format(&tone_packet(packet, 0.5)).unwrap());
    }

    let payload = bridge.from_model_format(&model_side).unwrap();
    let decoded: Vec<f32> = BASE64
        .decode(payload)
        .unwrap()
        .iter()
        .map(|&b| f32::from(mulaw_to_linear(b)) / 32768.0)
        .collect();
    assert_eq!(decoded.len(), 25 * PACKET_SAMPLES);

    let crossings = |samples: &[f32]| {
        samples
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count()
    };

    // 440Hz over 0.5s ≈ 440 zero crossings; allow the resampler's edge
    // effects some slack
    let measured = crossings(&decoded);
    assert!(
        (400..=480).contains(&measured),
        "dominant frequency drifted: {measured} crossings"
    );
}

#[test]
fn test_malformed_packet_is_dropped_not_fatal() {
    let mut bridge = TelephonyBridge::new();

    bridge.push_inbound(&tone_packet(0, 0.5)).unwrap();
    let buffered = bridge.buffered();

    // a bad packet is a per-packet error and leaves the stream intact
    assert!(bridge.push_inbound("%%% not base64 %%%").is_err());
    assert_eq!(bridge.buffered(), buffered);

    bridge.push_inbound(&tone_packet(1, 0.5)).unwrap();
    assert_eq!(bridge.buffered(), buffered + PACKET_SAMPLES * 3);
}

#[test]
fn test_media_event_envelope_round_trip() {
    let bridge = TelephonyBridge::new();
    let samples = bridge.to_model_format(&tone_packet(0, 0.5)).unwrap();
    let payload = bridge.from_model_format(&samples).unwrap();

    let json = serde_json::to_string(&MediaEvent::outbound(payload.clone())).unwrap();
    let parsed: MediaEvent = serde_json::from_str(&json).unwrap();
    match parsed {
        MediaEvent::Media { media } => assert_eq!(media.payload, payload),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_call_audio_drives_engine_turn() {
    // telephone speech followed by telephone silence produces a complete
    // engine turn through the bridge, same as local microphone audio
    let model = FakeModel::new(0, 5);
    let mut engine = TurnEngine::new(
        Arc::new(FakeCodec::new()),
        Arc::new(model.clone()),
        EventBus::new(64),
        TurnConfig::default(),
        VadConfig::default(),
        AmplitudeConfig::default(),
    );
    engine.start().await.unwrap();

    let mut bridge = TelephonyBridge::new();
    let mut records = Vec::new();

    // 3s of tone, then 2s of silence, as 20ms provider packets
    for packet in 0..150 {
        bridge.push_inbound(&tone_packet(packet, 0.5)).unwrap();
        while let Some(frame) = bridge.pop_frame() {
            assert_eq!(frame.len(), FRAME_SIZE);
            records.extend(engine.push_audio(&frame).await.unwrap());
        }
    }
    for _ in 0..100 {
        bridge.push_inbound(&silence_packet()).unwrap();
        while let Some(frame) = bridge.pop_frame() {
            records.extend(engine.push_audio(&frame).await.unwrap());
        }
    }

    assert_eq!(records.len(), 1, "expected exactly one call turn");
    assert!(!records[0].audio.is_empty());
    assert_eq!(engine.state(), ConversationState::Listening);

    // generated audio converts back to provider payloads
    let outbound = bridge.from_model_format(&engine.take_output()).unwrap();
    assert!(!outbound.is_empty());
}
