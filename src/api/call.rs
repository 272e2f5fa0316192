//! Telephony call WebSocket endpoint
//!
//! Speaks the provider's JSON media-event schema. Each connection drives
//! its own engine + generator session pair through the telephony bridge,
//! so concurrent calls share nothing but the codec and model handles.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use super::ApiState;
use crate::engine::TurnEngine;
use crate::telephony::TelephonyBridge;
use crate::telephony::protocol::MediaEvent;

/// Build the call router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/call/ws", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_call(socket, state))
}

/// Drive one phone call end to end
#[allow(clippy::too_many_lines)]
async fn handle_call(socket: WebSocket, state: Arc<ApiState>) {
    let call_id = Uuid::new_v4();
    tracing::info!(call = %call_id, "telephony call connected");

    let mut engine = TurnEngine::new(
        Arc::clone(&state.codec),
        Arc::clone(&state.model),
        state.events.clone(),
        state.turn.clone(),
        state.vad.clone(),
        state.amplitude.clone(),
    );
    if let Some(context) = &state.context {
        engine.set_turn_context(context.clone());
    }
    if let Err(e) = engine.start().await {
        tracing::error!(call = %call_id, error = %e, "failed to start call engine");
        return;
    }

    let mut bridge = TelephonyBridge::new();
    let (mut sender, mut receiver) = socket.split();

    'call: while let Some(frame) = receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(call = %call_id, error = %e, "websocket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let event: MediaEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(call = %call_id, error = %e, "unparseable media event");
                        continue;
                    }
                };

                match event {
                    MediaEvent::Connected | MediaEvent::Mark { .. } => {}
                    MediaEvent::Start { start } => {
                        let stream_sid = start.and_then(|s| s.stream_sid);
                        tracing::info!(call = %call_id, stream = ?stream_sid, "media stream started");
                    }
                    MediaEvent::Media { media } => {
                        if let Err(e) = bridge.push_inbound(&media.payload) {
                            // one malformed packet never kills the call
                            tracing::warn!(call = %call_id, error = %e, "dropping packet");
                            continue;
                        }

                        while let Some(samples) = bridge.pop_frame() {
                            match engine.push_audio(&samples).await {
                                Ok(records) => {
                                    for record in records {
                                        tracing::info!(
                                            call = %call_id,
                                            turn = %record.id,
                                            text = %record.text,
                                            "call turn complete"
                                        );
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(call = %call_id, error = %e, "engine failed; ending call");
                                    break 'call;
                                }
                            }
                        }

                        if send_output(&mut sender, &mut engine, &bridge, call_id)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    MediaEvent::Stop => {
                        match engine.flush().await {
                            Ok(Some(record)) => {
                                tracing::info!(call = %call_id, turn = %record.id, "final turn complete");
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(call = %call_id, error = %e, "flush failed");
                            }
                        }
                        let _ = send_output(&mut sender, &mut engine, &bridge, call_id).await;
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(call = %call_id, "telephony call ended");
}

/// Drain generated audio back to the provider as media events
async fn send_output(
    sender: &mut SplitSink<WebSocket, Message>,
    engine: &mut TurnEngine,
    bridge: &TelephonyBridge,
    call_id: Uuid,
) -> Result<(), ()> {
    let samples = engine.take_output();
    if samples.is_empty() {
        return Ok(());
    }

    let payload = match bridge.from_model_format(&samples) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(call = %call_id, error = %e, "outbound conversion failed");
            return Ok(());
        }
    };
    if payload.is_empty() {
        return Ok(());
    }

    let json = match serde_json::to_string(&MediaEvent::outbound(payload)) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(call = %call_id, error = %e, "media event serialization failed");
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await.map_err(|e| {
        tracing::warn!(call = %call_id, error = %e, "failed to send media event");
    })
}
