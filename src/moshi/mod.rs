//! WebSocket client for the external speech-model inference server
//!
//! The multi-GB model weights live in a separate inference process; this
//! module is the crate's transport to it. [`MoshiCodec`] shares one
//! connection behind a mutex (the codec is effectively read-only, safe to
//! share), while [`MoshiModel`] opens a fresh connection per generator
//! session so each session's autoregressive state is isolated server-side.

pub mod protocol;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::audio::{AudioFrame, FRAME_SIZE, SAMPLE_RATE};
use crate::codec::{CodeFrame, SpeechCodec};
use crate::generator::{GeneratorSession, SpeechModel, StepOutput, TextToken};
use crate::{Error, Result};
use protocol::{ClientMessage, ServerMessage, decode_pcm, encode_pcm};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One handshaken connection to the inference server
struct Connection {
    ws: WsStream,
    codebooks: usize,
}

impl Connection {
    /// Connect and wait for the server's `ready` handshake
    async fn open(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("connect to {url} failed: {e}")))?;

        let mut conn = Self { ws, codebooks: 0 };

        match conn.recv().await? {
            ServerMessage::Ready {
                codebooks,
                frame_size,
                sample_rate,
            } => {
                if frame_size != FRAME_SIZE || sample_rate != SAMPLE_RATE {
                    return Err(Error::Transport(format!(
                        "server frame format {frame_size}@{sample_rate} does not match {FRAME_SIZE}@{SAMPLE_RATE}"
                    )));
                }
                conn.codebooks = codebooks;
                tracing::debug!(url, codebooks, "model server connected");
                Ok(conn)
            }
            other => Err(Error::Transport(format!(
                "expected ready handshake, got {other:?}"
            ))),
        }
    }

    /// Send one message and wait for its reply
    async fn request(&mut self, msg: &ClientMessage) -> Result<ServerMessage> {
        let json = serde_json::to_string(msg)?;
        self.ws
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| Error::Transport(format!("send failed: {e}")))?;
        self.recv().await
    }

    /// Receive the next protocol message, skipping transport frames
    async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            let frame = self
                .ws
                .next()
                .await
                .ok_or_else(|| Error::Transport("server closed connection".to_string()))?
                .map_err(|e| Error::Transport(format!("receive failed: {e}")))?;

            match frame {
                Message::Text(text) => {
                    return match serde_json::from_str::<ServerMessage>(&text)? {
                        ServerMessage::Error { message } => Err(Error::Generator(message)),
                        msg => Ok(msg),
                    };
                }
                Message::Close(_) => {
                    return Err(Error::Transport("server closed connection".to_string()));
                }
                // pings are answered by tungstenite; ignore everything else
                _ => {}
            }
        }
    }
}

/// Codec client sharing one connection across callers
pub struct MoshiCodec {
    conn: Mutex<Connection>,
    codebooks: usize,
}

impl MoshiCodec {
    /// Connect to the inference server's codec endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the connection or handshake fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = Connection::open(url).await?;
        let codebooks = conn.codebooks;
        Ok(Self {
            conn: Mutex::new(conn),
            codebooks,
        })
    }
}

#[async_trait]
impl SpeechCodec for MoshiCodec {
    fn codebooks(&self) -> usize {
        self.codebooks
    }

    async fn encode(&self, frame: &AudioFrame) -> Result<CodeFrame> {
        let mut conn = self.conn.lock().await;
        let reply = conn
            .request(&ClientMessage::Encode {
                pcm: encode_pcm(frame.samples()),
            })
            .await?;

        match reply {
            ServerMessage::Codes { codes } => CodeFrame::from_rows(&codes),
            other => Err(Error::Codec(format!("unexpected encode reply: {other:?}"))),
        }
    }

    async fn decode(&self, codes: &CodeFrame) -> Result<AudioFrame> {
        let widened = codes.widened(self.codebooks);

        let mut conn = self.conn.lock().await;
        let reply = conn
            .request(&ClientMessage::Decode {
                codes: widened.to_rows(),
            })
            .await?;

        match reply {
            ServerMessage::Pcm { pcm } => {
                let samples = decode_pcm(&pcm)?;
                if samples.len() != FRAME_SIZE {
                    return Err(Error::Codec(format!(
                        "decoded frame has {} samples, expected {FRAME_SIZE}",
                        samples.len()
                    )));
                }
                Ok(AudioFrame::from_padded(&samples))
            }
            other => Err(Error::Codec(format!("unexpected decode reply: {other:?}"))),
        }
    }
}

/// Model handle; opens one connection per generator session
pub struct MoshiModel {
    url: String,
}

impl MoshiModel {
    /// Create a handle for the given server URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SpeechModel for MoshiModel {
    async fn create_generator(&self, max_steps: usize) -> Result<Box<dyn GeneratorSession>> {
        let mut conn = Connection::open(&self.url).await?;

        match conn.request(&ClientMessage::Start { max_steps }).await? {
            ServerMessage::Ok => {}
            other => {
                return Err(Error::Transport(format!(
                    "unexpected start reply: {other:?}"
                )));
            }
        }

        tracing::debug!(max_steps, "generator session created");
        Ok(Box::new(MoshiSession {
            conn,
            steps: 0,
            max_steps,
        }))
    }
}

/// Per-session generator state held server-side
pub struct MoshiSession {
    conn: Connection,
    steps: usize,
    max_steps: usize,
}

impl MoshiSession {
    async fn step_codes(&mut self, codes: &CodeFrame) -> Result<StepOutput> {
        if self.steps >= self.max_steps {
            return Err(Error::StepBudgetExhausted(self.steps));
        }

        let reply = self
            .conn
            .request(&ClientMessage::Step {
                codes: codes.to_rows(),
            })
            .await?;

        match reply {
            ServerMessage::Stepped {
                token,
                piece,
                codes,
            } => {
                self.steps += 1;
                let codes = match codes {
                    Some(rows) => Some(CodeFrame::from_rows(&rows)?),
                    None => None,
                };
                Ok(StepOutput {
                    token: token.map(|id| TextToken { id, piece }),
                    codes,
                })
            }
            other => Err(Error::Generator(format!(
                "unexpected step reply: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl GeneratorSession for MoshiSession {
    async fn step(&mut self, input: &CodeFrame) -> Result<StepOutput> {
        self.step_codes(input).await
    }

    async fn step_silence(&mut self) -> Result<StepOutput> {
        let zeros = CodeFrame::zeros(self.conn.codebooks);
        self.step_codes(&zeros).await
    }

    async fn inject_text(&mut self, text: &str) -> Result<()> {
        match self
            .conn
            .request(&ClientMessage::Text {
                text: text.to_string(),
            })
            .await?
        {
            ServerMessage::Ok => Ok(()),
            other => Err(Error::Generator(format!(
                "unexpected text reply: {other:?}"
            ))),
        }
    }

    fn steps_taken(&self) -> usize {
        self.steps
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }
}
