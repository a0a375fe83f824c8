//! WebSocket channel to the signaling relay.
//!
//! The relay is opaque: it forwards JSON text frames between the two
//! endpoints and nothing else. One [`SignalMessage`] per text frame, no
//! authentication, no versioning, no delivery guarantee beyond TCP's.

use anyhow::{anyhow, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use parlo_core::SignalMessage;

const OUTBOX_CAPACITY: usize = 32;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct SignalingChannel {
    ws: WsStream,
}

impl SignalingChannel {
    /// Open the channel to the relay.
    pub async fn connect(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(anyhow!("signaling relay URL must be ws:// or wss://: {url}"));
        }
        let (ws, _) = connect_async(url).await?;
        info!("connected to signaling relay: {}", url);
        Ok(Self { ws })
    }

    /// Split into a clonable sender and the receive half. A writer task
    /// drains the outbox so peer-connection callbacks can send candidates
    /// without holding the socket.
    pub fn start(self) -> (SignalSender, SignalReceiver) {
        let (write, read) = self.ws.split();
        let (tx, rx) = mpsc::channel::<SignalMessage>(OUTBOX_CAPACITY);

        tokio::spawn(write_outbox(write, rx));

        (SignalSender { tx }, SignalReceiver { read })
    }
}

async fn write_outbox(
    mut write: SplitSink<WsStream, WsMessage>,
    mut rx: mpsc::Receiver<SignalMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let text = match msg.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!("failed to encode signaling message: {}", e);
                continue;
            }
        };
        debug!("C->S: {}", text);
        if let Err(e) = write.send(WsMessage::Text(text)).await {
            error!("failed to send signaling message: {}", e);
            break;
        }
    }
}

/// Outbound half of the channel. Cheap to clone.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<SignalMessage>,
}

impl SignalSender {
    pub async fn send(&self, msg: SignalMessage) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| parlo_core::Error::channel_closed("signaling outbox dropped"))?;
        Ok(())
    }
}

/// Inbound half of the channel.
pub struct SignalReceiver {
    read: SplitStream<WsStream>,
}

impl SignalReceiver {
    /// Next parseable signaling message, or `None` once the channel is
    /// closed. Non-text frames are skipped; unparseable text is logged and
    /// skipped, never fatal.
    pub async fn recv(&mut self) -> Option<SignalMessage> {
        while let Some(msg) = self.read.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    debug!("S->C: {}", text);
                    match SignalMessage::from_text(&text) {
                        Ok(signal) => return Some(signal),
                        Err(e) => {
                            warn!("failed to parse signaling message: {}", e);
                            continue;
                        }
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    info!("signaling channel closed by relay");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("signaling channel error: {}", e);
                    return None;
                }
            }
        }
        None
    }
}
