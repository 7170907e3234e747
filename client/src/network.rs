//! WebSocket transport and the inbound event stream the sessions consume.

use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

/// Close code the server uses for a clean, terminal shutdown.
pub const CLOSE_TERMINAL: u16 = 4000;

/// Reported when the peer vanishes without sending a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Where the game server lives; URL templating for every channel kind.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        }
    }

    pub fn remote_game_url(&self, game_id: u64) -> String {
        format!(
            "{}://{}:{}/ws/game/remote/{}/",
            self.scheme, self.host, self.port, game_id
        )
    }

    pub fn local_game_url(&self) -> String {
        format!("{}://{}:{}/ws/game/local/", self.scheme, self.host, self.port)
    }

    pub fn matchmaking_url(&self, kind: &str) -> String {
        format!(
            "{}://{}:{}/ws/matchmaking/{}/",
            self.scheme, self.host, self.port, kind
        )
    }

    pub fn tournament_url(&self, tournament_id: u64) -> String {
        format!(
            "{}://{}:{}/ws/tournament/{}/",
            self.scheme, self.host, self.port, tournament_id
        )
    }
}

/// One inbound occurrence on a transport, delivered in arrival order.
///
/// `Open` is always first. After `Error` or `Closed` nothing further is
/// delivered; the pump task has exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(String),
    Closed { code: u16 },
}

/// A live outbound connection as the channel registry sees it.
pub trait Transport: Send {
    /// Queues one text frame. An error means the connection task is gone.
    fn send(&self, text: String) -> Result<(), ClientError>;

    /// Requests connection shutdown. Idempotent; must not call back into
    /// the registry.
    fn close(&self);
}

enum Outbound {
    Frame(String),
    Close,
}

/// WebSocket-backed [`Transport`]. The connection itself lives in a
/// spawned pump task; this handle only queues work for it.
pub struct WsTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl WsTransport {
    /// Opens a WebSocket connection and spawns its pump task.
    ///
    /// Returns the transport handle plus the receiver the session drains
    /// for [`TransportEvent`]s. Construction failure returns before any
    /// task is spawned or event emitted.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), ClientError> {
        let (stream, _) = connect_async(url).await.map_err(|e| {
            ClientError::TransportConstructionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(stream, out_rx, event_tx));

        Ok((Self { tx: out_tx }, event_rx))
    }
}

impl Transport for WsTransport {
    fn send(&self, text: String) -> Result<(), ClientError> {
        self.tx
            .send(Outbound::Frame(text))
            .map_err(|_| ClientError::TransportError("connection task gone".to_string()))
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// Bridges the socket to the session: outbound frames in, transport
/// events out. Exits on close or error from either side.
async fn pump(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    // The handshake completed inside connect_async; report it as the
    // first event so sessions see open before any message.
    let _ = events.send(TransportEvent::Open);

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = stream.send(Message::Text(text.into())).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    // Handle dropped or close requested; either way the
                    // connection is done.
                    let _ = stream.close(None).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(CLOSE_ABNORMAL);
                    let _ = events.send(TransportEvent::Closed { code });
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite itself and
                    // this protocol never sends binary frames.
                }
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                    });
                    break;
                }
            },
        }
    }

    debug!("transport pump finished");
}
