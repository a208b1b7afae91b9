use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::wire::{self, EnginePacket, SocketPacket};

/// What a socket reports back to the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum SocketSignal {
    Connected,
    Disconnected { reason: String },
    ConnectError { message: String },
    Event { name: String, data: Value },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Event { name: String, data: Value },
    Close,
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: Url,
    pub namespace: String,
    pub token: Option<String>,
}

/// Both ends the manager holds on one open socket
pub struct SocketHandle {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub signals: mpsc::UnboundedReceiver<SocketSignal>,
}

/// Opens push-channel sockets.
///
/// `open` returns immediately; the connection outcome arrives as a
/// [`SocketSignal`]. Must be called from within a tokio runtime.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, options: &ConnectOptions) -> SocketHandle;
}

/// Socket.IO over a websocket
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open(&self, options: &ConnectOptions) -> SocketHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(options.clone(), outbound_rx, signal_tx));
        SocketHandle {
            outbound: outbound_tx,
            signals: signal_rx,
        }
    }
}

async fn run_socket(
    options: ConnectOptions,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    signals: mpsc::UnboundedSender<SocketSignal>,
) {
    let mut request = match options.url.as_str().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            let _ = signals.send(SocketSignal::ConnectError {
                message: e.to_string(),
            });
            return;
        }
    };
    if let Some(token) = &options.token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
    }

    let (ws, _) = match tokio_tungstenite::connect_async(request).await {
        Ok(pair) => pair,
        Err(e) => {
            let _ = signals.send(SocketSignal::ConnectError {
                message: e.to_string(),
            });
            return;
        }
    };
    tracing::debug!(url = %options.url, "websocket open");

    let (mut sink, mut stream) = ws.split();
    let mut connected = false;

    let reason = loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break "transport close".to_string(),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break format!("transport error: {}", e),
                };

                let packet = match wire::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping undecodable frame");
                        continue;
                    }
                };

                let reply = match packet {
                    EnginePacket::Open(info) => {
                        tracing::debug!(sid = %info.sid, "engine handshake");
                        let payload = options.token.as_ref().map(|t| json!({ "token": t }));
                        Some(EnginePacket::Message(SocketPacket::Connect {
                            namespace: options.namespace.clone(),
                            payload,
                        }))
                    }
                    EnginePacket::Ping => Some(EnginePacket::Pong),
                    EnginePacket::Close => break "transport close".to_string(),
                    EnginePacket::Message(SocketPacket::Connect { namespace, .. }) => {
                        if namespace == options.namespace {
                            connected = true;
                            let _ = signals.send(SocketSignal::Connected);
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Event { name, data, .. }) => {
                        let _ = signals.send(SocketSignal::Event { name, data });
                        None
                    }
                    EnginePacket::Message(SocketPacket::ConnectError { message, .. }) => {
                        let _ = signals.send(SocketSignal::ConnectError { message });
                        return;
                    }
                    EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
                        break "io server disconnect".to_string();
                    }
                    _ => None,
                };

                if let Some(reply) = reply {
                    if let Err(e) = sink.send(Message::Text(wire::encode(&reply))).await {
                        break format!("transport error: {}", e);
                    }
                }
            }
            frame = outbound.recv() => {
                match frame {
                    Some(OutboundFrame::Event { name, data }) => {
                        let packet = EnginePacket::Message(SocketPacket::Event {
                            namespace: options.namespace.clone(),
                            ack_id: None,
                            name,
                            data,
                        });
                        if let Err(e) = sink.send(Message::Text(wire::encode(&packet))).await {
                            let _ = signals.send(SocketSignal::Error { message: e.to_string() });
                        }
                    }
                    Some(OutboundFrame::Close) | None => {
                        // Manual close: the manager already knows, no signal
                        let goodbye = EnginePacket::Message(SocketPacket::Disconnect {
                            namespace: options.namespace.clone(),
                        });
                        let _ = sink.send(Message::Text(wire::encode(&goodbye))).await;
                        let _ = sink.close().await;
                        return;
                    }
                }
            }
        }
    };

    let signal = if connected {
        SocketSignal::Disconnected { reason }
    } else {
        SocketSignal::ConnectError { message: reason }
    };
    let _ = signals.send(signal);
}
