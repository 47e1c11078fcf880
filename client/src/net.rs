//! WebSocket transport for a canvas channel.
//!
//! [`connect`] dials the relay, then hands back a [`Transport`]: a plain
//! channel pair the session drives without ever touching the socket. A
//! detached task bridges the two worlds — outbound messages are encoded and
//! written to the sink, inbound text frames are decoded and forwarded,
//! malformed frames are logged and skipped. The bridge ends when either
//! side closes; there is no automatic reconnect, the embedding decides
//! whether to dial again.

#[cfg(test)]
#[path = "net_test.rs"]
mod net_test;

use std::fmt::Write as _;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use wire::{ClientMessage, ServerMessage};

/// Bound on each direction of the bridge. A full outbound buffer surfaces
/// to the session as a refused send, which parks and retries.
pub const CHANNEL_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
}

/// The channel pair a [`crate::session::CanvasSession`] is constructed over.
pub struct Transport {
    pub tx: mpsc::Sender<ClientMessage>,
    pub rx: mpsc::Receiver<ServerMessage>,
}

/// Dial the relay's `/channel` endpoint and start the bridge task.
///
/// `base_url` may carry an `http`, `https`, `ws`, or `wss` scheme; the
/// identity pair rides along as query parameters.
pub async fn connect(
    base_url: &str,
    user_id: &str,
    display_name: &str,
) -> Result<Transport, NetError> {
    let url = channel_url(base_url, user_id, display_name)?;
    debug!(%url, "connecting websocket");
    let (stream, _) = connect_async(&url).await.map_err(|e| NetError::Connect(Box::new(e)))?;
    let (mut sink, mut source) = stream.split();

    let (tx_out, mut rx_out) = mpsc::channel::<ClientMessage>(CHANNEL_DEPTH);
    let (tx_in, rx_in) = mpsc::channel::<ServerMessage>(CHANNEL_DEPTH);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                outbound = rx_out.recv() => {
                    let Some(msg) = outbound else {
                        debug!("session dropped its sender; closing bridge");
                        break;
                    };
                    let json = match wire::encode_client(&msg) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(%err, op = msg.op(), "dropping unencodable message");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(json.into())).await {
                        warn!(%err, "websocket send failed; closing bridge");
                        break;
                    }
                }
                inbound = source.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => match wire::decode_server(&text) {
                            Ok(msg) => {
                                if tx_in.send(msg).await.is_err() {
                                    debug!("session dropped its receiver; closing bridge");
                                    break;
                                }
                            }
                            Err(err) => warn!(%err, "discarding malformed frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("websocket closed");
                            break;
                        }
                        // Control and binary frames need no handling here.
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(%err, "websocket receive failed; closing bridge");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(Transport { tx: tx_out, rx: rx_in })
}

/// Build the `/channel` URL, mapping http(s) schemes onto ws(s).
fn channel_url(base_url: &str, user_id: &str, display_name: &str) -> Result<String, NetError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if base_url.starts_with("ws://") || base_url.starts_with("wss://") {
        base_url.to_string()
    } else {
        return Err(NetError::InvalidUrl(base_url.to_string()));
    };
    let base = ws_base.trim_end_matches('/');
    Ok(format!(
        "{base}/channel?userId={}&displayName={}",
        encode_query_value(user_id),
        encode_query_value(display_name),
    ))
}

/// Percent-encode a query value; RFC 3986 unreserved bytes pass through.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            other => {
                let _ = write!(out, "%{other:02X}");
            }
        }
    }
    out
}
