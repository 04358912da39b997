use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::platform::Message;

const GATEWAY_VERSION: &str = "9";

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, WsMessage>;
type SocketStream = SplitStream<Socket>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handshake error: {0}")]
    Handshake(String),
    #[error("session rejected by gateway")]
    InvalidSession,
    #[error("connection closed")]
    ConnectionClosed,
}

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug)]
pub(crate) enum GatewayEvent {
    Hello { heartbeat_interval: Duration },
    Dispatch { seq: Option<u64>, event: DispatchEvent },
    HeartbeatRequest,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Other(u8),
}

#[derive(Debug)]
pub(crate) enum DispatchEvent {
    Ready,
    MessageCreate(Box<Message>),
    Other(String),
}

pub(crate) fn decode_event(text: &str) -> Result<GatewayEvent, GatewayError> {
    let payload: Payload = serde_json::from_str(text)?;
    let event = match payload.op {
        OP_HELLO => {
            let millis = payload
                .d
                .get("heartbeat_interval")
                .and_then(Value::as_u64)
                .ok_or_else(|| GatewayError::Handshake("hello without heartbeat_interval".to_string()))?;
            GatewayEvent::Hello {
                heartbeat_interval: Duration::from_millis(millis),
            }
        }
        OP_DISPATCH => {
            let name = payload.t.unwrap_or_default();
            let event = match name.as_str() {
                "READY" => DispatchEvent::Ready,
                "MESSAGE_CREATE" => DispatchEvent::MessageCreate(Box::new(serde_json::from_value(payload.d)?)),
                _ => DispatchEvent::Other(name),
            };
            GatewayEvent::Dispatch {
                seq: payload.s,
                event,
            }
        }
        OP_HEARTBEAT => GatewayEvent::HeartbeatRequest,
        OP_HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        OP_RECONNECT => GatewayEvent::Reconnect,
        OP_INVALID_SESSION => GatewayEvent::InvalidSession,
        other => GatewayEvent::Other(other),
    };
    Ok(event)
}

fn heartbeat_frame(seq: Option<u64>) -> WsMessage {
    WsMessage::Text(json!({ "op": OP_HEARTBEAT, "d": seq }).to_string())
}

fn identify_frame(token: &str) -> WsMessage {
    let payload = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "compress": false,
            "large_threshold": 50,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "chord",
                "device": "chord",
            },
        },
    });
    WsMessage::Text(payload.to_string())
}

pub(crate) fn gateway_endpoint(base: &str) -> Result<Url, GatewayError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .clear()
        .append_pair("v", GATEWAY_VERSION)
        .append_pair("encoding", "json");
    Ok(url)
}

/// Live gateway connection. A background task keeps the heartbeat going and
/// forwards `MESSAGE_CREATE` dispatches until [`Gateway::close`] is called or
/// the server ends the session.
pub struct Gateway {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Gateway {
    pub async fn connect(
        base_url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Message>), GatewayError> {
        let url = gateway_endpoint(base_url)?;
        debug!(%url, "connecting to gateway");
        let (socket, _) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let heartbeat_interval = match read_event(&mut stream).await? {
            GatewayEvent::Hello { heartbeat_interval } => heartbeat_interval,
            other => {
                return Err(GatewayError::Handshake(format!("expected hello, got {other:?}")));
            }
        };

        sink.send(identify_frame(token)).await?;
        let seq = wait_for_ready(&mut stream).await?;
        debug!(?heartbeat_interval, "gateway ready");

        let (events, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            sink,
            stream,
            heartbeat_interval,
            seq,
            events,
            shutdown_rx,
        ));

        Ok((
            Self {
                shutdown: Some(shutdown),
                task: Some(task),
            },
            receiver,
        ))
    }

    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(%error, "gateway task ended abnormally");
            }
        }
    }
}

async fn read_event(stream: &mut SocketStream) -> Result<GatewayEvent, GatewayError> {
    loop {
        let frame = stream.next().await.ok_or(GatewayError::ConnectionClosed)??;
        match frame {
            WsMessage::Text(text) => return decode_event(&text),
            WsMessage::Close(_) => return Err(GatewayError::ConnectionClosed),
            _ => continue,
        }
    }
}

async fn wait_for_ready(stream: &mut SocketStream) -> Result<Option<u64>, GatewayError> {
    loop {
        match read_event(stream).await? {
            GatewayEvent::Dispatch {
                seq,
                event: DispatchEvent::Ready,
            } => return Ok(seq),
            GatewayEvent::InvalidSession => return Err(GatewayError::InvalidSession),
            _ => {}
        }
    }
}

async fn run_connection(
    mut sink: SocketSink,
    mut stream: SocketStream,
    heartbeat_interval: Duration,
    mut last_seq: Option<u64>,
    events: mpsc::UnboundedSender<Message>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(error) = sink.send(heartbeat_frame(last_seq)).await {
                    warn!(%error, "heartbeat failed");
                    break;
                }
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(frame))) => {
                        warn!(?frame, "gateway closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => {
                        warn!(%error, "gateway read failed");
                        break;
                    }
                    None => break,
                };

                match decode_event(&text) {
                    Ok(GatewayEvent::Dispatch { seq, event }) => {
                        if seq.is_some() {
                            last_seq = seq;
                        }
                        match event {
                            DispatchEvent::MessageCreate(message) => {
                                if events.send(*message).is_err() {
                                    break;
                                }
                            }
                            DispatchEvent::Other(name) => debug!(event = %name, "ignored dispatch"),
                            DispatchEvent::Ready => {}
                        }
                    }
                    Ok(GatewayEvent::HeartbeatRequest) => {
                        if let Err(error) = sink.send(heartbeat_frame(last_seq)).await {
                            warn!(%error, "heartbeat failed");
                            break;
                        }
                    }
                    Ok(GatewayEvent::Reconnect) | Ok(GatewayEvent::InvalidSession) => {
                        warn!("gateway ended the session");
                        break;
                    }
                    Ok(GatewayEvent::Other(op)) => debug!(op, "ignored gateway opcode"),
                    Ok(_) => {}
                    Err(error) => debug!(%error, "skipping undecodable gateway frame"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_carries_heartbeat_interval() {
        let event = decode_event(r#"{"op": 10, "d": {"heartbeat_interval": 41250}}"#).expect("hello");
        match event {
            GatewayEvent::Hello { heartbeat_interval } => {
                assert_eq!(heartbeat_interval, Duration::from_millis(41250));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn message_create_dispatch_decodes_message() {
        let text = r#"{
            "op": 0,
            "s": 42,
            "t": "MESSAGE_CREATE",
            "d": {
                "id": "900",
                "channel_id": "10",
                "author": {"id": "2", "username": "bob", "discriminator": "0"},
                "content": "hi <@1>",
                "timestamp": "2024-05-01T10:00:00.000000+00:00",
                "mentions": [{"id": "1", "username": "ann"}],
                "tts": false
            }
        }"#;
        match decode_event(text).expect("dispatch") {
            GatewayEvent::Dispatch {
                seq,
                event: DispatchEvent::MessageCreate(message),
            } => {
                assert_eq!(seq, Some(42));
                assert_eq!(message.channel_id, "10");
                assert_eq!(message.mentions.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_dispatch_is_kept_by_name() {
        let event = decode_event(r#"{"op": 0, "s": 3, "t": "TYPING_START", "d": {}}"#).expect("dispatch");
        assert!(matches!(
            event,
            GatewayEvent::Dispatch { event: DispatchEvent::Other(name), .. } if name == "TYPING_START"
        ));
    }

    #[test]
    fn control_opcodes_are_recognized() {
        assert!(matches!(decode_event(r#"{"op": 11}"#).expect("ack"), GatewayEvent::HeartbeatAck));
        assert!(matches!(decode_event(r#"{"op": 1, "d": null}"#).expect("hb"), GatewayEvent::HeartbeatRequest));
        assert!(matches!(decode_event(r#"{"op": 7, "d": null}"#).expect("rc"), GatewayEvent::Reconnect));
        assert!(matches!(decode_event(r#"{"op": 9, "d": false}"#).expect("is"), GatewayEvent::InvalidSession));
    }

    #[test]
    fn hello_without_interval_is_rejected() {
        assert!(decode_event(r#"{"op": 10, "d": {}}"#).is_err());
    }

    #[test]
    fn endpoint_pins_version_and_encoding() {
        let url = gateway_endpoint("wss://gateway.discord.gg").expect("url");
        assert_eq!(url.as_str(), "wss://gateway.discord.gg/?v=9&encoding=json");
    }

    #[test]
    fn heartbeat_frame_carries_last_sequence() {
        match heartbeat_frame(Some(7)) {
            WsMessage::Text(text) => {
                let value: Value = serde_json::from_str(&text).expect("json");
                assert_eq!(value["op"], 1);
                assert_eq!(value["d"], 7);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
