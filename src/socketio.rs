//! Socket.IO over a bare websocket: the Engine.IO framing, the Socket.IO
//! packet format on top of it, and one task per namespace.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::app::{ChannelId, ChannelState, Inbound};
use crate::config::EngineIo;
use crate::error::{DashboardError, Result};
use crate::ports::Emitter;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or_else(|| DashboardError::packet(frame, "empty frame"))?;
        let body = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(body)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(body.to_string()),
            '3' => EnginePacket::Pong(body.to_string()),
            '4' => EnginePacket::Message(body.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            _ => return Err(DashboardError::packet(frame, "unknown engine.io packet type")),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            // clients never send open
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(p) => format!("2{}", p),
            EnginePacket::Pong(p) => format!("3{}", p),
            EnginePacket::Message(m) => format!("4{}", m),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketKind {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => PacketKind::Connect,
            '1' => PacketKind::Disconnect,
            '2' => PacketKind::Event,
            '3' => PacketKind::Ack,
            '4' => PacketKind::ConnectError,
            '5' => PacketKind::BinaryEvent,
            '6' => PacketKind::BinaryAck,
            _ => return None,
        })
    }

    fn digit(self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
            PacketKind::BinaryEvent => '5',
            PacketKind::BinaryAck => '6',
        }
    }
}

static NULL: Value = Value::Null;

/// `<kind>[<namespace>,][<ack id>][<json>]`
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    pub namespace: String,
    pub id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Connect,
            namespace: namespace.to_string(),
            id: None,
            data: None,
        }
    }

    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self {
            kind: PacketKind::Event,
            namespace: namespace.to_string(),
            id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        }
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let mut rest = raw;
        let kind = rest
            .chars()
            .next()
            .and_then(PacketKind::from_digit)
            .ok_or_else(|| DashboardError::packet(raw, "unknown socket.io packet type"))?;
        rest = &rest[1..];

        if matches!(kind, PacketKind::BinaryEvent | PacketKind::BinaryAck) {
            return Err(DashboardError::packet(raw, "binary attachments are not supported"));
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    let ns = &rest[..end];
                    rest = &rest[end + 1..];
                    ns
                }
                None => std::mem::take(&mut rest),
            }
        } else {
            "/"
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| DashboardError::packet(raw, "ack id out of range"))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace: namespace.to_string(),
            id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Event name and first argument, when this is an event.
    pub fn event_parts(&self) -> Option<(&str, &Value)> {
        if self.kind != PacketKind::Event {
            return None;
        }
        match self.data.as_ref()?.as_array()?.as_slice() {
            [Value::String(name), payload, ..] => Some((name.as_str(), payload)),
            [Value::String(name)] => Some((name.as_str(), &NULL)),
            _ => None,
        }
    }
}

/// Maps an event on this channel to a dispatcher message.
pub type Router = fn(&str, &Value) -> Option<Inbound>;

#[derive(Debug)]
struct Outbound {
    event: String,
    payload: Value,
}

/// Emitting half of a channel. Emits queue until the namespace is joined.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    namespace: &'static str,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Emitter for ChannelHandle {
    fn emit(&self, event: &str, payload: Value) -> Result<()> {
        self.tx
            .send(Outbound {
                event: event.to_string(),
                payload,
            })
            .map_err(|_| DashboardError::ChannelClosed(self.namespace))
    }
}

/// What the channel task does with one received frame.
#[derive(Debug, PartialEq)]
enum Step {
    Nothing,
    Reply(String),
    Joined,
    Deliver(Inbound),
    Closed,
    Refused,
}

/// Protocol state of one namespace connection after the open handshake.
struct Session {
    namespace: &'static str,
    router: Router,
    joined: bool,
}

impl Session {
    fn new(namespace: &'static str, router: Router) -> Self {
        Self {
            namespace,
            router,
            joined: false,
        }
    }

    fn join_frame(&self) -> String {
        EnginePacket::Message(SocketPacket::connect(self.namespace).encode()).encode()
    }

    fn emit_frame(&self, event: &str, payload: Value) -> String {
        EnginePacket::Message(SocketPacket::event(self.namespace, event, payload).encode()).encode()
    }

    fn on_frame(&mut self, text: &str) -> Step {
        let channel = self.namespace;
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(channel, %err, "dropping frame");
                return Step::Nothing;
            }
        };
        let body = match packet {
            EnginePacket::Ping(payload) => return Step::Reply(EnginePacket::Pong(payload).encode()),
            EnginePacket::Pong(_) => {
                trace!(channel, "pong");
                return Step::Nothing;
            }
            EnginePacket::Close => return Step::Closed,
            EnginePacket::Message(body) => body,
            EnginePacket::Open(_) | EnginePacket::Upgrade | EnginePacket::Noop => return Step::Nothing,
        };

        let packet = match SocketPacket::decode(&body) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(channel, %err, "dropping packet");
                return Step::Nothing;
            }
        };
        if packet.namespace != self.namespace {
            return Step::Nothing;
        }
        match packet.kind {
            PacketKind::Connect => {
                self.joined = true;
                Step::Joined
            }
            PacketKind::Disconnect => Step::Closed,
            PacketKind::ConnectError => {
                warn!(channel, data = ?packet.data, "namespace refused");
                Step::Refused
            }
            PacketKind::Event => {
                let Some((event, payload)) = packet.event_parts() else {
                    return Step::Nothing;
                };
                debug!(channel, event, "event");
                match (self.router)(event, payload) {
                    Some(msg) => Step::Deliver(msg),
                    None => Step::Nothing,
                }
            }
            _ => Step::Nothing,
        }
    }
}

/// Engine.IO 3 servers expect the client to ping; 4 pings from the server.
fn client_ping_interval(engine_io: EngineIo, handshake: &Handshake) -> Option<Duration> {
    match engine_io {
        EngineIo::V3 => Some(Duration::from_millis(handshake.ping_interval.max(1))),
        EngineIo::V4 => None,
    }
}

pub struct SocketChannel {
    pub id: ChannelId,
    pub namespace: &'static str,
    pub url: Url,
    pub engine_io: EngineIo,
    pub router: Router,
}

impl SocketChannel {
    /// Runs the channel on the tokio runtime until the server goes away.
    /// No reconnect: a dropped channel leaves its panel as it was.
    pub fn spawn(self, inbound: mpsc::UnboundedSender<Inbound>) -> ChannelHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle {
            namespace: self.namespace,
            tx,
        };
        tokio::spawn(async move {
            let id = self.id;
            let _ = inbound.send(Inbound::ChannelState(id, ChannelState::Connecting));
            match self.run(rx, &inbound).await {
                Ok(()) => info!(channel = id.name(), "channel closed"),
                Err(err) => warn!(channel = id.name(), %err, "channel failed"),
            }
            let _ = inbound.send(Inbound::ChannelState(id, ChannelState::Disconnected));
        });
        handle
    }

    async fn run(
        self,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        inbound: &mpsc::UnboundedSender<Inbound>,
    ) -> Result<()> {
        let channel = self.id.name();
        info!(channel, url = %self.url, "connecting");
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        let handshake = loop {
            match read.next().await {
                Some(Ok(Message::Text(frame))) => match EnginePacket::decode(&frame)? {
                    EnginePacket::Open(handshake) => break handshake,
                    other => debug!(channel, ?other, "frame before open"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(DashboardError::ChannelClosed(self.namespace))
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        };
        debug!(
            channel,
            sid = %handshake.sid,
            ping_interval = handshake.ping_interval,
            ping_timeout = handshake.ping_timeout,
            "engine.io open"
        );

        let mut session = Session::new(self.namespace, self.router);
        write.send(Message::Text(session.join_frame())).await?;

        let ping_every = client_ping_interval(self.engine_io, &handshake);
        let mut ping = tokio::time::interval(ping_every.unwrap_or(Duration::from_secs(3600)));
        ping.tick().await;

        let mut outbound_open = true;

        loop {
            tokio::select! {
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return Err(err.into()),
                    };
                    match session.on_frame(&text) {
                        Step::Nothing => {}
                        Step::Reply(frame) => write.send(Message::Text(frame)).await?,
                        Step::Joined => {
                            info!(channel, namespace = self.namespace, "namespace joined");
                            let _ = inbound.send(Inbound::ChannelState(self.id, ChannelState::Connected));
                        }
                        Step::Deliver(msg) => {
                            if inbound.send(msg).is_err() {
                                // dispatcher is gone, nothing left to update
                                return Ok(());
                            }
                        }
                        Step::Closed => return Ok(()),
                        Step::Refused => return Err(DashboardError::ChannelClosed(self.namespace)),
                    }
                }
                out = outbound.recv(), if session.joined && outbound_open => {
                    match out {
                        Some(Outbound { event, payload }) => {
                            write.send(Message::Text(session.emit_frame(&event, payload))).await?;
                            debug!(channel, event = %event, "emitted");
                        }
                        None => outbound_open = false,
                    }
                }
                _ = ping.tick(), if ping_every.is_some() => {
                    write.send(Message::Text(EnginePacket::Ping(String::new()).encode())).await?;
                }
            }
        }
    }
}
