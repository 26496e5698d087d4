use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Invalid server url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported url scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("Websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed socket.io packet `{packet}`: {reason}")]
    Packet { packet: String, reason: &'static str },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event stream rejected: {0}")]
    StreamRejected(String),

    #[error("Channel `{0}` is closed")]
    ChannelClosed(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn packet(packet: &str, reason: &'static str) -> Self {
        Self::Packet {
            packet: packet.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
