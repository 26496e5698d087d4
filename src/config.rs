use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use url::Url;

use crate::constants::{CHART_DATA_PATH, SSE_RETRY_MS, TICK_RATE_MS};
use crate::error::{DashboardError, Result};

#[derive(Parser, Debug)]
#[command(name = "net_dashboard", version, about = "Live speed test, traffic and ping dashboard")]
pub struct Cli {
    /// Origin of the analyze server
    #[arg(long, env = "NET_DASHBOARD_SERVER", default_value = "http://localhost")]
    pub server: String,

    /// Engine.IO protocol revision spoken by the server
    #[arg(long = "engine-io", value_enum, default_value_t = EngineIo::V4)]
    pub engine_io: EngineIo,

    #[arg(long, default_value_t = TICK_RATE_MS)]
    pub tick_rate_ms: u64,

    /// Initial event stream reconnect delay; the server's `retry:` wins
    #[arg(long, default_value_t = SSE_RETRY_MS)]
    pub sse_retry_ms: u64,

    /// Log view updates to stdout instead of drawing the dashboard
    #[arg(long)]
    pub headless: bool,

    /// Start one speed test as soon as the dashboard is up
    #[arg(long)]
    pub speedtest: bool,

    #[arg(long, env = "NET_DASHBOARD_LOG")]
    pub log_file: Option<PathBuf>,

    /// Default tracing filter, RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineIo {
    #[value(name = "3")]
    V3,
    #[value(name = "4")]
    V4,
}

impl EngineIo {
    pub fn revision(self) -> u8 {
        match self {
            EngineIo::V3 => 3,
            EngineIo::V4 => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: Url,
    pub engine_io: EngineIo,
    pub tick_rate: Duration,
    pub sse_retry: Duration,
    pub headless: bool,
    pub speedtest_on_start: bool,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let server = Url::parse(&cli.server).map_err(|source| DashboardError::InvalidUrl {
            url: cli.server.clone(),
            source,
        })?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(DashboardError::UnsupportedScheme(server.scheme().to_string()));
        }

        let log_file = match (cli.log_file, cli.headless) {
            (Some(path), _) => Some(path),
            // stdout belongs to the terminal UI
            (None, false) => Some(PathBuf::from("net_dashboard.log")),
            (None, true) => None,
        };

        Ok(Config {
            server,
            engine_io: cli.engine_io,
            tick_rate: Duration::from_millis(cli.tick_rate_ms.max(1)),
            sse_retry: Duration::from_millis(cli.sse_retry_ms),
            headless: cli.headless,
            speedtest_on_start: cli.speedtest,
            log_file,
            log_level: cli.log_level,
        })
    }

    /// Websocket endpoint of the Socket.IO server. Namespaces are joined
    /// after the handshake, so every channel shares this URL.
    pub fn socket_url(&self) -> Result<Url> {
        let mut url = self.server.clone();
        let scheme = if self.server.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| DashboardError::UnsupportedScheme(scheme.to_string()))?;
        url.set_path("/socket.io/");
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", &self.engine_io.revision().to_string())
            .append_pair("transport", "websocket");
        url.set_fragment(None);
        Ok(url)
    }

    pub fn chart_url(&self) -> Result<Url> {
        self.server
            .join(CHART_DATA_PATH)
            .map_err(|source| DashboardError::InvalidUrl {
                url: format!("{}{}", self.server, CHART_DATA_PATH),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["net_dashboard"];
        argv.extend_from_slice(args);
        Config::from_cli(Cli::parse_from(argv))
    }

    #[test]
    fn socket_url_maps_http_to_ws() {
        let cfg = config(&["--server", "http://raspberrypi.local"]).unwrap();
        assert_eq!(
            cfg.socket_url().unwrap().as_str(),
            "ws://raspberrypi.local/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn socket_url_keeps_port_and_maps_https_to_wss() {
        let cfg = config(&["--server", "https://10.0.0.2:8443/stats", "--engine-io", "3"]).unwrap();
        assert_eq!(
            cfg.socket_url().unwrap().as_str(),
            "wss://10.0.0.2:8443/socket.io/?EIO=3&transport=websocket"
        );
    }

    #[test]
    fn chart_url_is_rooted_at_origin() {
        let cfg = config(&["--server", "http://raspberrypi.local/stats"]).unwrap();
        assert_eq!(cfg.chart_url().unwrap().as_str(), "http://raspberrypi.local/chart-data");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = config(&["--server", "ftp://raspberrypi.local"]).unwrap_err();
        assert!(matches!(err, DashboardError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn rejects_unparsable_server() {
        let err = config(&["--server", "not a url"]).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUrl { .. }));
    }

    #[test]
    fn tui_defaults_to_log_file_and_headless_to_stderr() {
        let tui = config(&[]).unwrap();
        assert_eq!(tui.log_file, Some(PathBuf::from("net_dashboard.log")));

        let headless = config(&["--headless"]).unwrap();
        assert_eq!(headless.log_file, None);
    }
}
