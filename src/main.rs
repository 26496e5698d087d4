mod app;
mod chart;
mod config;
mod constants;
mod error;
mod headless;
mod logging;
mod ports;
mod socketio;
mod speedtest;
mod sse;
mod traffic;
mod ui;
mod util;
mod view;

use std::error::Error;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::{click, ChannelId, Dispatcher, Inbound};
use crate::config::{Cli, Config};
use crate::constants::{SPEEDTEST_NAMESPACE, TRAFFIC_NAMESPACE};
use crate::headless::HeadlessView;
use crate::ports::ElementId;
use crate::socketio::SocketChannel;
use crate::sse::PushStream;
use crate::view::DashboardView;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_cli(Cli::parse())?;
    let _log_guard = logging::init_tracing(&config.log_level, config.log_file.as_deref());

    let socket_url = config.socket_url()?;
    let chart_url = config.chart_url()?;
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    // Three independent feeds, all funnelled into one dispatcher
    let speedtest = SocketChannel {
        id: ChannelId::Speedtest,
        namespace: SPEEDTEST_NAMESPACE,
        url: socket_url.clone(),
        engine_io: config.engine_io,
        router: app::route_speedtest,
    }
    .spawn(inbound_tx.clone());

    // traffic is push only, its emitting half is not needed
    let _ = SocketChannel {
        id: ChannelId::Traffic,
        namespace: TRAFFIC_NAMESPACE,
        url: socket_url,
        engine_io: config.engine_io,
        router: app::route_traffic,
    }
    .spawn(inbound_tx.clone());

    PushStream {
        url: chart_url,
        retry: config.sse_retry,
    }
    .spawn(inbound_tx.clone());

    if config.speedtest_on_start {
        if let Some(msg) = click(ElementId::SpeedtestButton) {
            inbound_tx.send(msg)?;
        }
    }

    info!(server = %config.server, engine_io = config.engine_io.revision(), "Started!");

    if config.headless {
        let shutdown = inbound_tx.clone();
        ctrlc::set_handler(move || {
            let _ = shutdown.send(Inbound::Shutdown);
        })?;
        drop(inbound_tx);
        headless::run(Dispatcher::new(HeadlessView::default(), speedtest), inbound_rx).await;
    } else {
        drop(inbound_tx);
        ui::run(Dispatcher::new(DashboardView::default(), speedtest), inbound_rx, config.tick_rate).await?;
    }

    Ok(())
}
