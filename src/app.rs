use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chart::{ChartSample, ChartWindow};
use crate::constants::{
    CHART_DATA_PATH, SPEEDTEST_NAMESPACE, TESTING_EVENT, TRAFFIC_EVENT, TRAFFIC_NAMESPACE,
};
use crate::ports::{ElementId, Emitter, View};
use crate::speedtest::{self, TestingMessage};
use crate::traffic::{self, TrafficMessage, TrafficReading};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelId {
    Speedtest,
    Traffic,
    ChartData,
}

impl ChannelId {
    pub const ALL: [ChannelId; 3] = [ChannelId::Speedtest, ChannelId::Traffic, ChannelId::ChartData];

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Speedtest => SPEEDTEST_NAMESPACE,
            ChannelId::Traffic => TRAFFIC_NAMESPACE,
            ChannelId::ChartData => CHART_DATA_PATH,
        }
    }

    fn index(self) -> usize {
        match self {
            ChannelId::Speedtest => 0,
            ChannelId::Traffic => 1,
            ChannelId::ChartData => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

/// Everything the dispatcher reacts to, from the user and from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    StartTest,
    Dismiss,
    Testing(TestingMessage),
    Traffic(TrafficMessage),
    ChartData(String),
    ChannelState(ChannelId, ChannelState),
    Shutdown,
}

/// What clicking an element asks for, if anything.
pub fn click(id: ElementId) -> Option<Inbound> {
    match id {
        ElementId::SpeedtestButton => Some(Inbound::StartTest),
        ElementId::DismissTestingResults => Some(Inbound::Dismiss),
        _ => None,
    }
}

pub fn route_speedtest(event: &str, payload: &Value) -> Option<Inbound> {
    if event != TESTING_EVENT {
        debug!(event, "unhandled speedtest event");
        return None;
    }
    match serde_json::from_value(payload.clone()) {
        Ok(msg) => Some(Inbound::Testing(msg)),
        Err(err) => {
            warn!(%err, "malformed testing payload");
            None
        }
    }
}

pub fn route_traffic(event: &str, payload: &Value) -> Option<Inbound> {
    if event != TRAFFIC_EVENT {
        debug!(event, "unhandled traffic event");
        return None;
    }
    match serde_json::from_value(payload.clone()) {
        Ok(msg) => Some(Inbound::Traffic(msg)),
        Err(err) => {
            warn!(%err, "malformed traffic payload");
            None
        }
    }
}

/// Owns the view and the chart window. Every handler runs here, one
/// message at a time; the chart-data handler is the only writer of
/// `window`.
pub struct Dispatcher<V: View, E: Emitter> {
    view: V,
    speedtest: E,
    window: ChartWindow,
    channels: [ChannelState; 3],
    last_update: Option<chrono::DateTime<chrono::Local>>,
}

impl<V: View, E: Emitter> Dispatcher<V, E> {
    pub fn new(view: V, speedtest: E) -> Self {
        Self {
            view,
            speedtest,
            window: ChartWindow::default(),
            channels: [ChannelState::default(); 3],
            last_update: None,
        }
    }

    /// Handles one message; `false` once the dashboard should stop.
    pub fn dispatch(&mut self, msg: Inbound) -> bool {
        match msg {
            Inbound::StartTest => speedtest::trigger(&self.speedtest, self.view.speedtest()),
            Inbound::Dismiss => speedtest::dismiss(self.view.speedtest().results_holder),
            Inbound::Testing(msg) => {
                info!("speed test finished");
                speedtest::on_testing(&msg, self.view.speedtest());
                self.touch();
            }
            Inbound::Traffic(msg) => {
                debug!(data = %msg.data, "traffic");
                traffic::render(&TrafficReading::parse(&msg.data), self.view.traffic());
                self.touch();
            }
            Inbound::ChartData(raw) => self.on_chart_data(&raw),
            Inbound::ChannelState(id, state) => {
                self.channels[id.index()] = state;
            }
            Inbound::Shutdown => return false,
        }
        true
    }

    fn on_chart_data(&mut self, raw: &str) {
        let sample = match ChartSample::from_json(raw) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(%err, raw, "dropping chart sample");
                return;
            }
        };
        self.window.push(sample);
        self.view.chart().redraw(&self.window);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_update = Some(chrono::Local::now());
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn window(&self) -> &ChartWindow {
        &self.window
    }

    pub fn channel_state(&self, id: ChannelId) -> ChannelState {
        self.channels[id.index()]
    }

    pub fn last_update(&self) -> Option<chrono::DateTime<chrono::Local>> {
        self.last_update
    }

    #[cfg(test)]
    pub fn emitter(&self) -> &E {
        &self.speedtest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testing::{RecordingEmitter, RecordingView};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn dispatcher() -> Dispatcher<RecordingView, RecordingEmitter> {
        Dispatcher::new(RecordingView::default(), RecordingEmitter::default())
    }

    fn sample(t: usize) -> Inbound {
        Inbound::ChartData(format!(
            r#"{{"time": "t{}", "ping": {}, "download": 1.5, "upload": 0.5}}"#,
            t, t
        ))
    }

    #[test]
    fn thirty_one_samples_evict_the_first_label() {
        let mut d = dispatcher();
        for t in 1..=31 {
            assert!(d.dispatch(sample(t)));
        }
        let expected: Vec<String> = (2..=31).map(|t| format!("t{}", t)).collect();
        assert_eq!(d.view().chart.labels, expected);
        assert_eq!(d.view().chart.redraws, 31);
        assert_eq!(d.window().len(), 30);
    }

    #[test]
    fn malformed_chart_json_is_dropped_without_redraw() {
        let mut d = dispatcher();
        d.dispatch(sample(1));
        assert!(d.dispatch(Inbound::ChartData("{not json".into())));
        assert_eq!(d.window().len(), 1);
        assert_eq!(d.view().chart.redraws, 1);
    }

    #[test]
    fn speed_test_round_trip() {
        let mut d = dispatcher();
        d.dispatch(Inbound::StartTest);
        assert_eq!(d.view().spinner.visible, Some(true));
        assert_eq!(d.view().results_holder.visible, Some(false));
        assert_eq!(d.emitter().sent.borrow().len(), 1);

        d.dispatch(Inbound::Testing(TestingMessage {
            data: "Ping: 20.1 ms".into(),
        }));
        assert_eq!(d.view().spinner.visible, Some(false));
        assert_eq!(d.view().results_holder.visible, Some(true));
        assert_eq!(d.view().results.text.as_deref(), Some("Ping: 20.1 ms"));
        assert!(d.last_update().is_some());

        d.dispatch(Inbound::Dismiss);
        assert_eq!(d.view().results_holder.visible, Some(false));
    }

    #[test]
    fn traffic_message_fills_fields() {
        let mut d = dispatcher();
        d.dispatch(Inbound::Traffic(TrafficMessage {
            data: "14:02:11 41.20Mbps 9.80Mbps".into(),
        }));
        assert_eq!(d.view().timestamp.text.as_deref(), Some("14:02:11"));
        assert_eq!(d.view().download.text.as_deref(), Some("41.20Mbps"));
        assert_eq!(d.view().upload.text.as_deref(), Some("9.80Mbps"));
    }

    #[test]
    fn tracks_channel_state_and_stops_on_shutdown() {
        let mut d = dispatcher();
        assert_eq!(d.channel_state(ChannelId::Traffic), ChannelState::Connecting);
        d.dispatch(Inbound::ChannelState(ChannelId::Traffic, ChannelState::Connected));
        assert_eq!(d.channel_state(ChannelId::Traffic), ChannelState::Connected);
        assert_eq!(d.channel_state(ChannelId::ChartData), ChannelState::Connecting);
        assert!(!d.dispatch(Inbound::Shutdown));
    }

    #[test]
    fn routes_only_known_events() {
        let testing = route_speedtest("testing", &json!({ "data": "done" }));
        assert_eq!(
            testing,
            Some(Inbound::Testing(TestingMessage { data: "done".into() }))
        );
        assert_eq!(route_speedtest("progress", &json!({ "data": "x" })), None);
        assert_eq!(route_traffic("traffic", &json!({ "nope": 1 })), None);
        assert!(matches!(
            route_traffic("traffic", &json!({ "data": "a b c" })),
            Some(Inbound::Traffic(_))
        ));
    }

    #[test]
    fn only_buttons_are_clickable() {
        assert_eq!(click(ElementId::SpeedtestButton), Some(Inbound::StartTest));
        assert_eq!(click(ElementId::DismissTestingResults), Some(Inbound::Dismiss));
        assert_eq!(click(ElementId::Canvas), None);
    }

    #[tokio::test]
    async fn interleaved_sources_drain_in_arrival_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let chart_tx = tx.clone();
        let traffic_tx = tx.clone();

        let chart = tokio::spawn(async move {
            for t in 1..=40 {
                chart_tx.send(sample(t)).unwrap();
                tokio::task::yield_now().await;
            }
        });
        let traffic = tokio::spawn(async move {
            for i in 0..10 {
                traffic_tx
                    .send(Inbound::Traffic(TrafficMessage {
                        data: format!("00:00:{:02} {}Mbps 0Mbps", i, i),
                    }))
                    .unwrap();
                tokio::task::yield_now().await;
            }
        });
        chart.await.unwrap();
        traffic.await.unwrap();
        tx.send(Inbound::Shutdown).unwrap();

        let mut d = dispatcher();
        while let Some(msg) = rx.recv().await {
            if !d.dispatch(msg) {
                break;
            }
        }

        let labels = &d.view().chart.labels;
        assert_eq!(labels.len(), 30);
        assert_eq!(labels.first().map(String::as_str), Some("t11"));
        assert_eq!(labels.last().map(String::as_str), Some("t40"));
        assert_eq!(d.view().timestamp.text.as_deref(), Some("00:00:09"));
    }
}
