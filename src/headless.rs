use tokio::sync::mpsc;
use tracing::info;

use crate::app::{Dispatcher, Inbound};
use crate::chart::{ChartWindow, Series};
use crate::ports::{
    ChartSink, ElementId, Emitter, SpeedTestPorts, TextSink, TrafficPorts, View, VisibilitySink,
};

/// Prints every write to its element on stdout.
#[derive(Debug)]
pub struct LogElement {
    id: ElementId,
}

impl LogElement {
    pub fn new(id: ElementId) -> Self {
        Self { id }
    }
}

impl TextSink for LogElement {
    fn set_text(&mut self, text: &str) {
        println!("#{} text = {:?}", self.id.as_str(), text);
    }
}

impl VisibilitySink for LogElement {
    fn set_visible(&mut self, visible: bool) {
        let display = if visible { "inline-block" } else { "none" };
        println!("#{} display = {}", self.id.as_str(), display);
    }
}

#[derive(Debug, Default)]
pub struct LogChart;

impl ChartSink for LogChart {
    fn redraw(&mut self, window: &ChartWindow) {
        let Some(latest) = window.samples().last() else {
            return;
        };
        let values: Vec<String> = Series::ALL
            .iter()
            .map(|s| match latest.value(*s) {
                Some(v) => format!("{}={}", s.name().to_lowercase(), v),
                None => format!("{}=-", s.name().to_lowercase()),
            })
            .collect();
        println!(
            "#{} {}/{} points, {} {}",
            ElementId::Canvas.as_str(),
            window.len(),
            window.capacity(),
            latest.time,
            values.join(" ")
        );
    }
}

#[derive(Debug)]
pub struct HeadlessView {
    testing_spinner: LogElement,
    testing_results_holder: LogElement,
    testing_results: LogElement,
    timestamp: LogElement,
    download: LogElement,
    upload: LogElement,
    canvas: LogChart,
}

impl Default for HeadlessView {
    fn default() -> Self {
        Self {
            testing_spinner: LogElement::new(ElementId::TestingSpinner),
            testing_results_holder: LogElement::new(ElementId::TestingResultsHolder),
            testing_results: LogElement::new(ElementId::TestingResults),
            timestamp: LogElement::new(ElementId::Timestamp),
            download: LogElement::new(ElementId::Download),
            upload: LogElement::new(ElementId::Upload),
            canvas: LogChart,
        }
    }
}

impl View for HeadlessView {
    fn speedtest(&mut self) -> SpeedTestPorts<'_> {
        SpeedTestPorts {
            spinner: &mut self.testing_spinner,
            results_holder: &mut self.testing_results_holder,
            results: &mut self.testing_results,
        }
    }

    fn traffic(&mut self) -> TrafficPorts<'_> {
        TrafficPorts {
            timestamp: &mut self.timestamp,
            download: &mut self.download,
            upload: &mut self.upload,
        }
    }

    fn chart(&mut self) -> &mut dyn ChartSink {
        &mut self.canvas
    }
}

pub async fn run<E: Emitter>(
    mut dispatcher: Dispatcher<HeadlessView, E>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
) {
    while let Some(msg) = inbound.recv().await {
        if !dispatcher.dispatch(msg) {
            info!("shutting down");
            break;
        }
    }
}
