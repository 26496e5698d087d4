//! Named output ports the handlers write through. The terminal view, the
//! headless logger and the test doubles all implement these.

use serde_json::Value;

use crate::chart::ChartWindow;
use crate::error::Result;

/// Dashboard element ids, kept identical to the page the server renders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementId {
    DismissTestingResults,
    TestingResultsHolder,
    SpeedtestButton,
    TestingSpinner,
    TestingResults,
    Timestamp,
    Download,
    Upload,
    Canvas,
}

impl ElementId {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementId::DismissTestingResults => "dismissTestingResults",
            ElementId::TestingResultsHolder => "testingResultsHolder",
            ElementId::SpeedtestButton => "speedtestButton",
            ElementId::TestingSpinner => "testingSpinner",
            ElementId::TestingResults => "testingResults",
            ElementId::Timestamp => "timestamp",
            ElementId::Download => "download",
            ElementId::Upload => "upload",
            ElementId::Canvas => "canvas",
        }
    }
}

pub trait TextSink {
    fn set_text(&mut self, text: &str);
}

pub trait VisibilitySink {
    fn set_visible(&mut self, visible: bool);
}

pub trait ChartSink {
    fn redraw(&mut self, window: &ChartWindow);
}

/// Client-to-server side of a socket channel.
pub trait Emitter {
    fn emit(&self, event: &str, payload: Value) -> Result<()>;
}

pub struct SpeedTestPorts<'a> {
    pub spinner: &'a mut dyn VisibilitySink,
    pub results_holder: &'a mut dyn VisibilitySink,
    pub results: &'a mut dyn TextSink,
}

pub struct TrafficPorts<'a> {
    pub timestamp: &'a mut dyn TextSink,
    pub download: &'a mut dyn TextSink,
    pub upload: &'a mut dyn TextSink,
}

pub trait View {
    fn speedtest(&mut self) -> SpeedTestPorts<'_>;
    fn traffic(&mut self) -> TrafficPorts<'_>;
    fn chart(&mut self) -> &mut dyn ChartSink;
}
