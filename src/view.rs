use crate::chart::{ChartWindow, Series};
use crate::ports::{
    ChartSink, SpeedTestPorts, TextSink, TrafficPorts, View, VisibilitySink,
};

// One addressable piece of the dashboard
#[derive(Debug, Clone)]
pub struct Element {
    pub text: String,
    pub visible: bool,
}

impl Element {
    pub fn new(visible: bool) -> Self {
        Self {
            text: String::new(),
            visible,
        }
    }
}

impl TextSink for Element {
    fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }
}

impl VisibilitySink for Element {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// Last redrawn copy of the chart window, in plot coordinates.
#[derive(Debug, Clone, Default)]
pub struct ChartView {
    pub labels: Vec<String>,
    pub ping: Vec<(f64, f64)>,
    pub download: Vec<(f64, f64)>,
    pub upload: Vec<(f64, f64)>,
}

impl ChartView {
    pub fn points(&self, series: Series) -> &[(f64, f64)] {
        match series {
            Series::Ping => &self.ping,
            Series::Download => &self.download,
            Series::Upload => &self.upload,
        }
    }

    pub fn max_value(&self) -> f64 {
        Series::ALL
            .iter()
            .flat_map(|s| self.points(*s).iter().map(|(_, y)| *y))
            .fold(0.0, f64::max)
    }
}

impl ChartSink for ChartView {
    fn redraw(&mut self, window: &ChartWindow) {
        self.labels = window.labels().map(str::to_string).collect();
        for series in Series::ALL {
            // absent values leave a gap at their x position
            let points = window
                .series(series)
                .enumerate()
                .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
                .collect();
            match series {
                Series::Ping => self.ping = points,
                Series::Download => self.download = points,
                Series::Upload => self.upload = points,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardView {
    pub testing_results_holder: Element,
    pub testing_spinner: Element,
    pub testing_results: Element,
    pub timestamp: Element,
    pub download: Element,
    pub upload: Element,
    pub canvas: ChartView,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            testing_results_holder: Element::new(false),
            testing_spinner: Element::new(false),
            testing_results: Element::new(true),
            timestamp: Element::new(true),
            download: Element::new(true),
            upload: Element::new(true),
            canvas: ChartView::default(),
        }
    }
}

impl View for DashboardView {
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
