use std::collections::VecDeque;

use ratatui::style::Color;
use serde::{Deserialize, Deserializer};

use crate::constants::CHART_WINDOW;
use crate::error::Result;

/// One point pushed by `/chart-data`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartSample {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(default)]
    pub ping: Option<f64>,
    #[serde(default)]
    pub download: Option<f64>,
    #[serde(default)]
    pub upload: Option<f64>,
}

// `"time": null` labels the point with an empty string
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChartSample {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn value(&self, series: Series) -> Option<f64> {
        match series {
            Series::Ping => self.ping,
            Series::Download => self.download,
            Series::Upload => self.upload,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Series {
    Ping,
    Download,
    Upload,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Ping, Series::Download, Series::Upload];

    pub fn name(self) -> &'static str {
        match self {
            Series::Ping => "Ping",
            Series::Download => "Download",
            Series::Upload => "Upload",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Series::Ping => Color::Rgb(255, 99, 132),
            Series::Download => Color::Rgb(65, 138, 84),
            Series::Upload => Color::Rgb(73, 85, 166),
        }
    }
}

/// Fixed capacity FIFO of the most recent samples. Labels and the three
/// series are read out of the same tuples, so they can never drift apart.
#[derive(Debug, Clone)]
pub struct ChartWindow {
    samples: VecDeque<ChartSample>,
    capacity: usize,
}

impl Default for ChartWindow {
    fn default() -> Self {
        Self::with_capacity(CHART_WINDOW)
    }
}

impl ChartWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `sample`, evicting and returning the oldest one when full.
    pub fn push(&mut self, sample: ChartSample) -> Option<ChartSample> {
        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.samples.iter().map(|s| s.time.as_str())
    }

    pub fn series(&self, series: Series) -> impl Iterator<Item = Option<f64>> + '_ {
        self.samples.iter().map(move |s| s.value(series))
    }

    pub fn samples(&self) -> impl Iterator<Item = &ChartSample> + '_ {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: usize) -> ChartSample {
        ChartSample {
            time: format!("t{}", i),
            ping: Some(i as f64),
            download: Some(i as f64 * 2.0),
            upload: Some(i as f64 * 3.0),
        }
    }

    #[test]
    fn window_length_is_min_of_pushes_and_capacity() {
        for n in [0, 1, 29, 30, 31, 75] {
            let mut window = ChartWindow::default();
            for i in 1..=n {
                window.push(sample(i));
            }
            assert_eq!(window.len(), n.min(CHART_WINDOW), "after {} pushes", n);
        }
    }

    #[test]
    fn thirty_first_sample_evicts_the_first() {
        let mut window = ChartWindow::default();
        for i in 1..=30 {
            assert!(window.push(sample(i)).is_none());
        }
        let evicted = window.push(sample(31)).unwrap();
        assert_eq!(evicted.time, "t1");

        let labels: Vec<&str> = window.labels().collect();
        let expected: Vec<String> = (2..=31).map(|i| format!("t{}", i)).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn series_stay_aligned_with_labels() {
        let mut window = ChartWindow::default();
        for i in 1..=45 {
            window.push(sample(i));
        }
        let labels: Vec<&str> = window.labels().collect();
        let ping: Vec<Option<f64>> = window.series(Series::Ping).collect();
        let upload: Vec<Option<f64>> = window.series(Series::Upload).collect();
        assert_eq!(labels.len(), ping.len());
        assert_eq!(labels.len(), upload.len());
        assert_eq!(labels[0], "t16");
        assert_eq!(ping[0], Some(16.0));
        assert_eq!(upload[29], Some(135.0));
    }

    #[test]
    fn parses_server_sample() {
        let s = ChartSample::from_json(
            r#"{"time": "14:02:11", "ping": 23.4, "download": 41.2, "upload": 9.8}"#,
        )
        .unwrap();
        assert_eq!(s.time, "14:02:11");
        assert_eq!(s.value(Series::Download), Some(41.2));
    }

    #[test]
    fn missing_values_are_gaps() {
        let s = ChartSample::from_json(r#"{"time": "14:02:12", "ping": null}"#).unwrap();
        assert_eq!(s.ping, None);
        assert_eq!(s.upload, None);
    }

    #[test]
    fn null_or_absent_time_keeps_the_values() {
        let s = ChartSample::from_json(r#"{"time": null, "ping": 20.0, "download": 41.2, "upload": 9.8}"#)
            .unwrap();
        assert_eq!(s.time, "");
        assert_eq!(s.value(Series::Ping), Some(20.0));
        assert_eq!(s.value(Series::Upload), Some(9.8));

        let s = ChartSample::from_json(r#"{"ping": 1.0}"#).unwrap();
        assert_eq!(s.time, "");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ChartSample::from_json("{time: 1").is_err());
    }
}
