use crate::constants::SPINNER_FRAMES;

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

// First, middle and last label; the chart spreads them evenly
pub fn axis_labels(labels: &[String]) -> Vec<String> {
    match labels.len() {
        0 => vec![],
        1 => vec![labels[0].clone()],
        2 => labels.to_vec(),
        n => vec![labels[0].clone(), labels[(n - 1) / 2].clone(), labels[n - 1].clone()],
    }
}

/// Y axis ceiling with 10% headroom, never below 1.
pub fn y_upper_bound(max_value: f64) -> f64 {
    (max_value * 1.1).max(1.0)
}
