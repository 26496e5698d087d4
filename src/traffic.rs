use serde::Deserialize;

use crate::constants::MISSING_FIELD;
use crate::ports::TrafficPorts;

/// Payload of the server's `traffic` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrafficMessage {
    pub data: String,
}

/// `"<timestamp> <download> <upload>"`, read positionally. Fields the
/// payload does not carry stay `None`; extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrafficReading {
    pub timestamp: Option<String>,
    pub download: Option<String>,
    pub upload: Option<String>,
}

impl TrafficReading {
    pub fn parse(payload: &str) -> Self {
        let mut fields = payload.trim().split(' ').map(str::to_string);
        TrafficReading {
            timestamp: fields.next(),
            download: fields.next(),
            upload: fields.next(),
        }
    }
}

pub fn render(reading: &TrafficReading, ports: TrafficPorts<'_>) {
    ports.timestamp.set_text(field(reading.timestamp.as_deref()));
    ports.download.set_text(field(reading.download.as_deref()));
    ports.upload.set_text(field(reading.upload.as_deref()));
}

fn field(value: Option<&str>) -> &str {
    value.unwrap_or(MISSING_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testing::RecordingView;
    use crate::ports::View;

    fn rendered(payload: &str) -> (String, String, String) {
        let mut view = RecordingView::default();
        render(&TrafficReading::parse(payload), view.traffic());
        (
            view.timestamp.text.unwrap(),
            view.download.text.unwrap(),
            view.upload.text.unwrap(),
        )
    }

    #[test]
    fn renders_fields_verbatim() {
        assert_eq!(
            rendered("14:02:11 41.20Mbps 9.80Mbps"),
            ("14:02:11".into(), "41.20Mbps".into(), "9.80Mbps".into())
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(
            rendered("  14:02:11 0.01Mbps 0.00Mbps\n"),
            ("14:02:11".into(), "0.01Mbps".into(), "0.00Mbps".into())
        );
    }

    #[test]
    fn short_payload_yields_undefined() {
        assert_eq!(
            rendered("14:02:11 41.20Mbps"),
            ("14:02:11".into(), "41.20Mbps".into(), "undefined".into())
        );
    }

    #[test]
    fn unmatched_server_line_renders_empty_then_undefined() {
        // the server sends "  " when ifstat output did not match
        assert_eq!(
            rendered("  "),
            ("".into(), "undefined".into(), "undefined".into())
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let reading = TrafficReading::parse("a b c d");
        assert_eq!(reading.upload.as_deref(), Some("c"));
    }
}
