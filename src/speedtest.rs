use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::constants::{START_TEST_EVENT, START_TEST_PAYLOAD};
use crate::ports::{Emitter, SpeedTestPorts, VisibilitySink};

/// Payload of the server's `testing` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestingMessage {
    pub data: String,
}

/// Asks the server for a speed test and switches the panel to busy.
/// There is no timeout: if `testing` never arrives the spinner stays up.
pub fn trigger(emitter: &dyn Emitter, ports: SpeedTestPorts<'_>) {
    match emitter.emit(START_TEST_EVENT, json!({ "data": START_TEST_PAYLOAD })) {
        Ok(()) => info!("speed test requested"),
        Err(err) => warn!(%err, "failed to request speed test"),
    }
    ports.spinner.set_visible(true);
    ports.results_holder.set_visible(false);
}

pub fn on_testing(message: &TestingMessage, ports: SpeedTestPorts<'_>) {
    ports.results.set_text(&message.data);
    ports.spinner.set_visible(false);
    ports.results_holder.set_visible(true);
}

pub fn dismiss(results_holder: &mut dyn VisibilitySink) {
    results_holder.set_visible(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testing::{RecordingElement, RecordingEmitter, RecordingView};
    use crate::ports::View;

    #[test]
    fn trigger_emits_start_test_and_shows_spinner() {
        let mut view = RecordingView::default();
        view.results_holder.visible = Some(true);
        let emitter = RecordingEmitter::default();

        trigger(&emitter, view.speedtest());

        let sent = emitter.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "start_test");
        assert_eq!(sent[0].1, json!({ "data": "start_test" }));
        assert_eq!(view.spinner.visible, Some(true));
        assert_eq!(view.results_holder.visible, Some(false));
    }

    #[test]
    fn trigger_updates_panel_even_when_emit_fails() {
        let mut view = RecordingView::default();
        let emitter = RecordingEmitter {
            fail: true,
            ..Default::default()
        };

        trigger(&emitter, view.speedtest());

        assert_eq!(view.spinner.visible, Some(true));
        assert_eq!(view.results_holder.visible, Some(false));
    }

    #[test]
    fn testing_message_replaces_spinner_with_result() {
        let mut view = RecordingView::default();
        view.spinner.visible = Some(true);
        let msg = TestingMessage {
            data: "Ping: 21.3 ms\nDownload: 48.11 Mbit/s\nUpload: 10.52 Mbit/s\n".into(),
        };

        on_testing(&msg, view.speedtest());

        assert_eq!(view.results.text.as_deref(), Some(msg.data.as_str()));
        assert_eq!(view.spinner.visible, Some(false));
        assert_eq!(view.results_holder.visible, Some(true));
    }

    #[test]
    fn dismiss_hides_regardless_of_state() {
        for initial in [None, Some(true), Some(false)] {
            let mut holder = RecordingElement {
                visible: initial,
                ..Default::default()
            };
            dismiss(&mut holder);
            dismiss(&mut holder);
            assert_eq!(holder.visible, Some(false));
        }
    }
}
