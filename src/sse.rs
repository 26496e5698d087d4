//! `text/event-stream` client with the reconnect behaviour of a browser
//! `EventSource`: a dropped stream is reopened after the retry delay, a
//! refused one is given up on.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::app::{ChannelId, ChannelState, Inbound};
use crate::constants::SSE_MIN_RETRY_MS;
use crate::error::{DashboardError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental decoder; chunks may split lines, `\r\n` pairs and UTF-8
/// sequences anywhere.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
    data: String,
    event: String,
    last_id: Option<String>,
    retry: Option<Duration>,
    // the previous chunk ended on '\r'; a leading '\n' belongs to it
    pending_cr: bool,
}

impl EventStreamDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(line) = self.take_line() {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Drops a half received event before reconnecting. The last event id
    /// and retry delay survive.
    pub fn reset_pending(&mut self) {
        self.buf.clear();
        self.data.clear();
        self.event.clear();
        self.pending_cr = false;
    }

    fn take_line(&mut self) -> Option<String> {
        if self.pending_cr {
            match self.buf.first() {
                None => return None,
                Some(b'\n') => {
                    self.buf.remove(0);
                }
                Some(_) => {}
            }
            self.pending_cr = false;
        }
        let end = self.buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let consumed = if self.buf[end] == b'\r' {
            match self.buf.get(end + 1) {
                Some(b'\n') => end + 2,
                Some(_) => end + 1,
                None => {
                    self.pending_cr = true;
                    end + 1
                }
            }
        } else {
            end + 1
        };
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.drain(..consumed);
        Some(line)
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let event = std::mem::take(&mut self.event);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(StreamEvent {
            event: if event.is_empty() { "message".to_string() } else { event },
            data,
            id: self.last_id.clone(),
        })
    }
}

enum StreamEnd {
    Closed,
    DispatcherGone,
}

/// What the reconnect loop does after one connection attempt.
#[derive(Debug, PartialEq, Eq)]
enum NextStep {
    Stop,
    GiveUp,
    Reconnect(Duration),
}

fn next_step(outcome: &Result<StreamEnd>, configured: Duration, server: Option<Duration>) -> NextStep {
    match outcome {
        Ok(StreamEnd::DispatcherGone) => NextStep::Stop,
        Err(DashboardError::StreamRejected(_)) => NextStep::GiveUp,
        Ok(StreamEnd::Closed) | Err(_) => {
            NextStep::Reconnect(server.unwrap_or(configured).max(Duration::from_millis(SSE_MIN_RETRY_MS)))
        }
    }
}

/// A stream is only accepted as a 200 carrying `text/event-stream`.
fn check_response(status: StatusCode, content_type: Option<&str>) -> Result<()> {
    if status != StatusCode::OK {
        return Err(DashboardError::StreamRejected(format!("status {}", status)));
    }
    let content_type = content_type.unwrap_or_default();
    if !content_type.starts_with("text/event-stream") {
        return Err(DashboardError::StreamRejected(format!(
            "content type `{}`",
            content_type
        )));
    }
    Ok(())
}

/// Unnamed events carry chart samples; anything else is ignored.
fn forward(event: StreamEvent) -> Option<Inbound> {
    if event.event != "message" {
        debug!(event = %event.event, "ignoring named event");
        return None;
    }
    trace!(id = ?event.id, "chart sample");
    Some(Inbound::ChartData(event.data))
}

pub struct PushStream {
    pub url: Url,
    pub retry: Duration,
}

impl PushStream {
    pub fn spawn(self, inbound: mpsc::UnboundedSender<Inbound>) {
        tokio::spawn(async move { self.run(inbound).await });
    }

    async fn run(self, inbound: mpsc::UnboundedSender<Inbound>) {
        let client = match reqwest::Client::builder().build() {
            Ok(client) => client,
            Err(err) => {
                warn!(%err, "failed to build http client for chart stream");
                let _ = inbound.send(Inbound::ChannelState(ChannelId::ChartData, ChannelState::Disconnected));
                return;
            }
        };
        let mut decoder = EventStreamDecoder::default();

        loop {
            let _ = inbound.send(Inbound::ChannelState(ChannelId::ChartData, ChannelState::Connecting));
            let outcome = self.connect_once(&client, &mut decoder, &inbound).await;
            decoder.reset_pending();
            match (&outcome, next_step(&outcome, self.retry, decoder.retry())) {
                (_, NextStep::Stop) => return,
                (Err(err), NextStep::GiveUp) => {
                    warn!(url = %self.url, %err, "giving up on chart stream");
                    let _ = inbound.send(Inbound::ChannelState(ChannelId::ChartData, ChannelState::Disconnected));
                    return;
                }
                (_, NextStep::GiveUp) => return,
                (result, NextStep::Reconnect(delay)) => {
                    match result {
                        Ok(_) => info!(url = %self.url, "chart stream ended"),
                        Err(err) => warn!(url = %self.url, %err, "chart stream dropped"),
                    }
                    let _ = inbound.send(Inbound::ChannelState(ChannelId::ChartData, ChannelState::Disconnected));
                    info!(delay_ms = delay.as_millis() as u64, "reconnecting chart stream");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn request(&self, client: &reqwest::Client, decoder: &EventStreamDecoder) -> reqwest::RequestBuilder {
        let mut request = client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = decoder.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }
        request
    }

    async fn connect_once(
        &self,
        client: &reqwest::Client,
        decoder: &mut EventStreamDecoder,
        inbound: &mpsc::UnboundedSender<Inbound>,
    ) -> Result<StreamEnd> {
        let response = self.request(client, decoder).send().await?;
        check_response(
            response.status(),
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        )?;

        info!(url = %self.url, "chart stream open");
        let _ = inbound.send(Inbound::ChannelState(ChannelId::ChartData, ChannelState::Connected));

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for msg in decoder.feed(&chunk?).into_iter().filter_map(forward) {
                if inbound.send(msg).is_err() {
                    return Ok(StreamEnd::DispatcherGone);
                }
            }
        }
        Ok(StreamEnd::Closed)
    }
}
