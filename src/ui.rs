use std::{io, time::Duration};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use crate::app::{click, ChannelId, ChannelState, Dispatcher, Inbound};
use crate::chart::{ChartWindow, Series};
use crate::ports::{ElementId, Emitter};
use crate::util::{axis_labels, spinner_frame, y_upper_bound};
use crate::view::DashboardView;

pub async fn run<E: Emitter>(
    dispatcher: Dispatcher<DashboardView, E>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    tick_rate: Duration,
) -> io::Result<()> {
    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, dispatcher, inbound, tick_rate).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err)
    }
    Ok(())
}

enum KeyAction {
    Quit,
    Click(ElementId),
}

fn key_action(key: KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyAction::Quit);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('s') | KeyCode::Enter => Some(KeyAction::Click(ElementId::SpeedtestButton)),
        KeyCode::Char('d') => Some(KeyAction::Click(ElementId::DismissTestingResults)),
        _ => None,
    }
}

async fn run_app_loop<B: ratatui::backend::Backend, E: Emitter>(
    terminal: &mut Terminal<B>,
    mut dispatcher: Dispatcher<DashboardView, E>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(tick_rate);
    let mut frame: usize = 0;
    let mut inbound_open = true;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                frame = frame.wrapping_add(1);
                terminal.draw(|f| draw(f, &dispatcher, frame))?;
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key_action(key) {
                            Some(KeyAction::Quit) => return Ok(()),
                            Some(KeyAction::Click(id)) => {
                                if let Some(msg) = click(id) {
                                    dispatcher.dispatch(msg);
                                }
                            }
                            None => {}
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err),
                    None => return Ok(()),
                }
            }
            msg = inbound.recv(), if inbound_open => {
                match msg {
                    Some(msg) => {
                        if !dispatcher.dispatch(msg) {
                            return Ok(());
                        }
                    }
                    // every feed has ended; keep showing the last state
                    None => inbound_open = false,
                }
            }
        }
    }
}

fn draw<E: Emitter>(f: &mut Frame, dispatcher: &Dispatcher<DashboardView, E>, frame: usize) {
    let view = dispatcher.view();

    // ============= whole screen layout ============
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(7), // Traffic + Speed Test
            Constraint::Min(12),   // Chart
            Constraint::Length(1), // Bottom Status Bar
        ].as_ref())
        .split(f.size());

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(main_chunks[0]);

    // ============= Traffic Box ============
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let traffic_text = vec![
        Line::from(vec![Span::styled("  Time: ", label), Span::styled(view.timestamp.text.clone(), value)]),
        Line::from(vec![
            Span::styled("▼ ", Style::default().fg(Series::Download.color())),
            Span::styled("Down: ", label),
            Span::styled(view.download.text.clone(), value),
        ]),
        Line::from(vec![
            Span::styled("▲ ", Style::default().fg(Series::Upload.color())),
            Span::styled("Up:   ", label),
            Span::styled(view.upload.text.clone(), value),
        ]),
    ];
    let traffic_block = Block::default()
        .borders(Borders::ALL)
        .title(" Traffic ")
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(traffic_text).block(traffic_block), top_chunks[0]);

    // ============= Speed Test Box ============
    let mut speedtest_text = vec![Line::from(vec![
        Span::styled(" [s] ", Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD)),
        Span::raw(" Run speed test "),
    ])];
    if view.testing_spinner.visible {
        speedtest_text.push(Line::from(vec![
            Span::styled(format!(" {} ", spinner_frame(frame)), Style::default().fg(Color::Yellow)),
            Span::styled("Testing...", Style::default().fg(Color::DarkGray)),
        ]));
    }
    if view.testing_results_holder.visible {
        for line in view.testing_results.text.lines() {
            speedtest_text.push(Line::from(Span::styled(format!(" {}", line), value)));
        }
    }
    let mut speedtest_block = Block::default()
        .borders(Borders::ALL)
        .title(" Speed Test ")
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));
    if view.testing_results_holder.visible {
        speedtest_block = speedtest_block.title(
            ratatui::widgets::block::Title::from(" [d] dismiss ")
                .alignment(ratatui::layout::Alignment::Right),
        );
    }
    f.render_widget(Paragraph::new(speedtest_text).block(speedtest_block), top_chunks[1]);

    // ============= Chart ============
    let chart = &view.canvas;
    let datasets = Series::ALL
        .iter()
        .map(|series| {
            Dataset::default()
                .name(series.name())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series.color()))
                .data(chart.points(*series))
        })
        .collect::<Vec<_>>();

    let x_max = (chart.labels.len().saturating_sub(1)).max(1) as f64;
    let y_max = y_upper_bound(chart.max_value());
    let x_labels = axis_labels(&chart.labels)
        .into_iter()
        .map(|l| Span::styled(l, Style::default().fg(Color::DarkGray)))
        .collect::<Vec<_>>();
    let y_labels = vec![
        Span::raw("0"),
        Span::raw(format!("{:.1}", y_max / 2.0)),
        Span::raw(format!("{:.1}", y_max)),
    ];

    let line_chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(chart_title(dispatcher.window()))
                .borders(Borders::ALL)
                .border_type(ratatui::widgets::BorderType::Rounded),
        )
        .x_axis(Axis::default().title("Time").bounds([0.0, x_max]).labels(x_labels))
        .y_axis(Axis::default().title("Value").bounds([0.0, y_max]).labels(y_labels));
    f.render_widget(line_chart, main_chunks[1]);

    // ============ Bottom Status Bar ============
    let mut status_content = vec![Span::styled(
        " FEEDS ",
        Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD),
    )];
    for id in ChannelId::ALL {
        let (marker, color) = match dispatcher.channel_state(id) {
            ChannelState::Connecting => ("…", Color::Yellow),
            ChannelState::Connected => ("●", Color::Green),
            ChannelState::Disconnected => ("○", Color::Red),
        };
        status_content.push(Span::raw(" | "));
        status_content.push(Span::styled(format!("{} {}", marker, id.name()), Style::default().fg(color)));
    }
    let last_update = dispatcher
        .last_update()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    status_content.push(Span::raw(" | "));
    status_content.push(Span::styled(format!("updated @{}", last_update), Style::default().fg(Color::DarkGray)));
    status_content.push(Span::raw(" | Press 'q' to quit"));

    let status_bar = Paragraph::new(Line::from(status_content))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));
    f.render_widget(status_bar, main_chunks[2]);
}

fn chart_title(window: &ChartWindow) -> String {
    if window.is_empty() {
        " Real-Time Status (waiting for data) ".to_string()
    } else {
        format!(" Real-Time Status ({}/{}) ", window.len(), window.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testing::RecordingEmitter;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_buttons() {
        assert!(matches!(
            key_action(key(KeyCode::Char('s'))),
            Some(KeyAction::Click(ElementId::SpeedtestButton))
        ));
        assert!(matches!(
            key_action(key(KeyCode::Char('d'))),
            Some(KeyAction::Click(ElementId::DismissTestingResults))
        ));
        assert!(matches!(key_action(key(KeyCode::Char('q'))), Some(KeyAction::Quit)));
        assert!(matches!(
            key_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        ));
        assert!(key_action(key(KeyCode::Char('x'))).is_none());
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn draws_traffic_results_and_chart() {
        let mut dispatcher = Dispatcher::new(DashboardView::default(), RecordingEmitter::default());
        dispatcher.dispatch(Inbound::Traffic(crate::traffic::TrafficMessage {
            data: "14:02:11 41.20Mbps 9.80Mbps".into(),
        }));
        dispatcher.dispatch(Inbound::Testing(crate::speedtest::TestingMessage {
            data: "Ping: 21.3 ms\nDownload: 48.11 Mbit/s".into(),
        }));
        for t in 0..3 {
            dispatcher.dispatch(Inbound::ChartData(format!(
                r#"{{"time":"14:02:1{}","ping":{},"download":40.0,"upload":9.0}}"#,
                t,
                20 + t
            )));
        }

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, &dispatcher, 0)).unwrap();
        let screen = buffer_text(&terminal);

        assert!(screen.contains("41.20Mbps"));
        assert!(screen.contains("Download: 48.11 Mbit/s"));
        assert!(screen.contains("[d] dismiss"));
        assert!(screen.contains("Real-Time Status (3/30)"));
        assert!(!screen.contains("Testing..."));
    }

    #[test]
    fn empty_chart_says_it_is_waiting() {
        let dispatcher = Dispatcher::new(DashboardView::default(), RecordingEmitter::default());
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, &dispatcher, 0)).unwrap();
        assert!(buffer_text(&terminal).contains("Real-Time Status (waiting for data)"));
    }
}
