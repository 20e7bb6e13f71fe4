//! Full-screen terminal front end for a [`BoardClient`]: connection and
//! recording controls, the sensor slots, interval bookkeeping, a live log and
//! a chart of the reference sensor.

use std::{
    collections::VecDeque,
    io,
    path::PathBuf,
    sync::mpsc::{Receiver, TryRecvError},
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph, Wrap},
};

use crate::analysis::{analyze, IntervalChoice};
use crate::board_client::BoardClient;
use crate::device::{DataRate, DeviceParams, ParameterUpdate, Range};
use crate::error::ExportError;
use crate::export::export_table;
use crate::gui::{error::GuiError, select_option};
use crate::reading::{SensorId, SENSOR_SLOTS};
use crate::session::{ConnectionState, SessionEvent};

const LOG_LINES: usize = 200;
const CHART_WINDOW: usize = 200;

/// Something the user asked for from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
    Start,
    Stop,
    Clear,
    ChooseDataRate,
    ChooseRange,
    ChooseInterval,
    Export,
    Analyse,
    Quit,
}

impl Action {
    pub fn from_key(code: KeyCode) -> Option<Action> {
        let action = match code {
            KeyCode::Char('c') => Action::Connect,
            KeyCode::Char('d') => Action::Disconnect,
            KeyCode::Char('s') => Action::Start,
            KeyCode::Char('t') => Action::Stop,
            KeyCode::Char('x') => Action::Clear,
            KeyCode::Char('r') => Action::ChooseDataRate,
            KeyCode::Char('g') => Action::ChooseRange,
            KeyCode::Char('i') => Action::ChooseInterval,
            KeyCode::Char('e') => Action::Export,
            KeyCode::Char('a') => Action::Analyse,
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            _ => return None,
        };
        Some(action)
    }
}

pub struct Dashboard {
    client: BoardClient,
    events: Receiver<SessionEvent>,
    out_dir: PathBuf,
    interval: IntervalChoice,
    state: ConnectionState,
    params: DeviceParams,
    status: String,
    active: [bool; SENSOR_SLOTS as usize],
    actual_interval: Option<i64>,
    drift: Option<String>,
    log: VecDeque<String>,
    malformed: usize,
    readings: usize,
    analysis: Vec<String>,
    reference: Option<SensorId>,
    /// x, y and z of the reference sensor against normalized time.
    points: [Vec<(f64, f64)>; 3],
    quit: bool,
}

impl Dashboard {
    pub fn new(
        client: BoardClient,
        events: Receiver<SessionEvent>,
        out_dir: PathBuf,
        interval: IntervalChoice,
    ) -> Self {
        let params = client.params();
        Self {
            client,
            events,
            out_dir,
            interval,
            state: ConnectionState::Disconnected,
            params,
            status: "Press c to connect to the board.".to_owned(),
            active: [false; SENSOR_SLOTS as usize],
            actual_interval: None,
            drift: None,
            log: VecDeque::with_capacity(LOG_LINES),
            malformed: 0,
            readings: 0,
            analysis: Vec::new(),
            reference: None,
            points: Default::default(),
            quit: false,
        }
    }

    pub fn client_mut(&mut self) -> &mut BoardClient {
        &mut self.client
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    /// Fold one session event into what is shown.
    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Status(text) => {
                self.push_log(text.clone());
                self.status = text;
            }
            SessionEvent::ConnectionStateChanged(state) => self.state = state,
            SessionEvent::SensorActivated(id) => {
                if let Some(slot) = self.active.get_mut(id as usize) {
                    *slot = true;
                }
            }
            SessionEvent::SensorsCleared => {
                self.active = [false; SENSOR_SLOTS as usize];
                self.analysis.clear();
            }
            SessionEvent::IntervalComputed(ms) => self.actual_interval = ms,
            SessionEvent::IntervalDrift(warning) => self.drift = warning,
            SessionEvent::MalformedLine(line) => {
                self.malformed += 1;
                self.push_log(format!("Invalid data: {line}"));
            }
            SessionEvent::Reading(r) => self.push_log(format!(
                "S{} {:>10.1} ms  x {:>8.3}  y {:>8.3}  z {:>8.3}  |a| {:>8.3}",
                r.sensor_id,
                r.timestamp_ms,
                r.x,
                r.y,
                r.z,
                r.magnitude()
            )),
        }
    }

    /// Apply every event waiting on the channel.
    pub fn drain_events(&mut self) -> Result<(), GuiError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Pull the parameters and chart data from the client.
    pub fn on_tick(&mut self) {
        self.params = self.client.params();
        let (readings, reference, points) = self.client.with_store(|store| {
            let reference = store.reference_sensor();
            let points: [Vec<(f64, f64)>; 3] = reference
                .and_then(|id| store.series(id))
                .map(|series| {
                    let start = series.len().saturating_sub(CHART_WINDOW);
                    let t = &series.normalized_timestamps()[start..];
                    [series.x(), series.y(), series.z()]
                        .map(|axis| {
                            t.iter()
                                .copied()
                                .zip(axis[start..].iter().copied())
                                .collect::<Vec<_>>()
                        })
                })
                .unwrap_or_default();
            (store.reading_count(), reference, points)
        });
        self.readings = readings;
        self.reference = reference;
        self.points = points;
    }

    /// Carry out everything but the choices, which need the terminal.
    pub fn perform(&mut self, action: Action) {
        let result = match action {
            Action::Connect => {
                let (host, port) = (self.client.config().host.clone(), self.client.config().port);
                self.client.connect(&host, port)
            }
            Action::Disconnect => self.client.disconnect(),
            Action::Start => self.client.start_recording(),
            Action::Stop => self.client.stop_recording(),
            Action::Clear => {
                self.client.clear();
                Ok(())
            }
            Action::Export => {
                self.export();
                Ok(())
            }
            Action::Analyse => {
                self.analyse();
                Ok(())
            }
            Action::Quit => {
                self.quit = true;
                Ok(())
            }
            Action::ChooseDataRate | Action::ChooseRange | Action::ChooseInterval => Ok(()),
        };
        // Failures have already been reported as status events.
        if let Err(error) = result {
            debug!("{action:?} failed: {error}");
        }
    }

    pub fn update_parameter(&mut self, update: ParameterUpdate) {
        if let Err(error) = self.client.update_parameter(update) {
            debug!("Changing sensor {} failed: {error}", update.name());
        }
    }

    pub fn set_interval_choice(&mut self, interval: IntervalChoice) {
        self.interval = interval;
        self.status = format!("Analysis uses the {interval} interval.");
    }

    /// Write the CSV files of every recorded sensor.
    pub fn export(&mut self) {
        let table = self.client.snapshot_table(None);
        self.status = match export_table(&table, &self.out_dir, None) {
            Ok(written) => format!(
                "Data has been processed! {} files written to {}.",
                written.len(),
                self.out_dir.display()
            ),
            Err(ExportError::NoData) => ExportError::NoData.to_string(),
            Err(error) => {
                warn!("Export failed: {error}");
                format!("Error processing data: {error}")
            }
        };
    }

    /// Summarise every recorded sensor: RMS and the strongest frequency on
    /// each axis.
    pub fn analyse(&mut self) {
        let table = self.client.snapshot_table(None);
        if table.is_empty() {
            self.status = ExportError::NoData.to_string();
            return;
        }
        let interval_ms = self.interval.interval_ms(&self.client.params());
        self.analysis = table
            .sensors()
            .into_iter()
            .filter_map(|id| analyze(&table, id, interval_ms))
            .map(|a| {
                let peak = |i: usize| {
                    a.spectra[i]
                        .peak()
                        .map(|(f, _)| format!("{f:.2} Hz"))
                        .unwrap_or_else(|| "-".to_owned())
                };
                format!(
                    "S{}: {} samples, RMS {:.3} m/s², peak x {} y {} z {}",
                    a.sensor_id,
                    a.stats[0].count,
                    a.rms.unwrap_or_default(),
                    peak(0),
                    peak(1),
                    peak(2)
                )
            })
            .collect();
        self.status = format!("Analysed with a {interval_ms} ms interval.");
    }
}

/// Take over the terminal and run the dashboard until the user quits.
pub fn run_dashboard(dashboard: &mut Dashboard) -> Result<(), GuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let tick_rate = Duration::from_millis(100);
    let res = run_app(&mut terminal, dashboard, tick_rate);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut Dashboard,
    tick_rate: Duration,
) -> Result<(), GuiError> {
    let mut last_tick = Instant::now();
    app.on_tick();
    while !app.should_quit() {
        app.drain_events()?;
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = Action::from_key(key.code) {
                        choose_or_perform(terminal, app, action)?;
                    }
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
    Ok(())
}

fn choose_or_perform<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut Dashboard,
    action: Action,
) -> Result<(), GuiError> {
    match action {
        Action::ChooseDataRate => {
            let current = DataRate::ALL
                .iter()
                .position(|r| *r == app.params.data_rate)
                .unwrap_or(0);
            if let Some(i) = select_option(terminal, "Data rate", &DataRate::ALL, current)? {
                app.update_parameter(ParameterUpdate::DataRate(DataRate::ALL[i]));
            }
        }
        Action::ChooseRange => {
            let current = Range::ALL
                .iter()
                .position(|r| *r == app.params.range)
                .unwrap_or(0);
            if let Some(i) = select_option(terminal, "Range", &Range::ALL, current)? {
                app.update_parameter(ParameterUpdate::Range(Range::ALL[i]));
            }
        }
        Action::ChooseInterval => {
            let current = IntervalChoice::ALL
                .iter()
                .position(|c| *c == app.interval)
                .unwrap_or(0);
            if let Some(i) = select_option(terminal, "Interval", &IntervalChoice::ALL, current)? {
                app.set_interval_choice(IntervalChoice::ALL[i]);
            }
        }
        other => app.perform(other),
    }
    Ok(())
}

fn state_label(state: ConnectionState) -> Span<'static> {
    match state {
        ConnectionState::Disconnected => "Disconnected".red().bold(),
        ConnectionState::Connecting => "Connecting".yellow().bold(),
        ConnectionState::Connected(_) if state.is_recording() => "Recording".green().bold(),
        ConnectionState::Connected(_) => "Connected".cyan().bold(),
    }
}

/// Bounds of `points` on one axis, padded so flat lines stay visible.
fn bounds(points: &[Vec<(f64, f64)>], pick: fn(&(f64, f64)) -> f64) -> [f64; 2] {
    let (lo, hi) = points
        .iter()
        .flatten()
        .map(pick)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    [lo - pad, hi + pad]
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::from(format!("{v:.1}")))
        .collect()
}

fn ui(f: &mut Frame, app: &Dashboard) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(f.size());

    let interval = match app.actual_interval {
        Some(ms) => format!("{ms} ms"),
        None => "-".to_owned(),
    };
    let header = Paragraph::new(vec![
        Line::from(vec![
            " State ".into(),
            state_label(app.state),
            "  Board ".into(),
            Span::from(format!("{}:{}", app.client.config().host, app.client.config().port)).bold(),
        ]),
        Line::from(vec![
            " Data rate ".into(),
            Span::from(app.params.data_rate.to_string()).bold(),
            "  Range ".into(),
            Span::from(app.params.range.to_string()).bold(),
            "  Expected interval ".into(),
            Span::from(format!("{} ms", app.params.expected_interval_ms())).bold(),
            "  Actual interval ".into(),
            Span::from(interval).bold(),
            "  Analysis uses ".into(),
            Span::from(app.interval.to_string()).bold(),
        ]),
    ])
    .block(Block::default().title(" accelstream ".magenta().bold()).borders(Borders::ALL));
    f.render_widget(header, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(20)])
        .split(rows[1]);

    let mut side: Vec<Line> = vec![Line::from(
        (0..SENSOR_SLOTS)
            .flat_map(|id| {
                let slot = Span::from(format!(" {id} "));
                let span = if app.active[id as usize] {
                    slot.black().on_green()
                } else {
                    slot.dark_gray()
                };
                [span, " ".into()]
            })
            .collect::<Vec<_>>(),
    )];
    side.push(Line::from(format!("Readings: {}", app.readings)));
    side.push(Line::from(format!("Malformed lines: {}", app.malformed)));
    if let Some(warning) = &app.drift {
        side.push(Line::from(warning.as_str().yellow()));
    }
    side.extend(app.analysis.iter().map(|l| Line::from(l.as_str())));
    let sensors = Paragraph::new(side)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Sensors ").borders(Borders::ALL));
    f.render_widget(sensors, body[0]);

    let x_bounds = bounds(&app.points, |p| p.0);
    let y_bounds = bounds(&app.points, |p| p.1);
    let datasets = ["x", "y", "z"]
        .iter()
        .zip([Color::Cyan, Color::Magenta, Color::Yellow])
        .zip(&app.points)
        .map(|((name, color), points)| {
            Dataset::default()
                .name(*name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(points)
        })
        .collect();
    let title = match app.reference {
        Some(id) => format!(" Sensor {id} "),
        None => " No data ".to_owned(),
    };
    let chart = Chart::new(datasets)
        .block(Block::default().title(title).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Time [s]")
                .style(Style::default().fg(Color::White))
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title("m/s²")
                .style(Style::default().fg(Color::White))
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );
    f.render_widget(chart, body[1]);

    let visible = rows[2].height.saturating_sub(2) as usize;
    let log: Vec<ListItem> = app
        .log
        .iter()
        .skip(app.log.len().saturating_sub(visible))
        .map(|l| ListItem::new(l.as_str()))
        .collect();
    f.render_widget(
        List::new(log).block(Block::default().title(" Log ").borders(Borders::ALL)),
        rows[2],
    );

    let keys = Line::from(vec![
        " c".magenta().bold(),
        "onnect ".into(),
        "d".magenta().bold(),
        "isconnect ".into(),
        "s".magenta().bold(),
        "tart ".into(),
        "t".magenta().bold(),
        " stop ".into(),
        "x".magenta().bold(),
        " clear ".into(),
        "r".magenta().bold(),
        "ate ".into(),
        "g".magenta().bold(),
        " range ".into(),
        "i".magenta().bold(),
        "nterval ".into(),
        "e".magenta().bold(),
        "xport ".into(),
        "a".magenta().bold(),
        "nalyse ".into(),
        "q".magenta().bold(),
        "uit".into(),
    ]);
    let footer = Paragraph::new(vec![Line::from(app.status.as_str()), keys])
        .block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, rows[3]);
}
