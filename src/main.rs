mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::Sender,
    time::Duration,
};

use trod::{
    config::{ConfigStore, FileConfigStore},
    error::RecordError,
    health::{BodyMetric, SqliteHealthStore, WorkoutRecord},
    pedometer::CadenceStepSource,
    recorder::WorkoutRecorder,
    resume::FileStartTimeStore,
    runtime::{CrosstermEventSource, FixedTicker, Runner, TrackEvent},
    session::{SessionSnapshot, SessionTracker, MIN_RECORDABLE_SESSION_SECS},
    units::DistanceUnit,
};

const TICK_RATE_MS: u64 = 250;

/// treadmill walking tracker with live step counting and workout logging
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Track a treadmill walking session in the terminal: live step count and elapsed time while you walk, then enter the distance from the belt display and the workout (steps, duration, distance, estimated calories) is logged locally."
)]
pub struct Cli {
    /// belt cadence in steps per minute for the built-in step source (0 simulates an absent sensor)
    #[clap(short = 'c', long)]
    cadence: Option<u32>,

    /// unit used when entering walked distance
    #[clap(short = 'u', long, value_enum)]
    unit: Option<DistanceUnit>,

    /// record your body weight in kilograms (improves the calorie estimate)
    #[clap(short = 'w', long)]
    weight: Option<f64>,

    /// export the workout log as CSV to the given path and exit
    #[clap(long)]
    export: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Idle,
    Tracking,
    Summary,
    History,
}

pub struct App {
    pub tracker: SessionTracker<CadenceStepSource, FileStartTimeStore>,
    pub recorder: WorkoutRecorder<SqliteHealthStore>,
    pub state: AppState,
    pub unit: DistanceUnit,
    pub distance_input: String,
    pub snapshot: Option<SessionSnapshot>,
    pub last_saved: Option<WorkoutRecord>,
    pub save_error: Option<RecordError>,
    pub status: Option<String>,
    pub history: Vec<WorkoutRecord>,
}

impl App {
    pub fn new(
        tracker: SessionTracker<CadenceStepSource, FileStartTimeStore>,
        recorder: WorkoutRecorder<SqliteHealthStore>,
        unit: DistanceUnit,
    ) -> Self {
        Self {
            tracker,
            recorder,
            state: AppState::Idle,
            unit,
            distance_input: String::new(),
            snapshot: None,
            last_saved: None,
            save_error: None,
            status: None,
            history: Vec::new(),
        }
    }

    /// Handle one key press; returns false when the app should exit
    fn on_key(&mut self, code: KeyCode, step_tx: &Sender<TrackEvent>) -> bool {
        match self.state {
            AppState::Idle => match code {
                KeyCode::Char('s') | KeyCode::Enter => self.start_session(step_tx),
                KeyCode::Char('h') => {
                    self.history = self
                        .recorder
                        .store()
                        .recent_workouts(10)
                        .unwrap_or_default();
                    self.state = AppState::History;
                }
                KeyCode::Char('q') | KeyCode::Esc => return false,
                _ => {}
            },
            AppState::Tracking => match code {
                KeyCode::Char('s') | KeyCode::Enter => self.stop_session(),
                KeyCode::Esc => {
                    self.tracker.stop_tracking();
                    self.status = Some("session discarded".into());
                    self.state = AppState::Idle;
                }
                _ => {}
            },
            AppState::Summary => match code {
                KeyCode::Char('u') => self.unit = self.unit.toggled(),
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                    self.distance_input.push(c);
                }
                KeyCode::Backspace => {
                    self.distance_input.pop();
                }
                KeyCode::Enter => self.save_session(),
                KeyCode::Esc => {
                    self.snapshot = None;
                    self.status = Some("session discarded".into());
                    self.state = AppState::Idle;
                }
                _ => {}
            },
            AppState::History => match code {
                KeyCode::Char('q') => return false,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('h') => {
                    self.state = AppState::Idle;
                }
                _ => {}
            },
        }
        true
    }

    fn start_session(&mut self, step_tx: &Sender<TrackEvent>) {
        self.status = None;
        self.save_error = None;
        self.snapshot = None;

        let tx = step_tx.clone();
        self.tracker.start_tracking(Box::new(move |update| {
            let _ = tx.send(TrackEvent::Step(update));
        }));

        if self.tracker.is_tracking() {
            self.state = AppState::Tracking;
        }
        // otherwise stay Idle; tracker.last_error() carries the reason
    }

    fn stop_session(&mut self) {
        let Some(snapshot) = self.tracker.stop_tracking() else {
            self.state = AppState::Idle;
            return;
        };

        if snapshot.duration.as_secs() >= MIN_RECORDABLE_SESSION_SECS {
            self.snapshot = Some(snapshot);
            self.distance_input.clear();
            self.state = AppState::Summary;
        } else {
            self.status = Some(format!(
                "session under {MIN_RECORDABLE_SESSION_SECS}s, not recorded"
            ));
            self.state = AppState::Idle;
        }
    }

    fn save_session(&mut self) {
        let Some(snapshot) = self.snapshot else {
            self.state = AppState::Idle;
            return;
        };
        let Ok(distance) = self.distance_input.parse::<f64>() else {
            self.status = Some("enter the distance from the belt display".into());
            return;
        };

        let distance_km = self.unit.to_km(distance);
        match self.recorder.save_snapshot(&snapshot, distance_km) {
            Ok(record) => {
                self.last_saved = Some(record);
                self.save_error = None;
                self.snapshot = None;
                self.status = Some("workout saved".into());
                self.state = AppState::Idle;
            }
            Err(e) => {
                self.save_error = Some(e);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if let Some(cadence) = cli.cadence {
        config.cadence_steps_per_min = cadence;
    }
    if let Some(unit) = cli.unit {
        config.distance_unit = unit;
    }
    if let Some(weight) = cli.weight {
        config.body_weight_kg = Some(weight);
    }
    let _ = config_store.save(&config);

    let store = SqliteHealthStore::new()?;
    if let Some(weight) = cli.weight {
        store.record_body_metric(BodyMetric::WeightKg, weight)?;
    }

    if let Some(path) = cli.export.as_ref() {
        let written = store.export_csv(path)?;
        println!("exported {written} workouts to {}", path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut recorder = WorkoutRecorder::new(store);
    let _ = recorder.request_authorization();
    recorder.fetch_user_metrics();
    if recorder.user_weight_kg.is_none() {
        recorder.user_weight_kg = config.body_weight_kg;
    }

    let tracker = SessionTracker::new(
        CadenceStepSource::new(config.cadence_steps_per_min as f64),
        FileStartTimeStore::new(),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(tracker, recorder, config.distance_unit);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let event_source = CrosstermEventSource::new();
    let step_tx = event_source.sender();
    let runner = Runner::new(
        event_source,
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            TrackEvent::Tick | TrackEvent::Resize => {}
            TrackEvent::Step(update) => {
                app.tracker.on_step_update(update);
                // a sensor failure force-stops the session
                if app.state == AppState::Tracking && !app.tracker.is_tracking() {
                    app.state = AppState::Idle;
                }
            }
            TrackEvent::Suspended => app.tracker.did_enter_background(),
            TrackEvent::Resumed => app.tracker.will_enter_foreground(),
            TrackEvent::Key(key) => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break;
                }
                if !app.on_key(key.code, &step_tx) {
                    break;
                }
            }
        }
    }
    Ok(())
}
