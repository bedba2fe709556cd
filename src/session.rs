use crate::error::SensorError;
use crate::pedometer::{StepSink, StepSource, StepUpdate};
use crate::resume::StartTimeStore;
use std::time::{Duration, SystemTime};

/// Sessions shorter than this are discarded without a distance prompt
pub const MIN_RECORDABLE_SESSION_SECS: u64 = 60;

/// Final numbers of a finished session, captured atomically with the stop.
///
/// The tracker clears its live state on stop, so this value is the only
/// way the finished session's data reaches the save path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub steps: u64,
    pub duration: Duration,
    pub started_at: SystemTime,
}

/// Tracks one walking session at a time: Idle until started, Active until
/// stopped or until the step source fails.
///
/// All mutation happens on the host event loop; step updates arrive
/// through the sink passed to [`start_tracking`](Self::start_tracking) and
/// are applied via [`on_step_update`](Self::on_step_update). The start
/// time additionally lives in a persisted slot so a suspended host process
/// can restore it on resume.
#[derive(Debug)]
pub struct SessionTracker<S: StepSource, R: StartTimeStore> {
    source: S,
    resume: R,
    steps: u64,
    started_at: Option<SystemTime>,
    last_error: Option<SensorError>,
}

impl<S: StepSource, R: StartTimeStore> SessionTracker<S, R> {
    pub fn new(source: S, resume: R) -> Self {
        Self {
            source,
            resume,
            steps: 0,
            started_at: None,
            last_error: None,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn last_error(&self) -> Option<&SensorError> {
        self.last_error.as_ref()
    }

    pub fn is_tracking(&self) -> bool {
        self.started_at.is_some()
    }

    /// Zero while Idle; wall-clock time since start while Active
    pub fn session_duration(&self) -> Duration {
        match self.started_at {
            Some(started_at) => started_at.elapsed().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// Begin a session. A no-op while one is already running; an
    /// unavailable source leaves the tracker Idle with
    /// [`SensorError::Unavailable`] recorded.
    pub fn start_tracking(&mut self, sink: StepSink) {
        if self.is_tracking() {
            return;
        }
        if !self.source.is_available() {
            self.last_error = Some(SensorError::Unavailable);
            return;
        }

        let now = SystemTime::now();
        self.started_at = Some(now);
        self.steps = 0;
        self.last_error = None;
        let _ = self.resume.save(now);
        self.source.subscribe(now, sink);
    }

    /// End the session and hand back its final numbers. `None` while Idle.
    pub fn stop_tracking(&mut self) -> Option<SessionSnapshot> {
        let started_at = self.started_at?;
        let snapshot = SessionSnapshot {
            steps: self.steps,
            duration: started_at.elapsed().unwrap_or(Duration::ZERO),
            started_at,
        };

        self.source.unsubscribe();
        self.started_at = None;
        self.steps = 0;
        let _ = self.resume.clear();

        Some(snapshot)
    }

    /// Apply one marshalled step-source delivery. Data overwrites the
    /// count (the source reports totals, not deltas); a failure terminates
    /// the session in this same call. Deliveries while Idle are dropped.
    pub fn on_step_update(&mut self, update: StepUpdate) {
        if !self.is_tracking() {
            return;
        }
        match update {
            StepUpdate::Steps(total) => self.steps = total,
            StepUpdate::Failed(error) => {
                self.source.unsubscribe();
                self.started_at = None;
                let _ = self.resume.clear();
                self.last_error = Some(error);
            }
        }
    }

    /// Host is being suspended; re-persist the start time while Active
    pub fn did_enter_background(&mut self) {
        if let Some(started_at) = self.started_at {
            let _ = self.resume.save(started_at);
        }
    }

    /// Host resumed; while Active, trust the persisted start time over the
    /// in-memory one (suspension can distort process timing)
    pub fn will_enter_foreground(&mut self) {
        if self.is_tracking() {
            if let Some(started_at) = self.resume.load() {
                self.started_at = Some(started_at);
            }
        }
    }
}
