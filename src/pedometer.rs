use crate::error::SensorError;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// One asynchronous delivery from a step source: either the cumulative
/// step count since the subscription timestamp, or a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepUpdate {
    Steps(u64),
    Failed(SensorError),
}

/// Callback that marshals updates onto the host event loop.
pub type StepSink = Box<dyn Fn(StepUpdate) + Send + 'static>;

/// Source of cumulative step counts (pedometer, belt sensor, simulator)
pub trait StepSource {
    fn is_available(&self) -> bool;

    /// Begin delivering updates counted from `from`. Updates arrive on an
    /// arbitrary thread; the sink is responsible for marshalling.
    fn subscribe(&mut self, from: SystemTime, sink: StepSink);

    fn unsubscribe(&mut self);
}

/// Cumulative count a steady cadence produces over `elapsed`
pub fn cumulative_steps(cadence_spm: f64, elapsed: Duration) -> u64 {
    if cadence_spm <= 0.0 {
        return 0;
    }
    (cadence_spm / 60.0 * elapsed.as_secs_f64()) as u64
}

/// Production step source deriving counts from a configured belt cadence.
///
/// Reports totals since the subscription timestamp on a feeder thread,
/// with slight jitter; reported counts never decrease. A cadence of zero
/// models an absent sensor.
pub struct CadenceStepSource {
    cadence_spm: f64,
    report_every: Duration,
    stop: Option<Arc<AtomicBool>>,
}

impl CadenceStepSource {
    pub fn new(cadence_spm: f64) -> Self {
        Self {
            cadence_spm,
            report_every: Duration::from_millis(500),
            stop: None,
        }
    }

    pub fn with_report_interval(cadence_spm: f64, report_every: Duration) -> Self {
        Self {
            cadence_spm,
            report_every,
            stop: None,
        }
    }
}

impl Drop for CadenceStepSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl StepSource for CadenceStepSource {
    fn is_available(&self) -> bool {
        self.cadence_spm > 0.0
    }

    fn subscribe(&mut self, from: SystemTime, sink: StepSink) {
        self.unsubscribe();

        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Some(Arc::clone(&stop));

        let cadence = self.cadence_spm;
        let report_every = self.report_every;

        std::thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut last = 0u64;
            loop {
                std::thread::sleep(report_every);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let elapsed = from.elapsed().unwrap_or(Duration::ZERO);
                let jitter: f64 = rng.gen_range(0.97..=1.03);
                let total = (cumulative_steps(cadence, elapsed) as f64 * jitter) as u64;
                last = last.max(total);
                sink(StepUpdate::Steps(last));
            }
        });
    }

    fn unsubscribe(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

#[derive(Default)]
struct ScriptedShared {
    available: bool,
    sink: Option<StepSink>,
    subscribed_from: Option<SystemTime>,
    subscribes: u32,
    unsubscribes: u32,
}

/// Test step source driven deterministically through its [`ScriptedHandle`]
pub struct ScriptedStepSource {
    shared: Arc<Mutex<ScriptedShared>>,
}

impl ScriptedStepSource {
    pub fn available() -> (Self, ScriptedHandle) {
        Self::with_availability(true)
    }

    pub fn unavailable() -> (Self, ScriptedHandle) {
        Self::with_availability(false)
    }

    fn with_availability(available: bool) -> (Self, ScriptedHandle) {
        let shared = Arc::new(Mutex::new(ScriptedShared {
            available,
            ..ScriptedShared::default()
        }));
        let handle = ScriptedHandle {
            shared: Arc::clone(&shared),
        };
        (Self { shared }, handle)
    }
}

impl StepSource for ScriptedStepSource {
    fn is_available(&self) -> bool {
        self.shared.lock().unwrap().available
    }

    fn subscribe(&mut self, from: SystemTime, sink: StepSink) {
        let mut shared = self.shared.lock().unwrap();
        shared.sink = Some(sink);
        shared.subscribed_from = Some(from);
        shared.subscribes += 1;
    }

    fn unsubscribe(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.sink.take().is_some() {
            shared.unsubscribes += 1;
        }
    }
}

/// Driver for a [`ScriptedStepSource`]; emissions happen synchronously,
/// so tests never wait on wall-clock time.
pub struct ScriptedHandle {
    shared: Arc<Mutex<ScriptedShared>>,
}

impl ScriptedHandle {
    pub fn emit_steps(&self, steps: u64) {
        self.emit(StepUpdate::Steps(steps));
    }

    pub fn emit_error(&self, error: SensorError) {
        self.emit(StepUpdate::Failed(error));
    }

    fn emit(&self, update: StepUpdate) {
        let shared = self.shared.lock().unwrap();
        if let Some(sink) = &shared.sink {
            sink(update);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.lock().unwrap().sink.is_some()
    }

    pub fn subscribed_from(&self) -> Option<SystemTime> {
        self.shared.lock().unwrap().subscribed_from
    }

    pub fn subscribe_count(&self) -> u32 {
        self.shared.lock().unwrap().subscribes
    }

    pub fn unsubscribe_count(&self) -> u32 {
        self.shared.lock().unwrap().unsubscribes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_math_is_steps_per_minute() {
        assert_eq!(cumulative_steps(120.0, Duration::from_secs(60)), 120);
        assert_eq!(cumulative_steps(120.0, Duration::from_secs(30)), 60);
        assert_eq!(cumulative_steps(0.0, Duration::from_secs(600)), 0);
    }

    #[test]
    fn zero_cadence_models_absent_sensor() {
        let source = CadenceStepSource::new(0.0);
        assert!(!source.is_available());
        assert!(CadenceStepSource::new(100.0).is_available());
    }

    #[test]
    fn scripted_source_records_subscription() {
        let (mut source, handle) = ScriptedStepSource::available();
        assert!(!handle.is_subscribed());

        let from = SystemTime::now();
        source.subscribe(from, Box::new(|_| {}));

        assert!(handle.is_subscribed());
        assert_eq!(handle.subscribed_from(), Some(from));
        assert_eq!(handle.subscribe_count(), 1);

        source.unsubscribe();
        assert!(!handle.is_subscribed());
        assert_eq!(handle.unsubscribe_count(), 1);
    }

    #[test]
    fn emissions_reach_the_sink_synchronously() {
        let (mut source, handle) = ScriptedStepSource::available();
        let seen: Arc<Mutex<Vec<StepUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);

        source.subscribe(
            SystemTime::now(),
            Box::new(move |u| sink_seen.lock().unwrap().push(u)),
        );

        handle.emit_steps(10);
        handle.emit_steps(42);
        handle.emit_error(SensorError::Failed("belt stopped".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], StepUpdate::Steps(10));
        assert_eq!(seen[1], StepUpdate::Steps(42));
        assert_eq!(
            seen[2],
            StepUpdate::Failed(SensorError::Failed("belt stopped".into()))
        );
    }

    #[test]
    fn emissions_after_unsubscribe_are_dropped() {
        let (mut source, handle) = ScriptedStepSource::available();
        let seen: Arc<Mutex<Vec<StepUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);

        source.subscribe(
            SystemTime::now(),
            Box::new(move |u| sink_seen.lock().unwrap().push(u)),
        );
        source.unsubscribe();
        handle.emit_steps(99);

        assert!(seen.lock().unwrap().is_empty());
    }
}
