use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::pedometer::StepUpdate;

/// Unified event type consumed by the app runner.
///
/// Step-source deliveries and focus transitions travel through the same
/// channel as key events, so every state mutation happens on the one loop
/// the UI reads from.
#[derive(Clone, Debug)]
pub enum TrackEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    Step(StepUpdate),
    /// Terminal lost focus: the host is going to the background
    Suspended,
    /// Terminal regained focus
    Resumed,
}

/// Source of loop events (keyboard, resize, marshalled sensor updates)
pub trait TrackEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<TrackEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<TrackEvent>,
    rx: Receiver<TrackEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        let reader_tx = tx.clone();
        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if reader_tx.send(TrackEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if reader_tx.send(TrackEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::FocusLost) => {
                    if reader_tx.send(TrackEvent::Suspended).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::FocusGained) => {
                    if reader_tx.send(TrackEvent::Resumed).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { tx, rx }
    }

    /// Cloneable sender for feeding out-of-band events (step updates)
    /// into the same loop
    pub fn sender(&self) -> Sender<TrackEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrackEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<TrackEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TrackEvent>) -> Self {
        Self { rx }
    }
}

impl TrackEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrackEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: TrackEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: TrackEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> TrackEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                TrackEvent::Tick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        let ev = runner.step();
        match ev {
            TrackEvent::Tick => {}
            _ => panic!("expected Tick on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(TrackEvent::Step(StepUpdate::Steps(12))).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        match runner.step() {
            TrackEvent::Step(StepUpdate::Steps(12)) => {}
            _ => panic!("expected the queued step update"),
        }
    }
}
