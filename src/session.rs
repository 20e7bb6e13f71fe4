//! The state one board connection mutates: recorded series, the framer's
//! carry-over, interval bookkeeping, device settings and the connection
//! state. It lives behind a single `Arc<Mutex<_>>` shared by the foreground
//! and the receive thread, and every change is announced as a
//! [`SessionEvent`] to whoever presents it.

use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::device::DeviceParams;
use crate::interval_monitor::IntervalMonitor;
use crate::line_framer::LineFramer;
use crate::reading::{SensorId, SensorReading};
use crate::record_parser::parse_line;
use crate::store::SensorStore;
use crate::table::SensorTable;

/// Whether incoming readings are being kept while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Socket is drained but readings are discarded.
    Stopped,
    /// Readings are appended to the store.
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Acquisition),
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    pub fn is_recording(self) -> bool {
        self == ConnectionState::Connected(Acquisition::Recording)
    }
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Status(String),
    ConnectionStateChanged(ConnectionState),
    SensorActivated(SensorId),
    /// Every sensor slot is inactive again.
    SensorsCleared,
    /// `None` when the measurement was reset.
    IntervalComputed(Option<i64>),
    /// `None` clears a previous warning.
    IntervalDrift(Option<String>),
    MalformedLine(String),
    Reading(SensorReading),
}

/// Sending half of the event channel. Events are logged whether or not
/// anybody is listening.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SessionEvent>>,
}

impl EventSink {
    /// A sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that only logs.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: SessionEvent) {
        match &event {
            SessionEvent::Status(text) => info!("{text}"),
            SessionEvent::MalformedLine(line) => warn!("Invalid data: {line}"),
            SessionEvent::IntervalDrift(Some(warning)) => warn!("{warning}"),
            SessionEvent::Reading(reading) => debug!("Recorded {reading:?}"),
            other => debug!("{other:?}"),
        }
        if let Some(tx) = &self.tx {
            // A closed receiver just means nobody is presenting any more.
            let _ = tx.send(event);
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Lock the session, carrying on with whatever is inside if a previous
/// holder panicked.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    store: SensorStore,
    framer: LineFramer,
    monitor: IntervalMonitor,
    params: DeviceParams,
    events: EventSink,
}

impl Session {
    pub fn new(params: DeviceParams, monitor: IntervalMonitor, events: EventSink) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            store: SensorStore::new(),
            framer: LineFramer::new(),
            monitor,
            params,
            events,
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `state`, announcing it only if it is actually a change.
    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.events.emit(SessionEvent::ConnectionStateChanged(state));
        }
    }

    /// Switch between recording and stopped. Does nothing unless connected,
    /// so a link the receive thread already gave up on stays down. Returns
    /// whether the switch happened.
    pub fn set_acquisition(&mut self, acquisition: Acquisition) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        self.set_state(ConnectionState::Connected(acquisition));
        true
    }

    pub fn params(&self) -> &DeviceParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut DeviceParams {
        &mut self.params
    }

    pub fn store(&self) -> &SensorStore {
        &self.store
    }

    pub fn drift_warning(&self) -> Option<&str> {
        self.monitor.drift_warning()
    }

    pub fn status(&self, text: impl Into<String>) {
        self.events.emit(SessionEvent::Status(text.into()));
    }

    /// Run a received chunk through framing and parsing. Readings are only
    /// kept while recording; malformed lines are reported either way.
    /// Returns the number of readings appended.
    pub fn ingest(&mut self, chunk: &[u8]) -> usize {
        if !self.state.is_connected() {
            return 0;
        }
        let mut appended = 0;
        for line in self.framer.push(chunk) {
            match parse_line(&line) {
                Ok(Some(reading)) if self.state.is_recording() => {
                    self.record(reading);
                    appended += 1;
                }
                Ok(_) => {}
                Err(_) => self.events.emit(SessionEvent::MalformedLine(line)),
            }
        }
        appended
    }

    fn record(&mut self, reading: SensorReading) {
        if self.store.append(&reading) {
            self.events
                .emit(SessionEvent::SensorActivated(reading.sensor_id));
        }
        self.events.emit(SessionEvent::Reading(reading));

        if let Some(report) = self.monitor.observe(&self.store, &mut self.params) {
            self.events
                .emit(SessionEvent::IntervalComputed(Some(report.actual_ms)));
            self.events.emit(SessionEvent::IntervalDrift(report.drift));
        }
    }

    /// Drop all recorded data and the interval measurement. The connection
    /// is left alone.
    pub fn clear(&mut self) {
        self.store.clear();
        self.framer.reset();
        self.reset_interval();
        self.events.emit(SessionEvent::SensorsCleared);
    }

    /// Forget the measured interval and any drift warning.
    pub fn reset_interval(&mut self) {
        self.monitor.reset(&mut self.params);
        self.events.emit(SessionEvent::IntervalComputed(None));
        self.events.emit(SessionEvent::IntervalDrift(None));
    }

    pub fn snapshot_table(&self, sensors: Option<&[SensorId]>) -> SensorTable {
        self.store.snapshot_table(sensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DataRate;

    fn session() -> (Session, mpsc::Receiver<SessionEvent>) {
        let (events, rx) = EventSink::channel();
        let params = DeviceParams::new(DataRate::Hz10, Default::default());
        (Session::new(params, IntervalMonitor::default(), events), rx)
    }

    fn drain(rx: &mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn nothing_is_kept_while_disconnected_or_stopped() {
        let (mut session, _rx) = session();
        assert_eq!(session.ingest(b"0,0,0,0,0\n"), 0);

        session.set_state(ConnectionState::Connected(Acquisition::Stopped));
        assert_eq!(session.ingest(b"0,0,0,0,0\n0,100,0,0,0\n"), 0);
        assert!(session.store().is_empty());
    }

    #[test]
    fn recording_appends_and_announces() {
        let (mut session, rx) = session();
        session.set_state(ConnectionState::Connected(Acquisition::Recording));
        drain(&rx);

        assert_eq!(session.ingest(b"2,1000,0.1,0.2,9.8\n2,11"), 1);
        assert_eq!(session.ingest(b"00,0.1,0.2,9.8\nbad line\n"), 1);

        let events = drain(&rx);
        assert!(events.contains(&SessionEvent::SensorActivated(2)));
        assert!(events.contains(&SessionEvent::IntervalComputed(Some(100))));
        assert!(events.contains(&SessionEvent::IntervalDrift(None)));
        assert!(events.contains(&SessionEvent::MalformedLine("bad line".to_owned())));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::Reading(_)))
                .count(),
            2
        );
        assert_eq!(session.params().actual_interval_ms, Some(100));
    }

    #[test]
    fn clear_resets_data_carry_and_interval() {
        let (mut session, rx) = session();
        session.set_state(ConnectionState::Connected(Acquisition::Recording));
        session.ingest(b"0,0,0,0,0\n0,50,0,0,0\n0,1");
        assert!(session.drift_warning().is_some());
        drain(&rx);

        session.clear();
        assert!(session.snapshot_table(None).is_empty());
        assert!(session.store().active_sensors().is_empty());
        assert_eq!(session.params().actual_interval_ms, None);
        assert!(session.drift_warning().is_none());
        assert!(drain(&rx).contains(&SessionEvent::SensorsCleared));

        // The dangling "0,1" must not be glued onto the next line.
        session.ingest(b"3,5,1,1,1\n");
        assert_eq!(session.store().active_sensors().into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn huge_timestamp_gap_is_recorded_not_fatal() {
        let (mut session, rx) = session();
        session.set_state(ConnectionState::Connected(Acquisition::Recording));
        drain(&rx);

        assert_eq!(session.ingest(b"0,1e300,0,0,9.8\n0,0,0,0,9.8\n1,0,0,0,9.8\n"), 3);
        assert_eq!(session.params().actual_interval_ms, Some(i64::MIN));
        assert!(session.drift_warning().is_some());
        assert!(drain(&rx).contains(&SessionEvent::SensorActivated(1)));
    }

    #[test]
    fn acquisition_needs_a_connection() {
        let (mut session, rx) = session();
        assert!(!session.set_acquisition(Acquisition::Recording));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(drain(&rx).is_empty());

        session.set_state(ConnectionState::Connected(Acquisition::Stopped));
        assert!(session.set_acquisition(Acquisition::Recording));
        assert!(session.state().is_recording());
    }

    #[test]
    fn state_changes_are_announced_once() {
        let (mut session, rx) = session();
        session.set_state(ConnectionState::Connecting);
        session.set_state(ConnectionState::Connecting);
        assert_eq!(
            drain(&rx),
            vec![SessionEvent::ConnectionStateChanged(ConnectionState::Connecting)]
        );
    }
}
