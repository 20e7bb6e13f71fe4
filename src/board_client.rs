//! Owns the TCP connection to the board: connecting with a bounded timeout,
//! the background thread that drains the socket into the [`Session`], the
//! commands sent back to the board, and orderly teardown.
//!
//! There is no automatic reconnection. When the link drops, the receive
//! thread reports why, marks the session disconnected and exits; getting
//! back online is always a fresh [`BoardClient::connect`].

use std::{
    io::{ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};

use crate::config::BoardConfig;
use crate::device::{Command, DeviceParams, ParameterUpdate};
use crate::error::BoardError;
use crate::interval_monitor::IntervalMonitor;
use crate::reading::SensorId;
use crate::session::{
    lock, Acquisition, ConnectionState, EventSink, Session, SessionEvent, SharedSession,
};
use crate::store::SensorStore;
use crate::table::{SensorTable, TableRow};

const NOT_CONNECTED: &str = "Connect to the board to record data or change the sensor parameters.";

enum Signal {
    Stop,
}

/// A live connection: the write half of the socket and the thread reading
/// the other half.
struct Link {
    peer: SocketAddr,
    stream: TcpStream,
    tx: Sender<Signal>,
    handle: Option<JoinHandle<()>>,
}

/// Client side of the board protocol.
pub struct BoardClient {
    config: BoardConfig,
    session: SharedSession,
    events: EventSink,
    link: Option<Link>,
}

impl BoardClient {
    pub fn new(config: BoardConfig, events: EventSink) -> Self {
        let session = Session::new(
            config.default_params(),
            IntervalMonitor::new(config.drift_tolerance_ms),
            events.clone(),
        )
        .shared();
        Self {
            config,
            session,
            events,
            link: None,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.session).state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn params(&self) -> DeviceParams {
        lock(&self.session).params().clone()
    }

    pub fn drift_warning(&self) -> Option<String> {
        lock(&self.session).drift_warning().map(str::to_owned)
    }

    /// Run `f` against the store while holding the session lock.
    pub fn with_store<T>(&self, f: impl FnOnce(&SensorStore) -> T) -> T {
        f(lock(&self.session).store())
    }

    /// Combined table of the given sensors, or of every active sensor.
    pub fn snapshot_table(&self, sensors: Option<&[SensorId]>) -> SensorTable {
        lock(&self.session).snapshot_table(sensors)
    }

    /// The last `n` rows of one sensor.
    pub fn recent_rows(&self, sensor_id: SensorId, n: usize) -> Vec<TableRow> {
        self.with_store(|store| store.recent_rows(sensor_id, n))
    }

    fn status(&self, text: impl Into<String>) {
        self.events.emit(SessionEvent::Status(text.into()));
    }

    /// Open the connection and start the receive thread. The session starts
    /// out stopped; nothing is recorded until [`BoardClient::start_recording`].
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), BoardError> {
        if self.is_connected() {
            self.status("Already connected.");
            return Err(BoardError::AlreadyConnected);
        }
        // A receive thread that already gave up still needs joining.
        self.disconnect()?;

        lock(&self.session).set_state(ConnectionState::Connecting);
        let (peer, stream) = match self.open(host, port) {
            Ok(opened) => opened,
            Err(error) => {
                let mut session = lock(&self.session);
                session.status(format!("Connection failed: {error}"));
                session.set_state(ConnectionState::Disconnected);
                return Err(error);
            }
        };

        let (tx, rx) = mpsc::channel();
        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(error) => {
                lock(&self.session).set_state(ConnectionState::Disconnected);
                return Err(error.into());
            }
        };

        // Publish the state before the thread can observe a dead socket and
        // overwrite it.
        {
            let mut session = lock(&self.session);
            session.set_state(ConnectionState::Connected(Acquisition::Stopped));
            session.status(format!("Connected to {peer}."));
        }

        let session = self.session.clone();
        let buffer_size = self.config.read_buffer_size.max(1);
        let handle = thread::spawn(move || receive_loop(reader, rx, session, buffer_size));

        self.link = Some(Link {
            peer,
            stream,
            tx,
            handle: Some(handle),
        });
        Ok(())
    }

    fn open(&self, host: &str, port: u16) -> Result<(SocketAddr, TcpStream), BoardError> {
        let resolve_error = || BoardError::Resolve {
            host: host.to_owned(),
            port,
        };
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| resolve_error())?
            .collect();

        let mut last_error = resolve_error();
        for addr in addrs {
            info!("Connecting to {addr}");
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(self.config.read_timeout())?;
                    if let Err(error) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle on {addr}: {error}");
                    }
                    return Ok((addr, stream));
                }
                Err(source) => last_error = BoardError::Connect { addr, source },
            }
        }
        Err(last_error)
    }

    /// Stop the receive thread and close the socket. Calling this when not
    /// connected does nothing.
    pub fn disconnect(&mut self) -> Result<(), BoardError> {
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };

        // The thread checks for the signal as soon as its blocking read
        // returns, which the shutdown forces.
        let _ = link.tx.send(Signal::Stop);
        if let Err(error) = link.stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of {} reported: {error}", link.peer);
        }
        let joined = link.handle.take().map(JoinHandle::join);

        {
            let mut session = lock(&self.session);
            if session.state() != ConnectionState::Disconnected {
                session.set_state(ConnectionState::Disconnected);
                session.status("Disconnected.");
            }
        }

        match joined {
            Some(Err(_)) => Err(BoardError::ThreadPanicked),
            _ => Ok(()),
        }
    }

    fn not_connected(&self) -> BoardError {
        self.status(NOT_CONNECTED);
        BoardError::NotConnected
    }

    fn ensure_connected(&self) -> Result<&Link, BoardError> {
        match &self.link {
            Some(link) if self.is_connected() => Ok(link),
            _ => Err(self.not_connected()),
        }
    }

    /// Write one command to the board. A failed write is reported but leaves
    /// the connection state alone.
    pub fn send_command(&self, command: Command) -> Result<(), BoardError> {
        let link = self.ensure_connected()?;
        let mut writer = &link.stream;
        match writer.write_all(format!("{command}\n").as_bytes()) {
            Ok(()) => {
                debug!("Sent {command} to {}", link.peer);
                Ok(())
            }
            Err(source) => {
                warn!("Sending {command} to {} failed: {source}", link.peer);
                self.status(format!("Failed to send {command}: {source}"));
                Err(BoardError::Send { command, source })
            }
        }
    }

    /// Clear the recorded data and ask the board to start streaming.
    pub fn start_recording(&self) -> Result<(), BoardError> {
        self.ensure_connected()?;
        let started = {
            let mut session = lock(&self.session);
            // The receive thread may have dropped the link since the check.
            session.state().is_connected() && {
                session.clear();
                session.set_acquisition(Acquisition::Recording)
            }
        };
        if !started {
            return Err(self.not_connected());
        }
        self.send_command(Command::Start)?;
        self.status(format!("Sent command: {}", Command::Start));
        Ok(())
    }

    /// Ask the board to stop streaming and stop keeping readings.
    pub fn stop_recording(&self) -> Result<(), BoardError> {
        self.ensure_connected()?;
        let sent = self.send_command(Command::Stop);
        let stopped = lock(&self.session).set_acquisition(Acquisition::Stopped);
        sent?;
        if !stopped {
            return Err(self.not_connected());
        }
        self.status(format!("Sent command: {}", Command::Stop));
        Ok(())
    }

    /// Change a board setting. Recording is stopped first if it was running,
    /// and the interval measurement is reset because it no longer applies.
    /// Asking for the value already in effect does nothing.
    pub fn update_parameter(&self, update: ParameterUpdate) -> Result<(), BoardError> {
        self.ensure_connected()?;
        let unchanged = {
            let session = lock(&self.session);
            let params = session.params();
            match update {
                ParameterUpdate::DataRate(rate) => params.data_rate == rate,
                ParameterUpdate::Range(range) => params.range == range,
            }
        };
        if unchanged {
            debug!("Sensor {} already {update:?}", update.name());
            return Ok(());
        }

        if self.state().is_recording() {
            self.stop_recording()?;
            self.status(format!(
                "Recording was stopped to initialize the new {}.",
                update.name()
            ));
        }
        lock(&self.session).reset_interval();

        self.send_command(update.command())?;
        let value = {
            let mut session = lock(&self.session);
            let params = session.params_mut();
            match update {
                ParameterUpdate::DataRate(rate) => {
                    params.data_rate = rate;
                    rate.to_string()
                }
                ParameterUpdate::Range(range) => {
                    params.range = range;
                    range.to_string()
                }
            }
        };
        self.status(format!("New sensor {} was set to: {value}", update.name()));
        Ok(())
    }

    /// Drop all recorded data without touching the connection.
    pub fn clear(&self) {
        lock(&self.session).clear();
        self.status("Data erased successfully.");
    }

    /// Put the board back to its boot settings, tell it we are leaving and
    /// disconnect.
    pub fn close(&mut self) -> Result<(), BoardError> {
        if self.is_connected() {
            let defaults = [
                ParameterUpdate::DataRate(self.config.data_rate),
                ParameterUpdate::Range(self.config.range),
            ];
            for update in defaults {
                if let Err(error) = self.update_parameter(update) {
                    warn!("Could not restore default sensor {}: {error}", update.name());
                }
            }
            if let Err(error) = self.send_command(Command::Exit) {
                warn!("Could not send {}: {error}", Command::Exit);
            }
        }
        self.disconnect()
    }
}

impl Drop for BoardClient {
    fn drop(&mut self) {
        if let Err(error) = self.disconnect() {
            warn!("Error while dropping board client: {error}");
        }
    }
}

/// Body of the receive thread. Reads until told to stop or until the socket
/// fails, in which case the failure is reported and the session marked
/// disconnected before returning.
fn receive_loop(
    mut stream: TcpStream,
    rx: Receiver<Signal>,
    session: SharedSession,
    buffer_size: usize,
) {
    let mut buffer = vec![0; buffer_size];
    loop {
        let read = stream.read(&mut buffer);

        match rx.try_recv() {
            Ok(Signal::Stop) | Err(TryRecvError::Disconnected) => {
                debug!("Receive thread asked to stop");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        let reason = match read {
            Ok(0) => "Connection closed by the board.".to_owned(),
            Ok(n) => {
                lock(&session).ingest(&buffer[..n]);
                continue;
            }
            Err(error) => match error.kind() {
                ErrorKind::Interrupted => continue,
                ErrorKind::ConnectionReset
                | ErrorKind::BrokenPipe
                | ErrorKind::ConnectionAborted => "Connection lost.".to_owned(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                    "Connection timed out. Check the hardware.".to_owned()
                }
                _ => format!("Connection error: {error}"),
            },
        };

        warn!("{reason}");
        let mut session = lock(&session);
        session.status(reason);
        session.set_state(ConnectionState::Disconnected);
        break;
    }

    if let Err(error) = stream.shutdown(Shutdown::Both) {
        debug!("Receive thread shutdown reported: {error}");
    }
    info!("Receive thread terminated");
}
