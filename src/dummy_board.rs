//! A stand-in for the accelerometer board: a TCP server on its own thread
//! that speaks the same line protocol, so the client can be exercised
//! without hardware.

use crate::device::{Command, DataRate, Range};
use crate::reading::{SensorId, SENSOR_SLOTS};
use log::{debug, info, warn};
use rand::prelude::*;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const STANDARD_GRAVITY: f64 = 9.80665;
const POLL: Duration = Duration::from_millis(5);

pub struct DummyBoard {
    addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
}

enum Signal {
    DropClient,
    Stop,
}

/// What the host has told the board so far on the current connection.
#[derive(Debug, Default)]
struct BoardState {
    recording: bool,
    data_rate: DataRate,
    range: Range,
    hung_up: bool,
}

#[derive(Debug, Clone)]
pub struct DummyBoardBuilder {
    bind: String,
    sensors: SensorId,
    noise: f64,
}

impl Default for DummyBoardBuilder {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:0".to_owned(),
            sensors: 1,
            noise: 0.05,
        }
    }
}

impl DummyBoardBuilder {
    /// Address to listen on. Port 0 picks a free port.
    pub fn bind(self, bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            ..self
        }
    }

    /// Number of simulated accelerometers, ids `0..sensors`.
    pub fn sensors(self, sensors: SensorId) -> Self {
        Self {
            sensors: sensors.clamp(1, SENSOR_SLOTS),
            ..self
        }
    }

    /// Amplitude of the uniform noise added to every axis, in m/s².
    pub fn noise(self, noise: f64) -> Self {
        Self {
            noise: noise.abs(),
            ..self
        }
    }

    /// Bind the listener and start serving.
    pub fn build(self) -> io::Result<DummyBoard> {
        let listener = TcpListener::bind(&self.bind)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let boot = Instant::now();
            let mut running = true;
            while running {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        info!("Dummy board accepted {peer}");
                        running = serve(stream, &rx, &self, boot);
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        if let Ok(Signal::Stop) | Err(mpsc::TryRecvError::Disconnected) =
                            rx.try_recv()
                        {
                            running = false;
                        }
                        thread::sleep(POLL);
                    }
                    Err(e) => {
                        warn!("Dummy board accept failed: {e}");
                        thread::sleep(POLL);
                    }
                }
            }
            info!("Dummy board on {addr} stopped");
        });

        Ok(DummyBoard {
            addr,
            handle: Some(handle),
            tx,
        })
    }
}

impl DummyBoard {
    pub fn builder() -> DummyBoardBuilder {
        DummyBoardBuilder::default()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Hang up on the connected client, as a board reset would.
    pub fn drop_client(&self) {
        let _ = self.tx.send(Signal::DropClient);
    }

    pub fn stop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            if thread.join().is_err() {
                warn!("Dummy board thread panicked");
            }
        }
    }
}

impl Drop for DummyBoard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve one client until it hangs up or we are told to. Returns whether
/// the board should keep accepting clients.
fn serve(
    stream: TcpStream,
    rx: &mpsc::Receiver<Signal>,
    settings: &DummyBoardBuilder,
    boot: Instant,
) -> bool {
    let state = Arc::new(Mutex::new(BoardState::default()));
    let commands = match stream
        .set_nonblocking(false)
        .and_then(|_| stream.try_clone())
    {
        Ok(reader) => {
            let state = Arc::clone(&state);
            thread::spawn(move || read_commands(reader, state))
        }
        Err(e) => {
            warn!("Dummy board could not set up client: {e}");
            return true;
        }
    };

    let mut writer = &stream;
    let mut rng = thread_rng();
    let mut next_row: Option<Instant> = None;
    let keep_running = loop {
        match rx.try_recv() {
            Ok(Signal::Stop) | Err(mpsc::TryRecvError::Disconnected) => break false,
            Ok(Signal::DropClient) => break true,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let (recording, data_rate, range) = {
            let state = state.lock().unwrap_or_else(|p| p.into_inner());
            if state.hung_up {
                break true;
            }
            (state.recording, state.data_rate, state.range)
        };
        if !recording {
            next_row = None;
            thread::sleep(POLL);
            continue;
        }

        let now = Instant::now();
        let due = *next_row.get_or_insert(now);
        if now < due {
            spin_sleep::sleep((due - now).min(POLL));
            continue;
        }
        next_row = Some(due + Duration::from_millis(u64::from(data_rate.interval_ms())));

        let row = make_row(&mut rng, settings, range, boot.elapsed());
        if let Err(e) = writer.write_all(row.as_bytes()) {
            debug!("Dummy board client went away: {e}");
            break true;
        }
    };

    let _ = stream.shutdown(Shutdown::Both);
    if commands.join().is_err() {
        warn!("Dummy board command reader panicked");
    }
    keep_running
}

fn read_commands(reader: TcpStream, state: Arc<Mutex<BoardState>>) {
    for line in BufReader::new(reader).lines() {
        let Ok(line) = line else { break };
        let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
        match line.parse::<Command>() {
            Ok(Command::Start) => state.recording = true,
            Ok(Command::Stop) => state.recording = false,
            Ok(Command::Exit) => break,
            Ok(Command::SetDataRate(rate)) => state.data_rate = rate,
            Ok(Command::SetRange(range)) => state.range = range,
            Err(e) => warn!("Dummy board ignoring {line:?}: {e}"),
        }
        debug!("Dummy board now {state:?}");
    }
    state.lock().unwrap_or_else(|p| p.into_inner()).hung_up = true;
}

/// One line per sensor, all stamped with the same board time.
fn make_row(
    rng: &mut impl Rng,
    settings: &DummyBoardBuilder,
    range: Range,
    since_boot: Duration,
) -> String {
    let limit = f64::from(range.g()) * STANDARD_GRAVITY;
    let mut jitter = |base: f64| {
        let noise = if settings.noise > 0.0 {
            rng.gen_range(-settings.noise..settings.noise)
        } else {
            0.0
        };
        (base + noise).clamp(-limit, limit)
    };
    (0..settings.sensors)
        .map(|id| {
            format!(
                "{id},{},{:.4},{:.4},{:.4}\n",
                since_boot.as_millis(),
                jitter(0.0),
                jitter(0.0),
                jitter(STANDARD_GRAVITY)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_parser::parse_line;

    #[test]
    fn rows_parse_and_stay_in_range() {
        let settings = DummyBoard::builder().sensors(4).noise(100.0);
        let row = make_row(&mut thread_rng(), &settings, Range::G2, Duration::from_millis(1234));
        let readings: Vec<_> = row
            .lines()
            .map(|l| parse_line(l).unwrap().unwrap())
            .collect();
        assert_eq!(readings.len(), 4);
        for (i, r) in readings.iter().enumerate() {
            assert_eq!(r.sensor_id as usize, i);
            assert_eq!(r.timestamp_ms, 1234.0);
            assert!(r.z.abs() <= 2.0 * STANDARD_GRAVITY + 1e-3);
        }
    }

    #[test]
    fn streams_after_start_and_stops_on_exit() {
        let mut board = DummyBoard::builder().sensors(2).build().unwrap();
        let mut stream = TcpStream::connect(board.local_addr()).unwrap();
        stream.write_all(b"100\nSTART\n").unwrap();

        let mut lines = BufReader::new(stream.try_clone().unwrap()).lines();
        let first = parse_line(&lines.next().unwrap().unwrap()).unwrap().unwrap();
        let second = parse_line(&lines.next().unwrap().unwrap()).unwrap().unwrap();
        assert_eq!((first.sensor_id, second.sensor_id), (0, 1));

        stream.write_all(b"EXIT\n").unwrap();
        // Whatever was in flight drains, then the board hangs up.
        assert!(lines.all(|l| l.is_ok()));
        board.stop();
    }
}
