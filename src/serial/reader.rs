/// Background acquisition of scale readings
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{BackoffPolicy, EngineConfig};
use crate::error::ScaleError;
use crate::models::{ConnectionStatus, Reading};
use crate::serial::connection::{Connector, SerialConnector, Transport};
use crate::serial::parser::{parse_reading, ParseRejection};
use crate::utils::sleep_while_running;

/// How long `stop` waits for the reader thread to exit
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Position of the reader loop in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Connecting,
    Reading,
}

/// State shared between the reader thread and query callers
struct Shared {
    config: EngineConfig,
    backoff: BackoffPolicy,
    connector: Arc<dyn Connector>,
    reading: Mutex<Option<Reading>>,
    status: Mutex<ConnectionStatus>,
    state: Mutex<EngineState>,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the scale connection and the most recent reading
///
/// `start` runs the read loop on a dedicated thread. The query methods only
/// copy values out from behind a lock and never touch the serial port.
pub struct ScaleReader {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

/// Lock a mutex, recovering the value if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScaleReader {
    /// Create a reader for the real serial port
    pub fn new(config: EngineConfig, backoff: BackoffPolicy) -> Self {
        Self::with_connector(config, backoff, Arc::new(SerialConnector))
    }

    pub fn with_connector(
        config: EngineConfig,
        backoff: BackoffPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let status = ConnectionStatus::new(&config.port);
        ScaleReader {
            shared: Arc::new(Shared {
                config,
                backoff,
                connector,
                reading: Mutex::new(None),
                status: Mutex::new(status),
                state: Mutex::new(EngineState::Stopped),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the read loop. Calling it while already running does nothing.
    pub fn start(&self) -> Result<(), ScaleError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            debug!("ScaleReader already running");
            return Ok(());
        }

        let running = Arc::new(AtomicBool::new(true));
        lock(&self.shared.status).running = true;

        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&running);
        let spawned = thread::Builder::new()
            .name("scale-reader".to_string())
            .spawn(move || read_loop(shared, flag));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                lock(&self.shared.status).running = false;
                return Err(ScaleError::Spawn(e));
            }
        };

        *worker = Some(Worker { running, handle });
        info!("ScaleReader started on {}", self.shared.config.port);
        Ok(())
    }

    /// Signal the read loop to exit and wait a bounded time for it
    ///
    /// The loop closes the port when it exits. If it is still inside a read
    /// when the wait expires, the port closes as soon as that read times out.
    /// Calling it on a stopped reader does nothing. A concurrent `start`
    /// waits until the stop has finished.
    pub fn stop(&self) {
        let mut guard = lock(&self.worker);
        let Some(worker) = guard.take() else {
            return;
        };

        worker.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
        while !worker.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if worker.handle.is_finished() {
            if worker.handle.join().is_err() {
                error!("Reader thread panicked");
            }
        } else {
            warn!(
                "Reader thread still busy after {:?}, detaching it",
                STOP_JOIN_TIMEOUT
            );
        }

        {
            let mut status = lock(&self.shared.status);
            status.running = false;
            status.connected = false;
        }
        *lock(&self.shared.state) = EngineState::Stopped;
        info!("ScaleReader stopped");
    }

    /// Snapshot of the newest reading, or `None` before the first valid sample
    pub fn latest_reading(&self) -> Option<Reading> {
        lock(&self.shared.reading).clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared.status).clone()
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.shared.state)
    }
}

impl Drop for ScaleReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Next state of the loop and the backoff to wait before entering it
type Transition = (EngineState, Option<Duration>);

/// Run the connection state machine until `running` is cleared
fn read_loop(shared: Arc<Shared>, running: Arc<AtomicBool>) {
    let mut transport: Option<Box<dyn Transport>> = None;
    let mut state = EngineState::Connecting;
    *lock(&shared.state) = state;

    while running.load(Ordering::SeqCst) {
        let (next, backoff) = match state {
            EngineState::Connecting => shared.connect(&mut transport),
            EngineState::Reading => shared.read_next(&mut transport),
            EngineState::Stopped => break,
        };
        state = next;
        *lock(&shared.state) = state;

        if let Some(delay) = backoff {
            sleep_while_running(&running, delay);
        }
    }

    // Dropping the transport closes the port
    drop(transport);
    debug!("Read loop exited");
}

impl Shared {
    fn connect(&self, transport: &mut Option<Box<dyn Transport>>) -> Transition {
        match self.connector.connect(&self.config) {
            Ok(opened) => {
                *transport = Some(opened);
                {
                    let mut status = lock(&self.status);
                    status.connected = true;
                    status.last_error = None;
                }
                info!("Connected to scale on {}", self.config.port);
                (EngineState::Reading, None)
            }
            Err(e) => {
                self.record_error(&e);
                (EngineState::Connecting, Some(self.backoff.reconnect_delay))
            }
        }
    }

    fn read_next(&self, transport: &mut Option<Box<dyn Transport>>) -> Transition {
        let result = match transport.as_mut() {
            Some(t) if t.is_open() => t.read_line(),
            Some(_) => Err(ScaleError::Closed),
            None => return (EngineState::Connecting, None),
        };

        match result {
            Ok(Some(line)) => {
                self.handle_line(&line);
                (EngineState::Reading, None)
            }
            // Timeout with nothing to parse
            Ok(None) => (EngineState::Reading, None),
            Err(e) => {
                *transport = None;
                lock(&self.status).connected = false;
                self.record_error(&e);
                (EngineState::Connecting, Some(self.backoff.read_error_delay))
            }
        }
    }

    fn handle_line(&self, line: &[u8]) {
        match parse_reading(line) {
            Ok(reading) => {
                info!("New weight: {:.2} {}", reading.weight, reading.unit);
                *lock(&self.reading) = Some(reading);
            }
            Err(ParseRejection::Empty) => debug!("Skipping empty line"),
            Err(rejection) => warn!(
                "Failed to parse line '{}': {}",
                String::from_utf8_lossy(line).escape_default(),
                rejection
            ),
        }
    }

    fn record_error(&self, err: &ScaleError) {
        let message = err.to_string();
        error!("{}", message);
        lock(&self.status).last_error = Some(message);
    }
}
