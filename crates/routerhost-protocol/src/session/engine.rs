//! Connection lifecycle and dispatch engine
//!
//! One background task owns the transport and every protocol-state
//! transition, which rules out protocol-level races by construction.
//! Foreground callers hold a [`Session`] handle and only request
//! transitions: connect, disconnect, load a job, run it, or enqueue
//! manual commands. Every request either mutates shared state and
//! returns immediately or is rejected synchronously.
//!
//! Dispatch is stop-and-wait: at most one frame is in flight without a
//! matching ack. The first frame of a new job, and the head of an
//! otherwise idle manual queue, are sent unprompted to knock over the
//! first domino; every later send is triggered by the ack of its
//! predecessor.

use crate::protocol::{wire, Command};
use crate::session::history::SentHistory;
use crate::session::receiver::{ReceiveEvent, Receiver};
use crate::session::response;
use crate::transport::{ConnectionParams, Transport};
use parking_lot::{Mutex, RwLock};
use routerhost_core::{ConsoleSink, Error, HostConfig, ProtocolVersion, Result, SessionError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Status of the connection to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link; the loop sleeps a coarse backoff between checks.
    #[default]
    Disconnected,
    /// A connect was requested; the loop is opening the port and
    /// handshaking.
    Pending,
    /// Handshake answered; the main protocol loop is live.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Pending => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Session engine configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial link parameters.
    pub connection: ConnectionParams,
    /// Wire protocol version.
    pub version: ProtocolVersion,
    /// Lower end of the spindle speed range in rpm, for response decoding.
    pub spindle_speed_min: u32,
    /// Upper end of the spindle speed range in rpm, for response decoding.
    pub spindle_speed_max: u32,
    /// Sleep between transport checks while disconnected, in milliseconds.
    pub backoff_interval_ms: u64,
    /// Sleep between read attempts while connected, in milliseconds.
    pub poll_interval_ms: u64,
    /// Handshake byte cadence while waiting for the device, in
    /// milliseconds.
    pub handshake_interval_ms: u64,
    /// Echo acknowledgments on the console.
    pub log_acks: bool,
    /// Echo handshake pings on the console.
    pub log_pings: bool,
    /// Echo every sent frame on the console.
    pub log_sends: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_host(&HostConfig::default())
    }
}

impl SessionConfig {
    /// Derive the session configuration from the host configuration.
    pub fn from_host(config: &HostConfig) -> Self {
        Self {
            connection: ConnectionParams {
                port: config.port.clone(),
                baud_rate: config.baud_rate,
            },
            version: config.protocol,
            spindle_speed_min: config.spindle_speed_min,
            spindle_speed_max: config.spindle_speed_max,
            backoff_interval_ms: config.backoff_interval_ms,
            poll_interval_ms: config.poll_interval_ms,
            handshake_interval_ms: config.handshake_interval_ms,
            log_acks: config.log_acks,
            log_pings: config.log_pings,
            log_sends: config.log_sends,
        }
    }
}

/// The loaded job: an ordered frame sequence plus the dispatch cursor.
#[derive(Debug, Default)]
struct JobQueue {
    commands: Vec<Command>,
    cursor: usize,
}

/// State shared between the foreground handle and the background loop.
struct Shared {
    connection: RwLock<ConnectionState>,
    disconnect_requested: AtomicBool,
    shutdown: AtomicBool,
    running: AtomicBool,
    job: Mutex<JobQueue>,
    manual: Mutex<VecDeque<Command>>,
    history: Mutex<SentHistory>,
}

impl Shared {
    fn new() -> Self {
        Self {
            connection: RwLock::new(ConnectionState::Disconnected),
            disconnect_requested: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(false),
            job: Mutex::new(JobQueue::default()),
            manual: Mutex::new(VecDeque::new()),
            history: Mutex::new(SentHistory::new()),
        }
    }
}

/// Handle to the session engine.
///
/// All session state lives behind this handle; there are no module-level
/// globals. Requests never block on the background loop.
pub struct Session {
    shared: Arc<Shared>,
    console: Arc<dyn ConsoleSink>,
    config: SessionConfig,
    transport_slot: Mutex<Option<Box<dyn Transport>>>,
    io_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session over the given transport. The transport stays
    /// closed until a connect request arrives; the background loop is
    /// not spawned until [`start`](Session::start).
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        console: Arc<dyn ConsoleSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            console,
            config,
            transport_slot: Mutex::new(Some(transport)),
            io_task: Mutex::new(None),
        }
    }

    /// Spawn the background protocol loop. May be called once.
    pub fn start(&self) -> Result<()> {
        let transport = self
            .transport_slot
            .lock()
            .take()
            .ok_or(SessionError::AlreadyStarted)?;

        let io = IoLoop {
            shared: self.shared.clone(),
            transport,
            receiver: Receiver::new(),
            in_flight: false,
            console: self.console.clone(),
            config: self.config.clone(),
        };
        *self.io_task.lock() = Some(tokio::spawn(io.run()));
        Ok(())
    }

    /// Stop the background loop. Pending queues are dropped with it.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.io_task.lock().take() {
            handle.abort();
        }
    }

    /// Request a connection. The background loop opens the port and
    /// performs the handshake; watch [`connection_state`] for the
    /// outcome.
    ///
    /// [`connection_state`]: Session::connection_state
    pub fn connect(&self) -> Result<()> {
        let mut connection = self.shared.connection.write();
        match *connection {
            ConnectionState::Disconnected => {
                *connection = ConnectionState::Pending;
                Ok(())
            }
            _ => {
                self.console.append_line("Already connected.");
                Err(SessionError::AlreadyConnected.into())
            }
        }
    }

    /// Request a disconnect. Refused while a job is running: there is no
    /// forced abort from the host side, only the device can halt a move.
    pub fn disconnect(&self) -> Result<()> {
        match *self.shared.connection.read() {
            ConnectionState::Connected => {
                if self.shared.running.load(Ordering::SeqCst) {
                    self.console.append_line("Can't disconnect while running.");
                    return Err(SessionError::BusyRunning {
                        request: "disconnect".to_string(),
                    }
                    .into());
                }
                self.shared.disconnect_requested.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => {
                self.console.append_line("Already disconnected.");
                Err(SessionError::NotConnected.into())
            }
        }
    }

    /// Replace the loaded job wholesale. Refused while running.
    pub fn load(&self, commands: Vec<Command>) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(SessionError::BusyRunning {
                request: "load".to_string(),
            }
            .into());
        }
        *self.shared.job.lock() = JobQueue {
            commands,
            cursor: 0,
        };
        Ok(())
    }

    /// Run the loaded job from the beginning.
    pub fn run(&self) -> Result<()> {
        if *self.shared.connection.read() != ConnectionState::Connected {
            self.console.append_line("Must connect to the router first.");
            return Err(SessionError::NotConnected.into());
        }
        let mut job = self.shared.job.lock();
        if job.commands.is_empty() {
            self.console.append_line("No commands loaded.");
            return Err(SessionError::NothingLoaded.into());
        }
        // Holding the job lock serializes the cursor reset against the
        // background loop's dispatch.
        if !self.shared.running.load(Ordering::SeqCst) {
            job.cursor = 0;
            self.shared.running.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Stop dispatching further job frames. The frame already in flight
    /// is not recalled; the device finishes it.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.console.append_line("Job stopped.");
        }
    }

    /// Enqueue a single ad-hoc command. Manual commands are dispatched
    /// only while no job is running.
    pub fn send_manual(&self, command: Command) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            self.console
                .append_line("Can't run manual commands while job is running");
            return Err(SessionError::BusyRunning {
                request: "manual command".to_string(),
            }
            .into());
        }
        if *self.shared.connection.read() != ConnectionState::Connected {
            self.console.append_line("Must connect to the router first!");
            return Err(SessionError::NotConnected.into());
        }
        self.shared.manual.lock().push_back(command);
        Ok(())
    }

    /// Enqueue a batch of ad-hoc commands, e.g. a single translated
    /// console line.
    pub fn send_manual_batch(&self, commands: Vec<Command>) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            self.console
                .append_line("Can't run manual commands while job is running");
            return Err(SessionError::BusyRunning {
                request: "manual commands".to_string(),
            }
            .into());
        }
        if *self.shared.connection.read() != ConnectionState::Connected {
            self.console.append_line("Must connect to the router first!");
            return Err(SessionError::NotConnected.into());
        }
        self.shared.manual.lock().extend(commands);
        Ok(())
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.connection.read()
    }

    /// True while a job is actively being dispatched.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Dispatch progress of the loaded job: (frames dispatched, total).
    pub fn job_progress(&self) -> (usize, usize) {
        let job = self.shared.job.lock();
        (job.cursor, job.commands.len())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.io_task.lock().take() {
            handle.abort();
        }
    }
}

/// The background protocol loop. Exclusive owner of the transport, the
/// receive state machine, and the in-flight flag.
struct IoLoop {
    shared: Arc<Shared>,
    transport: Box<dyn Transport>,
    receiver: Receiver,
    in_flight: bool,
    console: Arc<dyn ConsoleSink>,
    config: SessionConfig,
}

impl IoLoop {
    async fn run(mut self) {
        loop {
            if self.shared.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let state = *self.shared.connection.read();
            match state {
                ConnectionState::Disconnected => {
                    tokio::time::sleep(Duration::from_millis(self.config.backoff_interval_ms))
                        .await;
                }
                ConnectionState::Pending => self.establish().await,
                ConnectionState::Connected => {
                    self.poll();
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }
        self.transport.close();
    }

    /// Open the port and handshake: write a single byte at a fixed
    /// cadence until the device answers with anything at all.
    async fn establish(&mut self) {
        if let Err(e) = self.transport.open(&self.config.connection) {
            tracing::warn!("connect failed: {}", e);
            self.console.append_line("Couldn't open serial port.");
            *self.shared.connection.write() = ConnectionState::Disconnected;
            return;
        }

        // Give the firmware a moment to come out of reset before the
        // first ping.
        tokio::time::sleep(Duration::from_millis(self.config.handshake_interval_ms)).await;

        loop {
            if self.shared.shutdown.load(Ordering::SeqCst) {
                self.transport.close();
                return;
            }
            match self.transport.read_byte() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if self.config.log_pings {
                        self.console.append_line("ping");
                    }
                    if let Err(e) = self.transport.write(&[wire::HANDSHAKE]) {
                        self.transport_failure(&e);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.handshake_interval_ms))
                        .await;
                }
                Err(e) => {
                    self.transport_failure(&e);
                    return;
                }
            }
        }

        *self.shared.connection.write() = ConnectionState::Connected;
        tracing::info!(port = %self.config.connection.port, "connected");
        self.console.append_line("Connected.");
    }

    /// One connected-mode iteration: honor a disconnect request, prime
    /// dispatch if nothing is in flight, then process at most one
    /// inbound byte.
    fn poll(&mut self) {
        if self.shared.disconnect_requested.swap(false, Ordering::SeqCst) {
            self.transport.close();
            self.receiver.reset();
            self.in_flight = false;
            self.shared.history.lock().clear();
            *self.shared.connection.write() = ConnectionState::Disconnected;
            self.console.append_line("Disconnected.");
            return;
        }

        // A device-initiated halt suspends all dispatch, job and manual
        // alike, until the clear byte arrives.
        if !self.receiver.is_aborted() && !self.in_flight {
            self.prime_dispatch();
        }

        match self.transport.read_byte() {
            Ok(Some(byte)) => self.handle_byte(byte),
            Ok(None) => {}
            Err(e) => self.transport_failure(&e),
        }
    }

    /// Send the frame that starts a pipeline: the first frame of a newly
    /// started job, or the head of the manual queue while idle. Every
    /// other send happens in response to an ack.
    fn prime_dispatch(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            let first = {
                let mut job = self.shared.job.lock();
                if job.cursor == 0 {
                    job.cursor = 1;
                    job.commands.first().copied()
                } else {
                    None
                }
            };
            if let Some(command) = first {
                tracing::debug!("priming job dispatch");
                self.send_command(command);
            }
        } else {
            let head = self.shared.manual.lock().pop_front();
            if let Some(command) = head {
                self.send_command(command);
            }
        }
    }

    fn handle_byte(&mut self, byte: u8) {
        let Some(event) = self.receiver.on_byte(byte) else {
            return;
        };
        match event {
            ReceiveEvent::Ack { id } => {
                if self.config.log_acks {
                    self.console.append_line(&format!("ACK {}", id));
                }
                self.in_flight = false;
                self.dispatch_next();
            }
            ReceiveEvent::RetransmitRequest => self.retransmit(),
            ReceiveEvent::Response { id, data } => self.handle_response(id, &data),
            ReceiveEvent::AbortRaised => {
                tracing::warn!("device raised a motion halt");
                self.console.append_line(
                    "Endstop or maximum coordinate hit during move! Press resume button",
                );
            }
            ReceiveEvent::AbortCleared => {
                tracing::info!("motion halt cleared");
                self.console.append_line("Halt cleared; resuming.");
            }
            ReceiveEvent::ProtocolError(message) => {
                tracing::warn!("protocol error: {}", message);
                self.console.append_line(&message);
            }
            ReceiveEvent::UnexpectedByte(b) => {
                tracing::debug!(byte = b, "unexpected byte in idle state");
                self.console.append_line("Unexpected byte received!");
            }
        }
    }

    /// The ack is the cue to send the next command: the next job frame
    /// while running (clearing `running` once the cursor is exhausted),
    /// otherwise the head of the manual queue.
    fn dispatch_next(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            let next = {
                let mut job = self.shared.job.lock();
                if job.cursor < job.commands.len() {
                    let command = job.commands[job.cursor];
                    job.cursor += 1;
                    Some(command)
                } else {
                    None
                }
            };
            match next {
                Some(command) => self.send_command(command),
                None => {
                    self.shared.running.store(false, Ordering::SeqCst);
                    tracing::info!("job complete");
                    self.console.append_line("Job complete.");
                }
            }
        } else {
            let head = self.shared.manual.lock().pop_front();
            if let Some(command) = head {
                self.send_command(command);
            }
        }
    }

    fn send_command(&mut self, command: Command) {
        if self.config.log_sends {
            self.console
                .append_line(&format!("Sending command: {}", command.dump()));
        }
        match self.transport.write(command.as_bytes()) {
            Ok(_) => {
                self.in_flight = true;
                self.shared.history.lock().push(command);
            }
            Err(e) => self.transport_failure(&e),
        }
    }

    /// Resend the most recently transmitted frame, byte for byte. The
    /// frame is not re-recorded in history.
    fn retransmit(&mut self) {
        let latest = self.shared.history.lock().latest().copied();
        match latest {
            Some(command) => {
                self.console.append_line("Retransmitting command");
                tracing::debug!(frame = %command.dump(), "retransmitting");
                if let Err(e) = self.transport.write(command.as_bytes()) {
                    self.transport_failure(&e);
                }
            }
            None => {
                self.console
                    .append_line("Retransmit requested but nothing was sent yet");
            }
        }
    }

    fn handle_response(&mut self, id: u8, data: &[u8]) {
        let opcode = {
            let history = self.shared.history.lock();
            history.find_by_id(id).and_then(|c| c.opcode())
        };
        let decoded = response::decode(
            opcode,
            data,
            self.config.spindle_speed_min,
            self.config.spindle_speed_max,
        );
        tracing::debug!(id, ?decoded, "response");
        self.console.append_line(&decoded.to_string());
    }

    /// Any transport failure drops the connection. The job queue and
    /// cursor are left untouched so a reconnect does not lose the loaded
    /// program; the frame that was in flight must be assumed lost.
    fn transport_failure(&mut self, error: &Error) {
        tracing::error!("serial link failure: {}", error);
        self.console
            .append_line(&format!("Serial link lost: {}", error));
        self.transport.close();
        self.receiver.reset();
        self.in_flight = false;
        self.shared.running.store(false, Ordering::SeqCst);
        *self.shared.connection.write() = ConnectionState::Disconnected;
    }
}
