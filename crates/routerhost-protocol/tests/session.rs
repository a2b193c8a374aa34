//! Session engine integration tests over a scripted transport.
//!
//! These drive the public `Session` API with the background loop
//! actually running, so they poll with timeouts instead of stepping the
//! loop by hand. Intervals are shrunk to keep the tests fast.

use routerhost_core::{HostConfig, MemoryConsole, ProtocolVersion};
use routerhost_protocol::{
    Command, ConnectionParams, ConnectionState, MockTransport, Session, SessionConfig, Translator,
};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> SessionConfig {
    let mut config = SessionConfig::from_host(&HostConfig::default());
    config.connection = ConnectionParams::default();
    config.backoff_interval_ms = 2;
    config.poll_interval_ms = 1;
    config.handshake_interval_ms = 2;
    config.log_pings = false;
    config.log_sends = false;
    config
}

fn rig() -> (Session, MockTransport, Arc<MemoryConsole>) {
    let mock = MockTransport::new();
    let console = MemoryConsole::new();
    let session = Session::new(test_config(), Box::new(mock.clone()), console.clone());
    session.start().unwrap();
    (session, mock, console)
}

/// Poll until the condition holds or the deadline passes.
async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached within deadline");
}

async fn connect(session: &Session, mock: &MockTransport) {
    session.connect().unwrap();
    // Answer the handshake with a single byte.
    wait_for(|| mock.currently_open()).await;
    mock.push_incoming(&[0x55]);
    wait_for(|| session.connection_state() == ConnectionState::Connected).await;
    // Drop the handshake bytes the host wrote while waiting.
    mock.take_written();
}

fn program(text: &str) -> Vec<Command> {
    let out = Translator::new(&HostConfig::default()).translate(text, None);
    assert_eq!(out.error_count(), 0);
    out.commands
}

#[tokio::test]
async fn test_connect_handshake_and_disconnect() {
    let (session, mock, console) = rig();
    connect(&session, &mock).await;
    assert!(console.contains("Connected."));

    session.disconnect().unwrap();
    wait_for(|| session.connection_state() == ConnectionState::Disconnected).await;
    assert!(!mock.currently_open());
    assert!(console.contains("Disconnected."));
}

#[tokio::test]
async fn test_failed_open_reports_and_stays_disconnected() {
    let (session, mock, console) = rig();
    mock.fail_open(true);
    session.connect().unwrap();
    wait_for(|| console.contains("Couldn't open serial port.")).await;
    wait_for(|| session.connection_state() == ConnectionState::Disconnected).await;

    // A later connect attempt succeeds once the port behaves.
    mock.fail_open(false);
    connect(&session, &mock).await;
}

#[tokio::test]
async fn test_job_streams_one_frame_per_ack() {
    let (session, mock, console) = rig();
    connect(&session, &mock).await;

    let frames = program("M3\nG28\nM5");
    session.load(frames.clone()).unwrap();
    session.run().unwrap();

    for (i, frame) in frames.iter().enumerate() {
        wait_for(|| mock.written().len() >= frame.len()).await;
        // Strict stop-and-wait: exactly one unacked frame on the wire.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.take_written(), frame.as_bytes());
        mock.push_incoming(&[b'a', i as u8]);
    }

    wait_for(|| !session.is_running()).await;
    assert!(console.contains("Job complete."));
    assert_eq!(session.job_progress(), (frames.len(), frames.len()));
}

#[tokio::test]
async fn test_requests_refused_while_running() {
    let (session, mock, _console) = rig();
    connect(&session, &mock).await;

    let frames = program("G28\nM5");
    session.load(frames.clone()).unwrap();
    session.run().unwrap();
    wait_for(|| !mock.written().is_empty()).await;

    // No acks yet, so the job is still running: everything that would
    // disturb it is refused.
    assert!(session.disconnect().is_err());
    assert!(session.load(frames.clone()).is_err());
    assert!(session.send_manual(frames[0]).is_err());
    assert!(session.is_running());

    session.stop();
    wait_for(|| !session.is_running()).await;
    session.disconnect().unwrap();
}

#[tokio::test]
async fn test_manual_commands_dispatch_while_idle() {
    let (session, mock, _console) = rig();
    connect(&session, &mock).await;

    let frames = program("M114\nM119");
    session.send_manual_batch(frames.clone()).unwrap();

    wait_for(|| mock.written().len() >= frames[0].len()).await;
    assert_eq!(mock.take_written(), frames[0].as_bytes());

    mock.push_incoming(&[b'a', 0]);
    wait_for(|| mock.written().len() >= frames[1].len()).await;
    assert_eq!(mock.take_written(), frames[1].as_bytes());
}

#[tokio::test]
async fn test_response_is_decoded_and_displayed() {
    let (session, mock, console) = rig();
    connect(&session, &mock).await;

    let frames = program("M114");
    session.send_manual_batch(frames).unwrap();
    wait_for(|| !mock.written().is_empty()).await;

    mock.push_incoming(&[b'a', 0]);
    // Position response: 10.00, 1.00, 0.02 mm.
    mock.push_incoming(&[b'r', 0, 6, 0x03, 0xE8, 0x00, 0x64, 0x00, 0x02]);
    wait_for(|| console.contains("X: 10.00   Y: 1.00   Z: 0.02")).await;
}

#[tokio::test]
async fn test_cable_pull_preserves_loaded_program() {
    let (session, mock, console) = rig();
    connect(&session, &mock).await;

    let frames = program("G28\nM5\nM3");
    session.load(frames).unwrap();
    session.run().unwrap();
    wait_for(|| !mock.written().is_empty()).await;

    mock.fail_io(true);
    wait_for(|| session.connection_state() == ConnectionState::Disconnected).await;
    assert!(!session.is_running());
    assert!(console.contains("Serial link lost: I/O error: scripted read failure"));

    // The program survives for a reconnect and a fresh run.
    mock.fail_io(false);
    let (_, total) = session.job_progress();
    assert_eq!(total, 3);
    connect(&session, &mock).await;
    session.run().unwrap();
    wait_for(|| !mock.written().is_empty()).await;

    session.shutdown();
}
