//! Live connection to a simulation server
//!
//! A supervisor thread owns the connection lifecycle. For each connection it
//! spawns a reader thread that pulls length-prefixed frames off the socket
//! into a bounded queue, and consumes the queue itself: optional pacing to
//! one message per monitor step, dispatch into the shared world, and mirror
//! recording. When the server goes away the supervisor waits the configured
//! delay and reconnects, unless auto-connect is off.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use sparkview_shared::{ControlCommand, FrameError, read_frame, write_frame};

use crate::config::Config;
use crate::dispatch::{MessageDispatcher, World};
use crate::logfile::DrawCommandSink;
use crate::recorder::LogRecorder;

/// Errors from talking to the server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("not connected to a server")]
    NotConnected,

    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { host: String, port: u16 },
    /// The server closed the connection or it was shut down locally
    Disconnected,
    ConnectFailed(String),
    RecordingStarted(PathBuf),
}

/// Connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub auto_connect: bool,
    pub auto_connect_delay: Duration,
    /// Apply at most one message per `monitor_step`
    pub use_buffer: bool,
    pub monitor_step: Duration,
    pub queue_capacity: usize,
    /// Mirror every session to a new log in this directory
    pub record_directory: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3200,
            auto_connect: true,
            auto_connect_delay: Duration::from_millis(1000),
            use_buffer: false,
            monitor_step: Duration::from_millis(40),
            queue_capacity: 3000,
            record_directory: None,
        }
    }
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        let network = &config.network;
        Self {
            host: network.host.clone(),
            port: network.port,
            auto_connect: network.auto_connect,
            auto_connect_delay: network.auto_connect_delay(),
            use_buffer: network.use_buffer,
            monitor_step: Duration::from_secs_f32(network.monitor_step.max(0.0)),
            queue_capacity: network.queue_capacity,
            record_directory: config
                .logs
                .record_logs
                .then(|| config.logs.logfile_directory.clone()),
        }
    }
}

struct Shared {
    settings: ConnectionSettings,
    stopped: Mutex<bool>,
    wake: Condvar,
    stream: Mutex<Option<TcpStream>>,
    recorder: Arc<Mutex<Option<LogRecorder>>>,
    subscribers: Mutex<Vec<Sender<ConnectionEvent>>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|e| {
        warn!("{} mutex poisoned; continuing", what);
        e.into_inner()
    })
}

impl Shared {
    fn is_stopped(&self) -> bool {
        *lock(&self.stopped, "connection stop")
    }

    fn emit(&self, event: ConnectionEvent) {
        lock(&self.subscribers, "subscriber")
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Sleep for `delay` unless stopped first. Returns whether stopped.
    fn wait_stopped(&self, delay: Duration) -> bool {
        let guard = lock(&self.stopped, "connection stop");
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, delay, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Buffers draw commands into whichever recording is active.
struct RecorderSink {
    recorder: Arc<Mutex<Option<LogRecorder>>>,
}

impl DrawCommandSink for RecorderSink {
    fn execute(&mut self, bytes: &[u8]) {
        if let Some(recorder) = lock(&self.recorder, "recorder").as_mut() {
            recorder.buffer_draw_command(bytes);
        }
    }
}

/// Client for the monitor port of a simulation server.
pub struct ServerConnection {
    dispatcher: MessageDispatcher,
    shared: Arc<Shared>,
    supervisor: Option<JoinHandle<()>>,
}

impl ServerConnection {
    pub fn new(world: Arc<Mutex<World>>, settings: ConnectionSettings) -> Self {
        Self {
            dispatcher: MessageDispatcher::new(world),
            shared: Arc::new(Shared {
                settings,
                stopped: Mutex::new(false),
                wake: Condvar::new(),
                stream: Mutex::new(None),
                recorder: Arc::new(Mutex::new(None)),
                subscribers: Mutex::new(Vec::new()),
            }),
            supervisor: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.shared.settings
    }

    pub fn world(&self) -> &Arc<Mutex<World>> {
        self.dispatcher.world()
    }

    /// Receive [`ConnectionEvent`]s on `sender` until it is dropped.
    pub fn subscribe(&self, sender: Sender<ConnectionEvent>) {
        lock(&self.shared.subscribers, "subscriber").push(sender);
    }

    /// Start connecting in the background. Any running session is closed first.
    pub fn connect(&mut self) {
        self.disconnect();
        *lock(&self.shared.stopped, "connection stop") = false;

        let shared = self.shared.clone();
        let dispatcher = self.dispatcher.clone();
        let handle = thread::Builder::new()
            .name("server-connection".into())
            .spawn(move || supervise(&shared, &dispatcher))
            .expect("failed to spawn server connection thread");
        self.supervisor = Some(handle);
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&mut self) {
        let Some(handle) = self.supervisor.take() else {
            return;
        };
        {
            let mut stopped = lock(&self.shared.stopped, "connection stop");
            *stopped = true;
            self.shared.wake.notify_all();
        }
        if let Some(stream) = lock(&self.shared.stream, "stream").as_ref() {
            // unblocks the reader thread
            let _ = stream.shutdown(Shutdown::Both);
        }
        let _ = handle.join();
        debug!("server connection stopped");
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.stream, "stream").is_some()
    }

    /// Send a control command to the server.
    pub fn send(&self, command: &ControlCommand) -> Result<(), ConnectionError> {
        self.send_raw(&command.to_string())
    }

    /// Send a raw message to the server.
    pub fn send_raw(&self, message: &str) -> Result<(), ConnectionError> {
        let guard = lock(&self.shared.stream, "stream");
        let Some(stream) = guard.as_ref() else {
            debug!("cannot send {:?}: not connected", message);
            return Err(ConnectionError::NotConnected);
        };
        let mut writer = stream;
        write_frame(&mut writer, message)?;
        trace!("sent {}", message);
        Ok(())
    }

    /// Path of the current mirror recording.
    pub fn recording_path(&self) -> Option<PathBuf> {
        lock(&self.shared.recorder, "recorder")
            .as_ref()
            .map(|r| r.path().to_path_buf())
    }

    /// Sink that buffers draw commands into the current recording.
    pub fn draw_command_sink(&self) -> Arc<Mutex<dyn DrawCommandSink>> {
        Arc::new(Mutex::new(RecorderSink {
            recorder: self.shared.recorder.clone(),
        }))
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ============================================================================
// Threads
// ============================================================================

fn supervise(shared: &Shared, dispatcher: &MessageDispatcher) {
    let settings = &shared.settings;
    loop {
        if shared.is_stopped() {
            break;
        }

        match TcpStream::connect((settings.host.as_str(), settings.port)) {
            Ok(stream) => {
                if let Err(e) = run_session(shared, dispatcher, stream) {
                    error!("connection failed: {}", e);
                }
                shared.emit(ConnectionEvent::Disconnected);
            }
            Err(e) => {
                debug!(
                    "unable to connect to {}:{}: {}",
                    settings.host, settings.port, e
                );
                shared.emit(ConnectionEvent::ConnectFailed(e.to_string()));
            }
        }

        if !settings.auto_connect || shared.wait_stopped(settings.auto_connect_delay) {
            break;
        }
    }
    debug!("server connection thread exiting");
}

fn run_session(
    shared: &Shared,
    dispatcher: &MessageDispatcher,
    stream: TcpStream,
) -> Result<(), ConnectionError> {
    let settings = &shared.settings;
    let read_half = stream.try_clone()?;
    *lock(&shared.stream, "stream") = Some(stream);
    if shared.is_stopped() {
        close_stream(shared);
        return Ok(());
    }

    info!("connected to {}:{}", settings.host, settings.port);
    dispatcher.lock().reset();
    start_recording(shared);
    shared.emit(ConnectionEvent::Connected {
        host: settings.host.clone(),
        port: settings.port,
    });

    let (tx, rx) = mpsc::sync_channel(settings.queue_capacity.max(1));
    let reader = thread::Builder::new()
        .name("server-reader".into())
        .spawn(move || read_messages(read_half, tx))
        .expect("failed to spawn server reader thread");

    consume_messages(shared, dispatcher, rx);

    close_stream(shared);
    let _ = reader.join();
    stop_recording(shared);
    info!("disconnected from {}:{}", settings.host, settings.port);
    Ok(())
}

/// Socket to queue. `None` marks the end of the stream.
fn read_messages(mut stream: TcpStream, queue: SyncSender<Option<String>>) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(message)) => {
                if queue.send(Some(message)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                debug!("server ended the stream");
                break;
            }
            Err(e) => {
                debug!("server stream closed: {}", e);
                break;
            }
        }
    }
    let _ = queue.send(None);
}

/// Queue to world, paced when buffering is enabled.
fn consume_messages(shared: &Shared, dispatcher: &MessageDispatcher, queue: Receiver<Option<String>>) {
    let settings = &shared.settings;
    let mut last_update: Option<Instant> = None;

    while let Ok(Some(message)) = queue.recv() {
        if shared.is_stopped() {
            break;
        }

        if settings.use_buffer {
            if let Some(last) = last_update {
                let elapsed = last.elapsed();
                if elapsed < settings.monitor_step {
                    thread::sleep(settings.monitor_step - elapsed);
                }
            }
            last_update = Some(Instant::now());
        }

        if let Err(e) = dispatcher.dispatch(&message) {
            warn!("unable to parse server message: {}", e);
            continue;
        }
        record(shared, &message);
    }
}

fn close_stream(shared: &Shared) {
    if let Some(stream) = lock(&shared.stream, "stream").take() {
        let _ = stream.shutdown(Shutdown::Both);
    }
}

fn start_recording(shared: &Shared) {
    let Some(dir) = &shared.settings.record_directory else {
        return;
    };
    match LogRecorder::create(dir) {
        Ok(recorder) => {
            let path = recorder.path().to_path_buf();
            *lock(&shared.recorder, "recorder") = Some(recorder);
            shared.emit(ConnectionEvent::RecordingStarted(path));
        }
        Err(e) => error!("unable to create log file in {}: {}", dir.display(), e),
    }
}

fn record(shared: &Shared, message: &str) {
    let mut recorder = lock(&shared.recorder, "recorder");
    if let Some(active) = recorder.as_mut()
        && let Err(e) = active.write_message(message)
    {
        error!("recording to {} failed: {}", active.path().display(), e);
        *recorder = None;
    }
}

fn stop_recording(shared: &Shared) {
    if let Some(mut recorder) = lock(&shared.recorder, "recorder").take()
        && let Err(e) = recorder.close()
    {
        error!("unable to close {}: {}", recorder.path().display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneSkeleton;
    use std::io::Write;
    use std::net::TcpListener;

    const FULL: &str = "((time 0)(team_left Alpha)(score_left 3))(RSG 0 1)((nd TRF)(nd))";
    const DIFF: &str = "((time 0.04))(RDS 0 1)((nd)(nd))";

    fn settings(port: u16) -> ConnectionSettings {
        ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            auto_connect: false,
            auto_connect_delay: Duration::from_millis(50),
            ..ConnectionSettings::default()
        }
    }

    fn connection(settings: ConnectionSettings) -> (ServerConnection, Receiver<ConnectionEvent>) {
        let world = Arc::new(Mutex::new(World::new(Box::new(SceneSkeleton::new()))));
        let connection = ServerConnection::new(world, settings);
        let (tx, rx) = mpsc::channel();
        connection.subscribe(tx);
        (connection, rx)
    }

    fn wait_for(rx: &Receiver<ConnectionEvent>, pred: impl Fn(&ConnectionEvent) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(event) if pred(&event) => return,
                Ok(_) => {}
                Err(e) => panic!("expected connection event: {}", e),
            }
        }
    }

    fn end_of_stream(stream: &mut TcpStream) {
        stream.write_all(&0i32.to_be_bytes()).unwrap();
    }

    #[test]
    fn test_messages_are_applied_and_commands_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            write_frame(&mut stream, FULL).unwrap();
            write_frame(&mut stream, DIFF).unwrap();
            let command = read_frame(&mut stream).unwrap();
            end_of_stream(&mut stream);
            command
        });

        let (mut connection, rx) = connection(settings(port));
        connection.connect();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::Connected { .. }));
        connection.send(&ControlCommand::Init).unwrap();
        wait_for(&rx, |e| *e == ConnectionEvent::Disconnected);

        assert_eq!(server.join().unwrap().as_deref(), Some("(init)"));
        let world = connection.world().lock().unwrap();
        assert_eq!(world.game_state.time(), 0.04);
        assert_eq!(world.game_state.score_left(), 3);
        assert_eq!(world.game_state.team_left(), Some("Alpha"));
        drop(world);
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_session_is_mirrored_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            write_frame(&mut stream, FULL).unwrap();
            write_frame(&mut stream, "not a message").unwrap();
            write_frame(&mut stream, DIFF).unwrap();
            end_of_stream(&mut stream);
        });

        let (mut connection, rx) = connection(ConnectionSettings {
            record_directory: Some(dir.path().to_path_buf()),
            ..settings(port)
        });
        connection.connect();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::RecordingStarted(_)));
        wait_for(&rx, |e| *e == ConnectionEvent::Disconnected);
        server.join().unwrap();

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(logs.len(), 1);
        let text = std::fs::read_to_string(&logs[0]).unwrap();
        assert_eq!(text, format!("{}\n{}\n", FULL, DIFF));
        assert_eq!(connection.recording_path(), None);
    }

    #[test]
    fn test_reconnects_and_resets_world() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut first, _) = listener.accept().unwrap();
            write_frame(&mut first, FULL).unwrap();
            end_of_stream(&mut first);
            drop(first);

            let (mut second, _) = listener.accept().unwrap();
            drop(listener);
            write_frame(&mut second, "((time 7))(RSG 0 1)((nd))").unwrap();
            end_of_stream(&mut second);
        });

        let (mut connection, rx) = connection(ConnectionSettings {
            auto_connect: true,
            ..settings(port)
        });
        connection.connect();
        for _ in 0..2 {
            wait_for(&rx, |e| matches!(e, ConnectionEvent::Connected { .. }));
            wait_for(&rx, |e| *e == ConnectionEvent::Disconnected);
        }
        server.join().unwrap();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::ConnectFailed(_)));

        {
            let world = connection.world().lock().unwrap();
            assert_eq!(world.game_state.time(), 7.0);
            assert_eq!(world.game_state.score_left(), 0);
            assert_eq!(world.game_state.team_left(), None);
        }
        connection.disconnect();
    }

    #[test]
    fn test_connect_failure_without_auto_connect() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (mut connection, rx) = connection(settings(port));
        connection.connect();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::ConnectFailed(_)));
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.send(&ControlCommand::KillSim),
            Err(ConnectionError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_unblocks_idle_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (mut connection, rx) = connection(settings(port));
        connection.connect();
        let (_stream, _) = listener.accept().unwrap();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::Connected { .. }));

        connection.disconnect();
        wait_for(&rx, |e| *e == ConnectionEvent::Disconnected);
        assert!(!connection.is_connected());
    }

    #[test]
    fn test_buffered_messages_are_paced() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            write_frame(&mut stream, FULL).unwrap();
            for i in 1..5 {
                write_frame(&mut stream, &format!("((time {}))(RDS 0 1)((nd)(nd))", i)).unwrap();
            }
            end_of_stream(&mut stream);
        });

        let (mut connection, rx) = connection(ConnectionSettings {
            use_buffer: true,
            monitor_step: Duration::from_millis(25),
            ..settings(port)
        });
        connection.connect();
        wait_for(&rx, |e| matches!(e, ConnectionEvent::Connected { .. }));
        let start = Instant::now();
        wait_for(&rx, |e| *e == ConnectionEvent::Disconnected);
        server.join().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(connection.world().lock().unwrap().game_state.time(), 4.0);
    }
}
