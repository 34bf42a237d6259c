//! Connect command - follow a live server
//!
//! Game state transitions are printed from a separate thread as the
//! connection applies them. With `--record` every session is mirrored to a
//! new log that `sparkview play` can replay, including the draw commands
//! agents send to the draw port.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use sparkview_core::dispatch::lock_world;
use sparkview_core::{
    Config, ConnectionEvent, ConnectionSettings, DrawCommandReceiver, GameStateEvent,
    SceneSkeleton, ServerConnection, World,
};
use sparkview_shared::{ControlCommand, Team};
use tracing::{debug, warn};

use crate::report::Transitions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Left,
    Right,
}

impl From<Side> for Team {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Team::Left,
            Side::Right => Team::Right,
        }
    }
}

/// Arguments for the connect command
#[derive(Args)]
pub struct ConnectArgs {
    /// Server host (defaults to the configured one)
    #[arg(long)]
    pub host: Option<String>,

    /// Monitor port (defaults to the configured one)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Mirror every session to a new log in this directory
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Exit when the connection drops or cannot be made
    #[arg(long)]
    pub no_reconnect: bool,

    /// Kick off for this team once connected
    #[arg(long, value_enum)]
    pub kick_off: Option<Side>,

    /// Exit after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// UDP port for agent draw commands (defaults to the configured one)
    #[arg(long)]
    pub draw_port: Option<u16>,

    /// Do not listen for draw commands
    #[arg(long)]
    pub no_draw: bool,
}

/// Execute the connect command
pub fn execute(args: ConnectArgs, config: &Config) -> Result<()> {
    let mut settings = ConnectionSettings::from_config(config);
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if args.record.is_some() {
        settings.record_directory = args.record;
    }
    if args.no_reconnect {
        settings.auto_connect = false;
    }
    let reconnect = settings.auto_connect;

    let world = Arc::new(Mutex::new(World::new(Box::new(SceneSkeleton::new()))));
    let (state_tx, state_rx) = mpsc::channel();
    lock_world(&world).game_state.subscribe(state_tx);
    let printer = spawn_printer(Arc::downgrade(&world), state_rx);

    println!("Connecting to {}:{}...", settings.host, settings.port);
    let mut connection = ServerConnection::new(world, settings);
    let (tx, rx) = mpsc::channel();
    connection.subscribe(tx);

    let draw_port = args.draw_port.unwrap_or(config.network.draw_port);
    let draw_receiver = if config.network.draw_commands && !args.no_draw {
        match DrawCommandReceiver::bind(draw_port, vec![connection.draw_command_sink()]) {
            Ok(receiver) => Some(receiver),
            Err(e) => {
                warn!("{}; draw commands will not be recorded", e);
                None
            }
        }
    } else {
        None
    };
    connection.connect();

    let deadline = args
        .duration
        .map(|seconds| Instant::now() + Duration::from_secs(seconds));
    let result = follow(&connection, &rx, deadline, reconnect, args.kick_off);

    // The world and its subscriber go away with the connection, ending the printer
    drop(draw_receiver);
    drop(connection);
    let _ = printer.join();
    result
}

fn follow(
    connection: &ServerConnection,
    events: &Receiver<ConnectionEvent>,
    deadline: Option<Instant>,
    reconnect: bool,
    kick_off: Option<Side>,
) -> Result<()> {
    loop {
        let event = match deadline {
            Some(deadline) => {
                match events.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        debug!("connect duration elapsed");
                        return Ok(());
                    }
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                }
            }
            None => match events.recv() {
                Ok(event) => event,
                Err(_) => return Ok(()),
            },
        };

        match event {
            ConnectionEvent::Connected { host, port } => {
                println!("Connected to {}:{}", host, port);
                if let Some(side) = kick_off
                    && let Err(e) = connection.send(&ControlCommand::KickOff(side.into()))
                {
                    warn!("failed to send kick off: {}", e);
                }
            }
            ConnectionEvent::RecordingStarted(path) => {
                println!("Recording to {}", path.display());
            }
            ConnectionEvent::ConnectFailed(reason) if !reconnect => {
                bail!("Failed to connect: {}", reason);
            }
            ConnectionEvent::ConnectFailed(reason) => {
                warn!("connect failed: {}; retrying", reason);
            }
            ConnectionEvent::Disconnected => {
                println!("Disconnected");
                if !reconnect {
                    return Ok(());
                }
            }
        }
    }
}

fn spawn_printer(world: Weak<Mutex<World>>, events: Receiver<GameStateEvent>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("state-printer".into())
        .spawn(move || {
            let mut transitions = Transitions::new();
            for _ in events.iter() {
                let Some(world) = world.upgrade() else {
                    break;
                };
                let lines = transitions.observe(&lock_world(&world).game_state);
                for line in lines {
                    println!("{}", line);
                }
            }
        })
        .expect("failed to spawn state printer thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use sparkview_shared::{read_frame, write_frame};

    fn args(port: u16) -> ConnectArgs {
        ConnectArgs {
            host: Some("127.0.0.1".to_string()),
            port: Some(port),
            record: None,
            no_reconnect: true,
            kick_off: None,
            duration: Some(10),
            draw_port: None,
            no_draw: true,
        }
    }

    #[test]
    fn test_follows_session_until_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_frame(&mut stream).unwrap();
            for (i, time) in [0.0, 0.04, 0.08].iter().enumerate() {
                let scene = if i == 0 { "RSG" } else { "RDS" };
                let message = format!(
                    "((time {})(half 1)(score_left 0)(score_right 0))({} 0 1)((nd))",
                    time, scene
                );
                write_frame(&mut stream, &message).unwrap();
            }
            request
        });

        let dir = tempfile::tempdir().unwrap();
        let args = ConnectArgs {
            record: Some(dir.path().to_path_buf()),
            kick_off: Some(Side::Left),
            ..args(port)
        };
        execute(args, &Config::default()).unwrap();

        assert_eq!(
            server.join().unwrap().as_deref(),
            Some("(kickOff Left)")
        );
        let recordings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(recordings.len(), 1);
    }

    #[test]
    fn test_refused_connection_fails_without_reconnect() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = execute(args(port), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
