//! UDP draw command receiver
//!
//! Agents send debug drawings to the monitor as UDP datagrams on the draw
//! port. A [`DrawCommandReceiver`] owns the socket and a thread that hands
//! every datagram, as received, to each attached [`DrawCommandSink`].

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::logfile::DrawCommandSink;

/// Port agents send draw commands to.
pub const DEFAULT_DRAW_PORT: u16 = 32769;

/// Largest datagram accepted; longer ones are truncated by the socket.
const RECV_BUFFER_SIZE: usize = 512;

/// How often the receive thread checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from setting up the draw port.
#[derive(Debug, thiserror::Error)]
pub enum DrawReceiverError {
    #[error("unable to bind draw port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("draw socket setup failed: {0}")]
    Io(#[from] io::Error),
}

/// Listens for draw commands until dropped.
pub struct DrawCommandReceiver {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DrawCommandReceiver {
    /// Bind `port` on all interfaces and start receiving. Port 0 picks a free one.
    pub fn bind(
        port: u16,
        sinks: Vec<Arc<Mutex<dyn DrawCommandSink>>>,
    ) -> Result<Self, DrawReceiverError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|source| DrawReceiverError::Bind { port, source })?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        info!(port = local_addr.port(), "listening for draw commands");

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("draw-receiver".into())
            .spawn(move || receive(&socket, &sinks, &thread_stop))
            .expect("failed to spawn draw receiver thread");

        Ok(Self {
            local_addr,
            stop,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

impl Drop for DrawCommandReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        debug!("draw receiver stopped");
    }
}

fn receive(socket: &UdpSocket, sinks: &[Arc<Mutex<dyn DrawCommandSink>>], stop: &AtomicBool) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    while !stop.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                trace!("{} bytes of draw commands from {}", len, from);
                for sink in sinks {
                    let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
                    sink.execute(&buf[..len]);
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => warn!("error while receiving draw commands: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Sender};

    struct ChannelSink(Sender<Vec<u8>>);

    impl DrawCommandSink for ChannelSink {
        fn execute(&mut self, bytes: &[u8]) {
            let _ = self.0.send(bytes.to_vec());
        }
    }

    fn channel_sink() -> (Arc<Mutex<dyn DrawCommandSink>>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Mutex::new(ChannelSink(tx))), rx)
    }

    #[test]
    fn test_datagrams_reach_every_sink() {
        let (first, first_rx) = channel_sink();
        let (second, second_rx) = channel_sink();
        let receiver = DrawCommandReceiver::bind(0, vec![first, second]).unwrap();
        assert_ne!(receiver.port(), 0);

        let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = ("127.0.0.1", receiver.port());
        agent.send_to(&[0, 1, 2, 255], target).unwrap();
        agent.send_to(&[7], target).unwrap();

        let timeout = Duration::from_secs(5);
        for rx in [&first_rx, &second_rx] {
            assert_eq!(rx.recv_timeout(timeout).unwrap(), vec![0, 1, 2, 255]);
            assert_eq!(rx.recv_timeout(timeout).unwrap(), vec![7]);
        }
    }

    #[test]
    fn test_port_in_use_fails_to_bind() {
        let taken = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(matches!(
            DrawCommandReceiver::bind(port, Vec::new()),
            Err(DrawReceiverError::Bind { .. })
        ));
    }

    #[test]
    fn test_drop_stops_receiving() {
        let (sink, rx) = channel_sink();
        let receiver = DrawCommandReceiver::bind(0, vec![sink]).unwrap();
        drop(receiver);
        // the sink went away with the thread
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
    }
}
