//! WebSocket hub for live reload clients.
//!
//! One acceptor thread performs handshakes, one reader thread drops closed
//! connections. Broadcasts happen on the caller's thread, which is a stage
//! worker, so a slow client only delays the stage that triggered it.

use std::{
    io::ErrorKind,
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tungstenite::{Message, WebSocket};

use super::{ReloadMessage, ReloadSignal, ReloadSink};
use crate::{asset::AssetKind, error::PipelineError, shutdown::ShutdownToken};

/// Successive ports tried when the configured one is taken.
pub(crate) const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ReloadHub {
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    /// Last error per kind, replayed to clients that connect later.
    errors: Mutex<[Option<ReloadMessage>; 5]>,
    addr: SocketAddr,
}

impl ReloadHub {
    /// Bind the reload port and start accepting clients until `shutdown`.
    pub fn bind(
        interface: IpAddr,
        base_port: u16,
        shutdown: ShutdownToken,
    ) -> Result<Arc<Self>, PipelineError> {
        let (listener, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        listener
            .set_nonblocking(true)
            .map_err(|e| PipelineError::Bind {
                addr,
                message: e.to_string(),
            })?;

        let hub = Arc::new(Self {
            clients: Mutex::new(Vec::new()),
            errors: Mutex::new(Default::default()),
            addr,
        });

        let acceptor = Arc::clone(&hub);
        let token = shutdown.clone();
        thread::spawn(move || acceptor.accept_loop(&listener, &token));

        let reader = Arc::clone(&hub);
        thread::spawn(move || reader.reader_loop(&shutdown));

        Ok(hub)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    fn accept_loop(&self, listener: &TcpListener, shutdown: &ShutdownToken) {
        while !shutdown.is_cancelled() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("reload"; "client connected: {}", peer);
                    // handshake needs a blocking socket
                    let _ = stream.set_nonblocking(false);
                    self.add_client(stream);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    log!("reload"; "accept error: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        for mut ws in self.clients.lock().drain(..) {
            let _ = ws.close(None);
        }
    }

    fn add_client(&self, stream: TcpStream) {
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                log!("reload"; "handshake failed: {}", e);
                return;
            }
        };

        // hold the list while greeting so no broadcast slips in between
        let mut clients = self.clients.lock();
        let pending = self.errors.lock().iter().flatten().next().cloned();
        let greeting = std::iter::once(ReloadMessage::connected()).chain(pending);
        for msg in greeting {
            if let Err(e) = ws.send(Message::text(msg.to_json())) {
                debug!("reload"; "failed to greet client: {}", e);
                return;
            }
        }

        let _ = ws.get_ref().set_nonblocking(true);
        clients.push(ws);
        debug!("reload"; "clients: {}", clients.len());
    }

    /// Poll clients so closed connections are noticed without a broadcast.
    fn reader_loop(&self, shutdown: &ShutdownToken) {
        while !shutdown.is_cancelled() {
            thread::sleep(POLL_INTERVAL);
            self.clients.lock().retain_mut(|ws| match ws.read() {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
                Err(_) => false,
            });
        }
    }

    fn broadcast(&self, msg: &ReloadMessage) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            debug!("reload"; "no clients connected");
            return;
        }

        let text = msg.to_json();
        clients.retain_mut(|ws| match ws.send(Message::text(text.clone())) {
            Ok(()) => true,
            // queued by tungstenite, flushed on the next write
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
            Err(e) => {
                debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        debug!("reload"; "broadcast to {} clients", clients.len());
    }
}

impl ReloadSink for ReloadHub {
    fn reload(&self, signal: &ReloadSignal) {
        let reason = match signal.paths.len() {
            1 => "1 file".to_string(),
            n => format!("{n} files"),
        };
        self.broadcast(&ReloadMessage::reload(signal.kind, reason));
    }

    fn error(&self, kind: AssetKind, path: &str, error: &str) {
        let msg = ReloadMessage::error(path, error);
        self.errors.lock()[kind.index()] = Some(msg.clone());
        self.broadcast(&msg);
    }

    fn clear_error(&self, kind: AssetKind) {
        let next = {
            let mut errors = self.errors.lock();
            if errors[kind.index()].take().is_none() {
                return;
            }
            errors.iter().flatten().next().cloned()
        };
        // another stage may still be broken; show that one instead
        self.broadcast(&next.unwrap_or(ReloadMessage::ClearError));
    }
}

/// Bind `interface:base_port`, moving up one port at a time while in use.
pub(crate) fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, SocketAddr), PipelineError> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let addr = SocketAddr::new(interface, base_port.saturating_add(offset));
        match TcpListener::bind(addr) {
            Ok(listener) => {
                let bound = listener.local_addr().unwrap_or(addr);
                return Ok((listener, bound));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(PipelineError::Bind {
        addr: SocketAddr::new(interface, base_port),
        message: format!(
            "no free port after {} attempts: {}",
            max_retries,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ),
    })
}
