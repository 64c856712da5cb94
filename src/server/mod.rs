//! Development server.
//!
//! Serves the output tree over `tiny_http` and injects the live reload
//! client into every HTML page. Reload messages themselves travel over the
//! WebSocket hub in [`crate::reload`].

mod mime;
mod path;
mod response;

pub use path::resolve_path;
pub use response::maybe_inject_reload;

use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tiny_http::{Method, Request, Server};

use crate::{
    embed::RELOAD_JS_PATH,
    error::{PipelineError, Result},
    reload::MAX_PORT_RETRIES,
    shutdown::ShutdownToken,
};

/// How long the request loop blocks before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound HTTP server over the output root.
pub struct DevServer {
    server: Arc<Server>,
    addr: SocketAddr,
    root: Arc<Path>,
    reload_port: Option<u16>,
}

impl DevServer {
    /// Bind `interface:port`, trying up to ten successive ports.
    ///
    /// With `reload_port` set, served HTML loads the reload client.
    pub fn bind(
        interface: IpAddr,
        port: u16,
        root: impl Into<PathBuf>,
        reload_port: Option<u16>,
    ) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, port)?;
        Ok(Self {
            server: Arc::new(server),
            addr,
            root: Arc::from(root.into()),
            reload_port,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answer requests until `shutdown`. Blocks the calling thread.
    ///
    /// Requests are handled on the rayon pool so a large file never stalls
    /// the accept loop.
    pub fn run(&self, shutdown: &ShutdownToken) {
        log!("serve"; "http://{}", self.addr);

        while !shutdown.is_cancelled() {
            let request = match self.server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    log!("serve"; "accept error: {}", e);
                    continue;
                }
            };

            let root = Arc::clone(&self.root);
            let reload_port = self.reload_port;
            rayon::spawn(move || {
                if let Err(e) = handle_request(request, &root, reload_port) {
                    log!("serve"; "request error: {:#}", e);
                }
            });
        }

        debug!("serve"; "stopped");
    }
}

fn handle_request(request: Request, root: &Path, reload_port: Option<u16>) -> anyhow::Result<()> {
    debug!("serve"; "{} {}", request.method(), request.url());

    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    if let Some(port) = reload_port
        && request.url().split('?').next() == Some(RELOAD_JS_PATH)
    {
        return response::respond_reload_js(request, port);
    }

    match path::resolve_path(request.url(), root) {
        Some(file) => response::respond_file(request, &file, reload_port),
        None => response::respond_not_found(request, root, reload_port),
    }
}

fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = String::new();

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                // port 0 asks the OS; report what it picked
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(PipelineError::Bind {
        addr: SocketAddr::new(interface, base_port),
        message: format!("no free port after {MAX_PORT_RETRIES} attempts: {last_error}"),
    })
}
