//! HTTP response handlers.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::mime::{self, types};
use crate::embed::{RELOAD_JS, ReloadVars, reload_script_tag};

/// Respond with a static file, injecting the reload client into HTML.
pub fn respond_file(request: Request, path: &Path, reload_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = maybe_inject_reload(body, content_type, reload_port);
    send_body(request, 200, content_type, body)
}

/// Respond with `404.html` from the output root, or plain text.
pub fn respond_not_found(request: Request, root: &Path, reload_port: Option<u16>) -> Result<()> {
    let custom = root.join("404.html");
    let has_custom = custom.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom) {
        let body = maybe_inject_reload(body, types::HTML, reload_port);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with the reload client from memory.
pub fn respond_reload_js(request: Request, reload_port: u16) -> Result<()> {
    let body = RELOAD_JS.render(&ReloadVars { reload_port });
    send_body(request, 200, types::JAVASCRIPT, body.into_bytes())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, types::PLAIN, b"405 Method Not Allowed".to_vec())
}

/// Inject the reload client if the body is HTML and a reload port is known.
pub fn maybe_inject_reload(body: Vec<u8>, content_type: &str, reload_port: Option<u16>) -> Vec<u8> {
    match (content_type.starts_with("text/html"), reload_port) {
        (true, Some(_)) => inject_script(&body, reload_script_tag().as_bytes()),
        _ => body,
    }
}

/// Insert `script` before the last `</body>`, or append it.
fn inject_script(content: &[u8], script: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &'static str, value: &'static str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header {key}: {value}"))
}
