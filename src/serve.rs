//! Development server running next to the rebuild loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Server Thread  │     │   Main Thread    │
//! │  (tiny_http)    │     │  (watch loop)    │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    serve files from        rebuild into staging,
//!    current root ◄──────────  swap root, publish
//!                  ArcSwap
//! ```
//!
//! Ctrl+C unblocks the accept loop and stops the watcher. A request already
//! being answered completes first. The process exits once both threads
//! have returned.

use crate::{
    build::build_site,
    compiler::Converter,
    config::SiteConfig,
    log,
    shutdown::Shutdown,
    utils::fs as fs_utils,
    watch::{WatchMessage, watch_and_rebuild},
};
use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use std::{
    fs,
    io::Cursor,
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Entry Point
// ============================================================================

/// Serve `build_path` and rebuild on change until Ctrl+C.
pub fn serve_and_watch(config: &SiteConfig, converter: &dyn Converter) -> Result<()> {
    let addr = config.serve.socket_addr()?;
    let (server, addr) = try_bind_port(addr, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let root = ArcSwap::from_pointee(config.build_path.clone());

    let (tx, rx) = mpsc::channel();
    let shutdown = Shutdown::default();
    {
        let server = Arc::clone(&server);
        shutdown.on_shutdown(move || server.unblock());
        let tx = tx.clone();
        shutdown.on_shutdown(move || {
            let _ = tx.send(WatchMessage::Shutdown);
        });
    }
    shutdown.install_signal_handler()?;

    log!("serve"; "http://{addr}");

    thread::scope(|scope| {
        let server_thread = scope.spawn(|| run_server(&server, &root));

        let watched = watch_and_rebuild(config, tx, &rx, || {
            build_site(config, converter, Some(&root)).map(|_| ())
        });

        // Whichever way the watcher ended, take the server down with it
        shutdown.trigger();
        let served = server_thread
            .join()
            .map_err(|_| anyhow!("server thread panicked"))?;

        watched.and(served)
    })
}

/// Accept requests until the server is unblocked.
pub fn run_server(server: &Server, root: &ArcSwap<PathBuf>) -> Result<()> {
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            log!("serve"; "request error: {e}");
        }
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(addr: SocketAddr, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let base_port = addr.port();
    let mut last_error = None;

    for offset in 0..max_retries.max(1) {
        let port = base_port.saturating_add(offset);
        let candidate = SocketAddr::new(addr.ip(), port);

        match Server::http(candidate) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {base_port} in use, using {port} instead");
                }
                let bound = server.server_addr().to_ip().unwrap_or(candidate);
                return Ok((server, bound));
            }
            // Port 0 lets the OS pick; retrying it is pointless
            Err(e) if base_port == 0 => return Err(anyhow!("Failed to bind {candidate}: {e}")),
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {max_retries} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
///
/// Request resolution order:
/// 1. Exact file match → serve file
/// 2. Directory with index.html → serve index.html (redirect to add `/`)
/// 3. Nothing found → 404
fn handle_request(request: Request, root: &ArcSwap<PathBuf>) -> Result<()> {
    let Some(target) = Target::parse(request.url()) else {
        return serve_not_found(request);
    };

    match lookup(root, &target) {
        Lookup::File(path, content) => serve_file(request, &path, content),
        Lookup::Directory => {
            let location = format!("{}/", target.url_path);
            serve_redirect(request, &location)
        }
        Lookup::Missing => serve_not_found(request),
    }
}

/// A request URL mapped onto the output tree.
#[derive(Debug, PartialEq)]
struct Target {
    url_path: String,
    relative: PathBuf,
    trailing_slash: bool,
}

impl Target {
    /// `None` for anything that tries to climb out of the root.
    fn parse(url: &str) -> Option<Self> {
        // Strip query string (e.g., ?t=123456) before resolving path
        let path = url.split(['?', '#']).next().unwrap_or_default();

        // Decode URL-encoded characters (e.g., %20 → space)
        let decoded = urlencoding::decode(path).ok()?;

        let mut relative = PathBuf::new();
        for segment in decoded.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            // A segment like `a\..\b` would still climb on Windows
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => relative.push(name),
                _ => return None,
            }
        }

        Some(Self {
            url_path: path.to_owned(),
            relative,
            trailing_slash: decoded.ends_with('/'),
        })
    }
}

#[derive(Debug, PartialEq)]
enum Lookup {
    File(PathBuf, Vec<u8>),
    /// Directory with an index, requested without the trailing slash
    Directory,
    Missing,
}

/// Resolve against the current root; if that fails and the root moved
/// meanwhile (a publish happened), try the new one.
///
/// A staging root that no longer exists was renamed into place but the
/// pointer has not caught up yet, so its published path is tried too.
fn lookup(root: &ArcSwap<PathBuf>, target: &Target) -> Lookup {
    let first = root.load_full();
    let found = lookup_in(&first, target);
    if found != Lookup::Missing {
        return found;
    }

    let current = root.load_full();
    if !Arc::ptr_eq(&first, &current) {
        return lookup_in(&current, target);
    }
    match fs_utils::published_dir(&current) {
        Some(published) if !current.exists() => lookup_in(&published, target),
        _ => Lookup::Missing,
    }
}

fn lookup_in(root: &Path, target: &Target) -> Lookup {
    let local = root.join(&target.relative);

    if local.is_dir() {
        let index = local.join("index.html");
        if !index.is_file() {
            return Lookup::Missing;
        }
        if !target.relative.as_os_str().is_empty() && !target.trailing_slash {
            return Lookup::Directory;
        }
        return match fs::read(&index) {
            Ok(content) => Lookup::File(index, content),
            Err(_) => Lookup::Missing,
        };
    }

    match fs::read(&local) {
        Ok(content) => Lookup::File(local, content),
        Err(_) => Lookup::Missing,
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header `{name}: {value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path, content: Vec<u8>) -> Result<()> {
    let response = Response::from_data(content)
        .with_header(header("Content-Type", guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

fn serve_redirect(request: Request, location: &str) -> Result<()> {
    let response = Response::empty(StatusCode(301)).with_header(header("Location", location)?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}
