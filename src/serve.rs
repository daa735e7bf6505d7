//! Preview server for the generated site.
//!
//! A lightweight HTTP server built on `tiny_http` that serves the build
//! output directory:
//!
//! - Static file serving with content type detection
//! - Automatic `index.html` resolution for directories
//! - A generated devotional index at `/` when the output has no
//!   `index.html` of its own, newest page first
//! - Graceful shutdown on Ctrl+C

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result};
use std::{fs, io::Cursor, net::SocketAddr, path::Path, sync::Arc};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Devotional listing HTML template (embedded at compile time)
const LISTING_TEMPLATE: &str = include_str!("embed/serve/listing.html");

/// 404 body, in the same language as the pages
const NOT_FOUND_BODY: &str = "404 - Archivo no encontrado";

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the preview server.
///
/// This function:
/// 1. Binds to the configured interface and port (with auto-retry on port conflict)
/// 2. Sets up Ctrl+C handler for graceful shutdown
/// 3. Enters the main request handling loop
///
/// The server blocks until Ctrl+C is received.
pub fn serve_site(config: &SiteConfig) -> Result<()> {
    let interface: std::net::IpAddr = config.serve.interface.parse()?;
    let base_port = config.serve.port;

    let (server, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{addr}");
    log!("serve"; "serving {}", config.build.output.display());

    // Handle requests in main thread (blocks until Ctrl+C)
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, config) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: std::net::IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => {
                // Will retry silently
                continue;
            }
            Err(e) => {
                // Last attempt failed
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
///
/// Request resolution order:
/// 1. Exact file match → serve file
/// 2. Directory with index.html → serve index.html
/// 3. Output root without index.html → generated devotional listing
/// 4. Nothing found → 404
fn handle_request(request: Request, config: &SiteConfig) -> Result<()> {
    let serve_root = &config.build.output;

    // Decode URL-encoded characters (e.g., %20 → space)
    let url_path = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    // Strip query string (e.g., ?t=123456) before resolving path
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');
    let local_path = serve_root.join(request_path);

    // Try to serve the file directly
    if local_path.is_file() {
        return serve_file(request, &local_path);
    }

    if local_path.is_dir() {
        let index_path = local_path.join("index.html");
        if index_path.is_file() {
            return serve_file(request, &index_path);
        }

        // Only the root falls back to the generated listing
        if request_path.is_empty()
            && let Ok(listing) = devotional_listing(serve_root)
        {
            return serve_html(request, listing);
        }
    }

    // 404 Not Found
    serve_not_found(request)
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let response = Response::from_data(content)
        .with_header(Header::from_bytes("Content-Type", content_type).unwrap());

    request.respond(response)?;
    Ok(())
}

/// Serve HTML content.
fn serve_html(request: Request, content: String) -> Result<()> {
    let response = Response::from_string(content)
        .with_header(Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap());
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![Header::from_bytes("Content-Type", "text/plain; charset=utf-8").unwrap()],
        Cursor::new(NOT_FOUND_BODY),
        Some(NOT_FOUND_BODY.len()),
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
        Some("ico") => "image/x-icon",

        // Audio devotionals
        Some("mp3") => "audio/mpeg",

        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Devotional Listing
// ============================================================================

/// Generate the root index listing every devotional page, newest first.
///
/// The date-slug file names sort chronologically, so a descending
/// lexical sort puts the most recent devotional on top. Hidden files
/// and non-page files are skipped.
fn devotional_listing(output_dir: &Path) -> std::io::Result<String> {
    let mut pages: Vec<String> = fs::read_dir(output_dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            (is_file && !name.starts_with('.') && name.ends_with(".html")).then_some(name)
        })
        .collect();
    pages.sort_unstable_by(|a, b| b.cmp(a));

    let entries: Vec<String> = pages
        .iter()
        .map(|name| {
            let label = name.trim_end_matches(".html");
            format!(r#"<a href="/{name}">{label}</a>"#)
        })
        .collect();

    #[allow(clippy::literal_string_with_formatting_args)]
    // These are template placeholders, not format args
    Ok(LISTING_TEMPLATE
        .replace("{count}", &pages.len().to_string())
        .replace("{entries}", &entries.join("\n    ")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            guess_content_type(Path::new("2025-12-08.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("2025-12-08.mp3")), "audio/mpeg");
        assert_eq!(
            guess_content_type(Path::new("podcast.xml")),
            "application/xml; charset=utf-8"
        );
        assert_eq!(
            guess_content_type(Path::new("images/banner_01.png")),
            "image/png"
        );
        assert_eq!(
            guess_content_type(Path::new("archivo.bin")),
            "application/octet-stream"
        );
        assert_eq!(
            guess_content_type(Path::new("sin_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_listing_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2025-12-08.html", "2025-12-10.html", "2025-12-09.html"] {
            fs::write(dir.path().join(name), "<html></html>").unwrap();
        }

        let listing = devotional_listing(dir.path()).unwrap();

        let newest = listing.find("2025-12-10").unwrap();
        let middle = listing.find("2025-12-09").unwrap();
        let oldest = listing.find("2025-12-08").unwrap();
        assert!(newest < middle && middle < oldest);
        assert!(listing.contains("Total: 3 devocionales"));
    }

    #[test]
    fn test_listing_links_strip_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2025-12-08.html"), "x").unwrap();

        let listing = devotional_listing(dir.path()).unwrap();

        assert!(listing.contains(r#"<a href="/2025-12-08.html">2025-12-08</a>"#));
    }

    #[test]
    fn test_listing_skips_non_pages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2025-12-08.html"), "x").unwrap();
        fs::write(dir.path().join("2025-12-08.mp3"), "x").unwrap();
        fs::write(dir.path().join(".oculto.html"), "x").unwrap();
        fs::create_dir(dir.path().join("images")).unwrap();

        let listing = devotional_listing(dir.path()).unwrap();

        assert!(listing.contains("2025-12-08.html"));
        assert!(!listing.contains("mp3"));
        assert!(!listing.contains("oculto"));
        assert!(!listing.contains(r#"href="/images"#));
        assert!(listing.contains("Total: 1 devocionales"));
    }

    #[test]
    fn test_listing_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let listing = devotional_listing(dir.path()).unwrap();
        assert!(listing.contains("Total: 0 devocionales"));
    }
}
