//! Audio retrieval for locally hosted playback.
//!
//! When downloads are enabled the pages reference `./{date_slug}.mp3`,
//! so each file is pulled from the audio server into the output
//! directory alongside its page.

use crate::log;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::path::Path;

/// Fetch one audio file from the server into `dest`.
///
/// Returns whether a file was actually written. An existing local copy
/// short-circuits the request and is never re-validated against the
/// server, so repeat runs over the same output directory download
/// nothing. A 404 is a skip rather than an error: not every devotional
/// has audio on the server yet.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<bool> {
    if dest.exists() {
        return Ok(false);
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to request {url}"))?;

    if response.status() == StatusCode::NOT_FOUND {
        log!("audio"; "{url} not available on the server");
        return Ok(false);
    }

    let bytes = response
        .error_for_status()
        .with_context(|| format!("Audio request to {url} failed"))?
        .bytes()
        .await
        .with_context(|| format!("Failed to read audio body from {url}"))?;

    tokio::fs::write(dest, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    log!("audio"; "saved {}", dest.display());
    Ok(true)
}

// ============================================================================
// Tests
// ============================================================================
