//! Headless browser screenshots of rendered pages.
//!
//! Shells out to the configured browser command instead of driving it
//! over a protocol. One process per page, bounded by the build's
//! concurrency cap.

use crate::{config::ImageConfig, exec, log};
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Screenshot height in pixels. The width comes from the config.
const WINDOW_HEIGHT: u32 = 1080;

/// Rasterize one rendered page into a PNG.
///
/// The page is loaded from disk through a `file://` URL so its relative
/// asset references resolve against the output directory.
pub async fn capture(image: &ImageConfig, page: &Path, shot: &Path) -> Result<()> {
    let url = page_url(page)?;
    let command = image.command.clone();
    let screenshot = format!("--screenshot={}", shot.display());
    let window_size = format!("--window-size={},{WINDOW_HEIGHT}", image.width);

    tokio::task::spawn_blocking(move || {
        exec!(
            &command;
            "--headless=new",
            "--no-sandbox",
            "--disable-setuid-sandbox",
            screenshot,
            window_size,
            url,
        )
    })
    .await
    .context("Capture task panicked")??;

    if !shot.is_file() {
        bail!("Browser exited cleanly but produced no {}", shot.display());
    }

    log!("image"; "captured {}", shot.display());
    Ok(())
}

/// Absolute `file://` URL for a page on disk.
fn page_url(page: &Path) -> Result<String> {
    let abs = page
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", page.display()))?;
    Ok(format!("file://{}", abs.display()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("2025-12-08.html");
        std::fs::write(&page, "<html></html>").unwrap();

        let url = page_url(&page).unwrap();
        assert!(url.starts_with("file:///"), "{url}");
        assert!(url.ends_with("2025-12-08.html"), "{url}");
    }

    #[test]
    fn test_page_url_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(page_url(&dir.path().join("missing.html")).is_err());
    }
}
