//! Build pipeline orchestration.
//!
//! Turns the raw post list into the final set of static pages.
//!
//! # Architecture
//!
//! ```text
//! run()
//!     │
//!     ├── fetch_posts() ──► post list from the API or a local file
//!     │
//!     ├── pass 1: one DevoMeta per post, whole set sorted newest-first
//!     │           (navigation links are defined over this ordering)
//!     │
//!     ├── pass 2: per document, RENDER_CONCURRENCY in flight:
//!     │           extract fields ──► render template ──► write page
//!     │           ──► capture PNG ──► download audio   (both optional)
//!     │
//!     └── devocionales.json + index.html
//! ```

use crate::{
    audio, capture,
    config::{AudioConfig, SiteConfig},
    extract::ExtractedFields,
    fetch::{self, Post},
    log,
    logger::ProgressBars,
    meta::{self, DevoMeta},
    render,
    utils::text,
};
use anyhow::{Context, Result};
use std::{
    cmp::Reverse,
    collections::HashMap,
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Semaphore;

/// Documents in flight at once during pass 2. Caps simultaneous browser
/// sessions and audio downloads.
const RENDER_CONCURRENCY: usize = 4;

/// Everything one pass-2 task needs, owned so it can move into the task.
struct RenderJob {
    meta: DevoMeta,
    body: String,
    nav: String,
}

/// Build the whole site.
///
/// `main` stays synchronous; the async runtime lives entirely inside
/// this call.
pub fn run(config: &'static SiteConfig) -> Result<()> {
    tokio::runtime::Runtime::new()
        .context("Failed to start async runtime")?
        .block_on(run_inner(config))
}

async fn run_inner(config: &'static SiteConfig) -> Result<()> {
    let output = &config.build.output;

    // ========================================================================
    // Fetch posts, load the template, prepare the output directory
    // ========================================================================

    let client = fetch::http_client()?;
    let mut posts = fetch::fetch_posts(&client, &config.source.url).await?;
    log!("fetch"; "got {} posts", posts.len());
    if posts.is_empty() {
        log!("warn"; "source returned no posts");
    }

    let template = fs::read_to_string(&config.build.template).with_context(|| {
        format!("Failed to read template: {}", config.build.template.display())
    })?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let copied = copy_assets(&config.build.assets, output)?;
    if copied > 0 {
        log!("assets"; "copied {copied} files");
    }

    // Run-level token, resolved once over the raw template
    let template: Arc<str> =
        render::substitute_one(&template, "audio_server_url", audio_base(&config.audio)).into();

    // ========================================================================
    // Pass 1: derive metadata, order the set
    // ========================================================================
    // Metadata derivation is infallible, so pass 1 only fails on a bad
    // source. Duplicate slugs are a precondition violation: the colliding
    // pages overwrite each other's files, warn and keep going.

    sort_newest_first(&mut posts);
    let metas: Vec<DevoMeta> = posts.iter().map(DevoMeta::from_post).collect();

    for slug in meta::duplicate_slugs(&metas) {
        log!("warn"; "duplicate date slug `{slug}`, pages will overwrite each other");
    }

    // ========================================================================
    // Pass 2: render every document
    // ========================================================================
    // Failures stay confined to their document: log, count, move on.

    log!("build"; "rendering {} devotionals", metas.len());
    let progress = Arc::new(ProgressBars::new_filtered(&[("render", metas.len())]));
    let semaphore = Arc::new(Semaphore::new(RENDER_CONCURRENCY));
    let failed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(metas.len());
    for (index, m) in metas.iter().enumerate() {
        let job = RenderJob {
            meta: m.clone(),
            body: posts[index].content.rendered.clone(),
            nav: meta::nav_links(&metas, index).to_fragment(),
        };
        let semaphore = Arc::clone(&semaphore);
        let template = Arc::clone(&template);
        let client = client.clone();
        let progress = Arc::clone(&progress);
        let failed = Arc::clone(&failed);

        handles.push(tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.unwrap();
            if let Err(err) = render_document(config, &client, &template, &job).await {
                log!("error"; "{}: {err:#}", text::strip_html(&job.meta.display_title));
                failed.fetch_add(1, Ordering::Relaxed);
            }
            if let Some(p) = progress.as_ref() {
                p.inc_by_name("render");
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }
    if let Some(p) = progress.as_ref() {
        p.finish();
    }

    // ========================================================================
    // Index artifacts
    // ========================================================================

    let json =
        serde_json::to_string_pretty(&metas).context("Failed to serialize metadata list")?;
    let json_path = output.join("devocionales.json");
    fs::write(&json_path, &json)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    write_index(config, &json)?;

    let failed = failed.load(Ordering::Relaxed);
    let rendered = metas.len() - failed;
    if failed > 0 {
        log!("warn"; "{rendered} of {} devotionals rendered, {failed} failed", metas.len());
    } else {
        log!("build"; "done, {rendered} devotionals rendered");
    }

    Ok(())
}

// ============================================================================
// Per-Document Pipeline
// ============================================================================

/// Process one document end to end: extract, render, write, side effects.
async fn render_document(
    config: &SiteConfig,
    client: &reqwest::Client,
    template: &str,
    job: &RenderJob,
) -> Result<()> {
    let fields = ExtractedFields::from_body(&job.body);
    let html = render::substitute(template, &token_values(job, &fields));

    let page_path = config.build.output.join(&job.meta.output_file_name);
    tokio::fs::write(&page_path, &html)
        .await
        .with_context(|| format!("Failed to write {}", page_path.display()))?;

    if config.image.enable {
        let shot_path = config.build.output.join(format!("{}.png", job.meta.date_slug));
        capture::capture(&config.image, &page_path, &shot_path).await?;
    }

    if config.audio.download {
        let url = format!("{}{}.mp3", config.audio.server_url, job.meta.date_slug);
        let dest = config.build.output.join(format!("{}.mp3", job.meta.date_slug));
        audio::download(client, &url, &dest).await?;
    }

    Ok(())
}

/// Build the substitution map for one document's page render.
fn token_values(job: &RenderJob, fields: &ExtractedFields) -> HashMap<&'static str, String> {
    let meta = &job.meta;
    HashMap::from([
        ("verse_ref", fields.verse_ref.clone()),
        ("date", meta.date_display.clone()),
        ("verse_text", fields.verse_text.clone()),
        ("devotional_title", meta.display_title.clone()),
        ("biblical_treasure", fields.biblical_treasure.clone()),
        ("call_to_action", fields.call_to_action.clone()),
        ("audio_filename", format!("{}.mp3", meta.date_slug)),
        ("png_filename", format!("{}.png", meta.date_slug)),
        ("css_variant", meta.presentation_variant.clone()),
        ("cover_image", meta.banner_asset.clone()),
        ("prev_next_navigation", job.nav.clone()),
    ])
}

// ============================================================================
// Helpers
// ============================================================================

/// Order posts newest-first by date slug.
///
/// Plain string comparison is correct because well-formed slugs are
/// fixed-width `YYYY-MM-DD`. Fallback slugs sort arbitrarily but
/// deterministically among themselves.
fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by_cached_key(|post| Reverse(meta::date_slug_for(post)));
}

/// Value of the run-level `{{audio_server_url}}` token.
///
/// When downloads are enabled the pages reference their local copies,
/// otherwise they point at the remote audio server.
fn audio_base(audio: &AudioConfig) -> &str {
    if audio.download { "./" } else { &audio.server_url }
}

/// Copy the assets directory flat into `output/images/`.
///
/// Page templates reference banners as `images/devo-NN.jpg`, so the
/// destination name is fixed no matter where the assets come from.
/// A missing source directory is a warning, not an error.
fn copy_assets(assets: &Path, output: &Path) -> Result<usize> {
    if !assets.is_dir() {
        log!("warn"; "assets directory `{}` not found, skipping", assets.display());
        return Ok(0);
    }

    let dest = output.join("images");
    fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut copied = 0;
    for entry in fs::read_dir(assets)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            fs::copy(&path, dest.join(entry.file_name()))
                .with_context(|| format!("Failed to copy {}", path.display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Emit `index.html` when the index template exists.
///
/// The `{{devotionals_data}}` token receives the same JSON written to
/// `devocionales.json`, so the page can render the list client-side.
fn write_index(config: &SiteConfig, json: &str) -> Result<()> {
    let template_path = &config.build.index_template;
    if !template_path.exists() {
        log!("build"; "no index template, skipping index.html");
        return Ok(());
    }

    let template = fs::read_to_string(template_path).with_context(|| {
        format!("Failed to read index template: {}", template_path.display())
    })?;
    let html = render::substitute_one(&template, "devotionals_data", json);

    let index_path = config.build.output.join("index.html");
    fs::write(&index_path, html)
        .with_context(|| format!("Failed to write {}", index_path.display()))?;
    log!("build"; "index.html generated");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Rendered;

    fn post(date: &str, slug: &str, link: &str, title: &str, content: &str) -> Post {
        Post {
            id: 1,
            date: date.to_string(),
            slug: slug.to_string(),
            link: link.to_string(),
            title: Rendered {
                rendered: title.to_string(),
            },
            content: Rendered {
                rendered: content.to_string(),
            },
        }
    }

    fn job_for(post: &Post) -> RenderJob {
        RenderJob {
            meta: DevoMeta::from_post(post),
            body: post.content.rendered.clone(),
            nav: String::new(),
        }
    }

    #[test]
    fn test_sort_newest_first_by_permalink_date() {
        let mut posts = vec![
            post("a", "a", "https://x.com/2025/12/08/a/", "t", ""),
            post("b", "b", "https://x.com/2025/12/10/b/", "t", ""),
            post("c", "c", "https://x.com/2025/12/09/c/", "t", ""),
        ];
        sort_newest_first(&mut posts);
        let slugs: Vec<_> = posts.iter().map(meta::date_slug_for).collect();
        assert_eq!(slugs, ["2025-12-10", "2025-12-09", "2025-12-08"]);
    }

    #[test]
    fn test_audio_base_local_when_downloading() {
        let audio = AudioConfig {
            download: true,
            server_url: "https://cenfolic.com/audio/devo/".to_string(),
        };
        assert_eq!(audio_base(&audio), "./");
    }

    #[test]
    fn test_audio_base_remote_otherwise() {
        let audio = AudioConfig {
            download: false,
            server_url: "https://cenfolic.com/audio/devo/".to_string(),
        };
        assert_eq!(audio_base(&audio), "https://cenfolic.com/audio/devo/");
    }

    #[test]
    fn test_token_values_covers_the_template_contract() {
        let p = post(
            "2025-12-08T10:00:00",
            "s",
            "https://x.com/2025/12/08/s/",
            "Título",
            "<blockquote>Dios es amor. 1 Juan 4:8 (NTV)</blockquote>",
        );
        let job = job_for(&p);
        let fields = ExtractedFields::from_body(&job.body);
        let values = token_values(&job, &fields);

        for key in [
            "verse_ref",
            "date",
            "verse_text",
            "devotional_title",
            "biblical_treasure",
            "call_to_action",
            "audio_filename",
            "png_filename",
            "css_variant",
            "cover_image",
            "prev_next_navigation",
        ] {
            assert!(values.contains_key(key), "missing token {key}");
        }
        assert_eq!(values["audio_filename"], "2025-12-08.mp3");
        assert_eq!(values["png_filename"], "2025-12-08.png");
        assert_eq!(values["cover_image"], "devo-06.jpg");
    }

    #[test]
    fn test_copy_assets_copies_flat() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("images");
        std::fs::create_dir_all(assets.join("nested")).unwrap();
        std::fs::write(assets.join("devo-01.jpg"), b"a").unwrap();
        std::fs::write(assets.join("devo-02.jpg"), b"b").unwrap();
        std::fs::write(assets.join("nested/skipped.jpg"), b"c").unwrap();
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();

        let copied = copy_assets(&assets, &output).unwrap();
        assert_eq!(copied, 2);
        assert!(output.join("images/devo-01.jpg").is_file());
        assert!(output.join("images/devo-02.jpg").is_file());
        assert!(!output.join("images/skipped.jpg").exists());
    }

    #[test]
    fn test_copy_assets_missing_dir_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let copied = copy_assets(&dir.path().join("nope"), dir.path()).unwrap();
        assert_eq!(copied, 0);
    }

    #[test]
    fn test_write_index_skipped_without_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.build.output = dir.path().to_path_buf();
        config.build.index_template = dir.path().join("missing.html");

        write_index(&config, "[]").unwrap();
        assert!(!dir.path().join("index.html").exists());
    }

    #[test]
    fn test_write_index_embeds_json() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("index-template.html");
        std::fs::write(&template_path, "<script>const data = {{devotionals_data}};</script>")
            .unwrap();

        let mut config = SiteConfig::default();
        config.build.output = dir.path().to_path_buf();
        config.build.index_template = template_path;

        write_index(&config, r#"[{"dateSlug":"2025-12-08"}]"#).unwrap();
        let html = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(
            html,
            r#"<script>const data = [{"dateSlug":"2025-12-08"}];</script>"#
        );
    }

    #[test]
    fn test_render_document_writes_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.build.output = dir.path().to_path_buf();

        let p = post(
            "2025-12-08T10:00:00",
            "s",
            "https://x.com/2025/12/08/s/",
            "Título",
            "<blockquote>Dios es amor. 1 Juan 4:8 (NTV)</blockquote>",
        );
        let job = job_for(&p);
        let client = fetch::http_client().unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime
            .block_on(render_document(
                &config,
                &client,
                "{{verse_ref}}|{{css_variant}}|{{verse_text}}",
                &job,
            ))
            .unwrap();

        let html = std::fs::read_to_string(dir.path().join("2025-12-08.html")).unwrap();
        assert_eq!(html, "1 Juan 4:8 (NTV)|06|Dios es amor.");
    }

    #[test]
    fn test_build_two_documents_cross_linked() {
        let dir = tempfile::tempdir().unwrap();
        let posts = vec![
            post(
                "2025-12-08T10:00:00",
                "a",
                "https://x.com/2025/12/08/a/",
                "A",
                "<p>a</p>",
            ),
            post(
                "2025-12-09T10:00:00",
                "b",
                "https://x.com/2025/12/09/b/",
                "B",
                "<p>b</p>",
            ),
        ];
        let posts_path = dir.path().join("posts.json");
        std::fs::write(&posts_path, serialize_posts(&posts)).unwrap();

        let template_path = dir.path().join("template.html");
        std::fs::write(&template_path, "{{devotional_title}}{{prev_next_navigation}}").unwrap();

        let mut config = SiteConfig::default();
        config.source.url = posts_path.to_str().unwrap().to_string();
        config.build.template = template_path;
        config.build.output = dir.path().join("out");
        config.build.assets = dir.path().join("no-assets");
        config.build.index_template = dir.path().join("no-index.html");
        let config: &'static SiteConfig = Box::leak(Box::new(config));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(run_inner(config)).unwrap();

        let out = dir.path().join("out");
        let newest = std::fs::read_to_string(out.join("2025-12-09.html")).unwrap();
        let oldest = std::fs::read_to_string(out.join("2025-12-08.html")).unwrap();
        assert!(newest.contains(r#"<a class="nav-prev" href="2025-12-08.html">"#));
        assert!(!newest.contains("nav-next"));
        assert!(oldest.contains(r#"<a class="nav-next" href="2025-12-09.html">"#));
        assert!(!oldest.contains("nav-prev"));

        // Index artifact is ordered newest-first
        let json = std::fs::read_to_string(out.join("devocionales.json")).unwrap();
        let newer = json.find("2025-12-09").unwrap();
        let older = json.find("2025-12-08").unwrap();
        assert!(newer < older);
    }

    /// Posts in the wire shape, since `Post` only derives Deserialize.
    fn serialize_posts(posts: &[Post]) -> String {
        let items: Vec<String> = posts
            .iter()
            .map(|p| {
                format!(
                    r#"{{"id":{},"date":"{}","slug":"{}","link":"{}","title":{{"rendered":"{}"}},"content":{{"rendered":"{}"}}}}"#,
                    p.id,
                    p.date,
                    p.slug,
                    p.link,
                    p.title.rendered,
                    p.content.rendered.replace('"', "\\\"")
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }
}
