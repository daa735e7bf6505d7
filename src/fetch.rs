//! Retrieval of devotional posts from the wordpress REST API or a local file.
//!
//! The source is a single string: anything starting with `http://` or
//! `https://` is fetched over the network, everything else is treated as a
//! path to a JSON file on disk. Both forms must contain a JSON array of
//! posts in the wordpress `wp/v2/posts` shape.

use crate::log;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// A single post as returned by the wordpress REST API.
///
/// Only the fields the generator consumes are deserialized, everything
/// else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    /// Publication timestamp in the site's local time, e.g. `2025-12-08T10:00:00`.
    /// Wordpress omits the timezone suffix.
    pub date: String,
    pub slug: String,
    /// Permalink, e.g. `https://example.com/2025/12/08/title/`.
    pub link: String,
    pub title: Rendered,
    pub content: Rendered,
}

/// Wordpress wraps rendered fields in `{ "rendered": "..." }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Rendered {
    pub rendered: String,
}

/// Build the HTTP client used for API calls and audio downloads.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("devogen/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the list of posts from `source`.
///
/// `source` is either a URL or a local file path. Network and parse
/// failures are fatal here, the caller decides what to do with an empty
/// post list.
pub async fn fetch_posts(client: &reqwest::Client, source: &str) -> Result<Vec<Post>> {
    if is_url(source) {
        log!("fetch"; "requesting posts from {source}");
        let response = client
            .get(source)
            .send()
            .await
            .with_context(|| format!("Failed to request {source}"))?
            .error_for_status()
            .with_context(|| format!("Request to {source} failed"))?;
        response
            .json::<Vec<Post>>()
            .await
            .with_context(|| format!("Failed to parse JSON from {source}"))
    } else {
        log!("fetch"; "reading posts from {source}");
        let content = tokio::fs::read_to_string(Path::new(source))
            .await
            .with_context(|| format!("Failed to read {source}"))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {source}"))
    }
}

/// Whether the configured source points at the network rather than disk.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const POSTS_JSON: &str = r#"[
        {
            "id": 4181,
            "date": "2025-12-08T10:00:00",
            "date_gmt": "2025-12-08T15:00:00",
            "slug": "la-bendicion-de-la-afliccion",
            "status": "publish",
            "link": "https://cenfolic.com/wordpress/2025/12/08/la-bendicion-de-la-afliccion/",
            "title": { "rendered": "La bendición de la aflicción" },
            "content": { "rendered": "<p>cuerpo</p>", "protected": false }
        }
    ]"#;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://cenfolic.com/wordpress/wp-json/wp/v2/posts"));
        assert!(is_url("http://localhost:8080/posts.json"));
        assert!(!is_url("devocionales.json"));
        assert!(!is_url("./data/posts.json"));
        assert!(!is_url("/var/data/posts.json"));
    }

    #[test]
    fn test_post_deserializes_known_fields() {
        let posts: Vec<Post> = serde_json::from_str(POSTS_JSON).unwrap();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.id, 4181);
        assert_eq!(post.date, "2025-12-08T10:00:00");
        assert_eq!(post.slug, "la-bendicion-de-la-afliccion");
        assert_eq!(post.title.rendered, "La bendición de la aflicción");
        assert_eq!(post.content.rendered, "<p>cuerpo</p>");
    }

    #[test]
    fn test_post_ignores_unknown_fields() {
        // The API returns far more fields than we model. Extra keys at any
        // level must not break deserialization.
        let json = r#"{
            "id": 1,
            "date": "2025-12-09T10:00:00",
            "slug": "s",
            "link": "https://example.com/2025/12/09/s/",
            "title": { "rendered": "t", "raw": "t" },
            "content": { "rendered": "c", "protected": true },
            "excerpt": { "rendered": "e" },
            "_links": {}
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, 1);
        assert_eq!(post.title.rendered, "t");
    }

    #[test]
    fn test_fetch_posts_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(POSTS_JSON.as_bytes()).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let posts = runtime
            .block_on(async {
                let client = http_client().unwrap();
                fetch_posts(&client, path.to_str().unwrap()).await
            })
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].slug, "la-bendicion-de-la-afliccion");
    }

    #[test]
    fn test_fetch_posts_missing_file_is_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(async {
            let client = http_client().unwrap();
            fetch_posts(&client, "definitely/not/here.json").await
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_posts_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(async {
            let client = http_client().unwrap();
            fetch_posts(&client, path.to_str().unwrap()).await
        });
        assert!(result.is_err());
    }
}
