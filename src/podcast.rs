//! Podcast feed generation.
//!
//! The audio devotionals are a daily show: one episode per calendar day
//! from the configured start date through today, each pointing at
//! `{audio.server_url}{YYYY-MM-DD}.mp3`. The channel carries the iTunes
//! extensions podcast directories expect. The same episode records are
//! also written out as a JSON list.

use crate::{
    config::{PodcastConfig, SiteConfig},
    log,
    utils::date::DateTimeUtc,
};
use anyhow::{Context, Result, anyhow};
use rss::{
    ChannelBuilder, EnclosureBuilder, GuidBuilder, ItemBuilder,
    extension::{
        atom::{AtomExtension, Link},
        itunes::{
            ITunesCategory, ITunesCategoryBuilder, ITunesChannelExtension,
            ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder, ITunesOwnerBuilder,
        },
    },
    validation::Validate,
};
use serde::Serialize;
use std::{fs, path::Path};

/// Apple Podcasts category pairs for the channel.
const CATEGORIES: [(&str, &str); 2] = [
    ("Religion & Spirituality", "Christianity"),
    ("Education", "Self-Improvement"),
];

/// Announced duration of one episode. The files are never probed.
const EPISODE_DURATION: &str = "00:05:00";

/// One podcast episode, also serialized into `episodes-list.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Episode {
    /// "Devocional del lunes 8 de diciembre de 2025"
    title: String,
    description: String,
    /// `{date_slug}.mp3`, resolved against the audio server URL
    audio_file: String,
    /// RFC 2822 publication date
    pub_date: String,
    duration: String,
    /// Counts down so the newest episode is number 1
    episode_number: usize,
    /// Calendar year of the episode
    season: u16,
    explicit: String,
}

// ============================================================================
// Public API
// ============================================================================

/// Generate the feed XML and the episode list JSON.
pub fn generate(config: &SiteConfig) -> Result<()> {
    let start = DateTimeUtc::parse(&config.podcast.start_date).with_context(|| {
        format!("Invalid [podcast.start_date]: {}", config.podcast.start_date)
    })?;

    let episodes = daily_episodes(&config.podcast, start, DateTimeUtc::today());
    if episodes.is_empty() {
        log!("warn"; "[podcast.start_date] {} lies in the future, feed has no episodes",
            config.podcast.start_date);
    }

    let xml = feed_xml(config, &episodes)?;
    write_artifact(&config.podcast.path, &xml)?;

    let json = serde_json::to_string_pretty(&episodes)
        .context("Failed to serialize episode list")?;
    write_artifact(&config.podcast.episodes_list, &json)?;

    log!("rss"; "{} episodes through today", episodes.len());
    Ok(())
}

// ============================================================================
// Episodes
// ============================================================================

/// One episode per calendar day in `[from, to]`, oldest first.
fn daily_episodes(podcast: &PodcastConfig, from: DateTimeUtc, to: DateTimeUtc) -> Vec<Episode> {
    let mut days = Vec::new();
    let mut day = from;
    while day <= to {
        days.push(day);
        day = day.next_day();
    }

    let total = days.len();
    days.into_iter()
        .enumerate()
        .map(|(index, date)| Episode {
            title: format!("Devocional del {}", date.spanish_human()),
            description: format!(
                "Reflexión bíblica para el día {}. Únete a nosotros en esta \
                 meditación diaria de la Palabra de Dios.",
                date.spanish_human()
            ),
            audio_file: format!("{}.mp3", date.ymd_slug()),
            pub_date: date.to_rfc2822(),
            duration: EPISODE_DURATION.to_string(),
            episode_number: total - index,
            season: date.year,
            explicit: podcast.explicit.clone(),
        })
        .collect()
}

// ============================================================================
// Feed
// ============================================================================

/// Build, validate and serialize the feed document.
fn feed_xml(config: &SiteConfig, episodes: &[Episode]) -> Result<String> {
    let podcast = &config.podcast;
    let items: Vec<_> = episodes
        .iter()
        .map(|episode| episode_to_item(episode, &config.audio.server_url))
        .collect();

    let channel = ChannelBuilder::default()
        .title(&podcast.title)
        .link(&podcast.link)
        .description(&podcast.description)
        .language(podcast.language.clone())
        .copyright(copyright_line(&podcast.author, DateTimeUtc::today().year))
        .generator("devogen".to_string())
        .itunes_ext(channel_extension(podcast))
        .atom_ext(self_link(&podcast.link))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("rss validation failed: {e}"))?;
    Ok(channel.to_string())
}

/// Convert one episode record to a feed item.
fn episode_to_item(episode: &Episode, audio_base: &str) -> rss::Item {
    let url = format!("{audio_base}{}", episode.audio_file);

    let itunes = ITunesItemExtensionBuilder::default()
        .duration(episode.duration.clone())
        .explicit(episode.explicit.clone())
        .episode(episode.episode_number.to_string())
        .season(episode.season.to_string())
        .episode_type("full".to_string())
        .build();

    ItemBuilder::default()
        .title(episode.title.clone())
        .description(episode.description.clone())
        .pub_date(episode.pub_date.clone())
        .enclosure(
            // File sizes are unknown without probing the server, and the
            // length attribute must still be numeric.
            EnclosureBuilder::default()
                .url(&url)
                .mime_type("audio/mpeg")
                .length("0")
                .build(),
        )
        .guid(GuidBuilder::default().permalink(false).value(url).build())
        .itunes_ext(itunes)
        .build()
}

/// The channel-level iTunes tags.
fn channel_extension(podcast: &PodcastConfig) -> ITunesChannelExtension {
    let owner = ITunesOwnerBuilder::default()
        .name(podcast.author.clone())
        .email(podcast.email.clone())
        .build();

    ITunesChannelExtensionBuilder::default()
        .author(podcast.author.clone())
        .summary(podcast.description.clone())
        .owner(owner)
        .explicit(podcast.explicit.clone())
        .image(podcast.image_url.clone())
        .categories(itunes_categories())
        .build()
}

fn itunes_categories() -> Vec<ITunesCategory> {
    CATEGORIES
        .iter()
        .map(|(main, sub)| {
            ITunesCategoryBuilder::default()
                .text(*main)
                .subcategory(Box::new(ITunesCategoryBuilder::default().text(*sub).build()))
                .build()
        })
        .collect()
}

/// The self-referencing atom link feed validators ask for.
fn self_link(site: &str) -> AtomExtension {
    AtomExtension {
        links: vec![Link {
            href: format!("{}/podcast.xml", site.trim_end_matches('/')),
            rel: "self".into(),
            mime_type: Some("application/rss+xml".into()),
            ..Link::default()
        }],
    }
}

/// "© 2025 Cenfolic. Todos los derechos reservados."
fn copyright_line(author: &str, year: u16) -> String {
    format!("© {year} {author}. Todos los derechos reservados.")
}

// ============================================================================
// Helpers
// ============================================================================

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    log!("rss"; "{}", path.display());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
