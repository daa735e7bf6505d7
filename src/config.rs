//! Site configuration management.
//!
//! Handles loading, parsing, and validating the `devo.toml` configuration
//! file, plus the `DEVO_*` environment overrides kept for compatibility
//! with the older generator scripts. Precedence: defaults, then the TOML
//! file, then environment variables, then CLI flags.

use crate::cli::{Cli, Commands};
use crate::utils::date::DateTimeUtc;
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default values for serde deserialization
pub mod config_defaults {
    #[allow(unused)]
    pub fn r#true() -> bool {
        true
    }

    pub fn r#false() -> bool {
        false
    }

    pub mod source {
        pub fn url() -> String {
            "https://cenfolic.com/wordpress/wp-json/wp/v2/posts".into()
        }
    }

    pub mod build {
        use std::path::PathBuf;

        pub fn template() -> PathBuf {
            "devocional-template_placeholders.html".into()
        }
        pub fn output() -> PathBuf {
            "output".into()
        }
        pub fn assets() -> PathBuf {
            "images".into()
        }
        pub fn index_template() -> PathBuf {
            "devocional-index_placeholders.html".into()
        }
    }

    pub mod image {
        pub fn width() -> u32 {
            1920
        }
        pub fn command() -> Vec<String> {
            vec!["chromium".into()]
        }
    }

    pub mod audio {
        pub fn server_url() -> String {
            "https://cenfolic.com/audio/devo/".into()
        }
    }

    pub mod serve {
        pub fn interface() -> String {
            "127.0.0.1".into()
        }
        pub fn port() -> u16 {
            3000
        }
    }

    pub mod podcast {
        use std::path::PathBuf;

        pub fn title() -> String {
            "Devocionales Diarios - Cenfolic".into()
        }
        pub fn description() -> String {
            "Reflexiones bíblicas diarias para fortalecer tu fe y caminar \
             con Dios cada día. Meditaciones inspiradoras basadas en la \
             Palabra de Dios."
                .into()
        }
        pub fn link() -> String {
            "https://cenfolic.com".into()
        }
        pub fn language() -> String {
            "es-ES".into()
        }
        pub fn author() -> String {
            "Cenfolic".into()
        }
        pub fn email() -> String {
            "podcast@cenfolic.com".into()
        }
        pub fn image_url() -> String {
            "https://cenfolic.com/images/podcast-cover.jpg".into()
        }
        pub fn explicit() -> String {
            "no".into()
        }
        pub fn start_date() -> String {
            "2025-12-08".into()
        }
        pub fn path() -> PathBuf {
            "podcast.xml".into()
        }
        pub fn episodes_list() -> PathBuf {
            "episodes-list.json".into()
        }
    }
}

/// `[source]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Posts endpoint or local JSON file path
    #[serde(default = "config_defaults::source::url")]
    #[educe(Default = config_defaults::source::url())]
    pub url: String,
}

#[test]
fn validate_source_config() {
    let config = r#"
        [source]
        url = "posts.json"
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert_eq!(config.source.url, "posts.json");
}

#[test]
fn test_source_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert_eq!(
        config.source.url,
        "https://cenfolic.com/wordpress/wp-json/wp/v2/posts"
    );
}

#[test]
fn test_build_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert_eq!(
        config.build.template,
        PathBuf::from("devocional-template_placeholders.html")
    );
    assert_eq!(config.build.output, PathBuf::from("output"));
    assert_eq!(config.build.assets, PathBuf::from("images"));
    assert_eq!(
        config.build.index_template,
        PathBuf::from("devocional-index_placeholders.html")
    );
}

#[test]
fn test_build_config_custom() {
    let config = r#"
        [build]
        template = "mi-plantilla.html"
        output = "public"
        assets = "img"
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert_eq!(config.build.template, PathBuf::from("mi-plantilla.html"));
    assert_eq!(config.build.output, PathBuf::from("public"));
    assert_eq!(config.build.assets, PathBuf::from("img"));
}

#[test]
fn test_image_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert!(!config.image.enable);
    assert_eq!(config.image.width, 1920);
    assert_eq!(config.image.command, vec!["chromium".to_string()]);
}

#[test]
fn test_image_config_custom_command() {
    let config = r#"
        [image]
        enable = true
        width = 1280
        command = ["chromium-browser", "--no-sandbox"]
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert!(config.image.enable);
    assert_eq!(config.image.width, 1280);
    assert_eq!(
        config.image.command,
        vec!["chromium-browser".to_string(), "--no-sandbox".to_string()]
    );
}

#[test]
fn test_audio_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert!(!config.audio.download);
    assert_eq!(config.audio.server_url, "https://cenfolic.com/audio/devo/");
}

#[test]
fn test_serve_config() {
    let config = r#"
        [serve]
        interface = "0.0.0.0"
        port = 8080
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert_eq!(config.serve.interface, "0.0.0.0");
    assert_eq!(config.serve.port, 8080);
}

#[test]
fn test_serve_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert_eq!(config.serve.interface, "127.0.0.1");
    assert_eq!(config.serve.port, 3000);
}

#[test]
fn test_podcast_config_defaults() {
    let config: SiteConfig = toml::from_str("").unwrap();

    assert_eq!(config.podcast.title, "Devocionales Diarios - Cenfolic");
    assert_eq!(config.podcast.link, "https://cenfolic.com");
    assert_eq!(config.podcast.language, "es-ES");
    assert_eq!(config.podcast.author, "Cenfolic");
    assert_eq!(config.podcast.email, "podcast@cenfolic.com");
    assert_eq!(config.podcast.explicit, "no");
    assert_eq!(config.podcast.start_date, "2025-12-08");
    assert_eq!(config.podcast.path, PathBuf::from("podcast.xml"));
    assert_eq!(
        config.podcast.episodes_list,
        PathBuf::from("episodes-list.json")
    );
}

#[test]
fn test_podcast_config_custom() {
    let config = r#"
        [podcast]
        title = "Mi Podcast"
        start_date = "2026-01-01"
        path = "feed.xml"
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert_eq!(config.podcast.title, "Mi Podcast");
    assert_eq!(config.podcast.start_date, "2026-01-01");
    assert_eq!(config.podcast.path, PathBuf::from("feed.xml"));
    // Untouched fields keep their defaults
    assert_eq!(config.podcast.author, "Cenfolic");
}

#[test]
fn test_extra_fields() {
    let config = r#"
        [extra]
        custom_field = "custom_value"
        number_field = 42
    "#;
    let config: SiteConfig = toml::from_str(config).unwrap();

    assert_eq!(
        config.extra.get("custom_field").and_then(|v| v.as_str()),
        Some("custom_value")
    );
    assert_eq!(
        config.extra.get("number_field").and_then(|v| v.as_integer()),
        Some(42)
    );
}

#[test]
fn test_unknown_field_rejection_in_source() {
    let config = r#"
        [source]
        url = "posts.json"
        unknown_field = "should_fail"
    "#;
    let result: Result<SiteConfig, _> = toml::from_str(config);

    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("unknown field"));
}

#[test]
fn test_unknown_field_rejection_in_build() {
    let config = r#"
        [build]
        unknown_field = "should_fail"
    "#;
    let result: Result<SiteConfig, _> = toml::from_str(config);

    assert!(result.is_err());
}

#[test]
fn test_unknown_field_rejection_in_podcast() {
    let config = r#"
        [podcast]
        unknown_field = "should_fail"
    "#;
    let result: Result<SiteConfig, _> = toml::from_str(config);

    assert!(result.is_err());
}

#[test]
fn test_from_str() {
    let config_str = r#"
        [source]
        url = "local.json"

        [audio]
        download = true
    "#;
    let result = SiteConfig::from_str(config_str);

    assert!(result.is_ok());
    let config = result.unwrap();
    assert_eq!(config.source.url, "local.json");
    assert!(config.audio.download);
}

#[test]
fn test_from_str_invalid_toml() {
    let invalid_config = r#"
        [source
        url = "local.json"
    "#;
    let result = SiteConfig::from_str(invalid_config);

    assert!(result.is_err());
}

#[test]
fn test_env_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DEVO_JSON_SOURCE", "env.json"),
        ("DEVO_TEMPLATE_PATH", "env-template.html"),
        ("DEVO_OUTPUT_DIR", "env-out"),
        ("DEVO_GENERATE_IMAGES", "true"),
        ("DEVO_IMAGE_WIDTH", "1024"),
        ("DEVO_AUDIO_SERVER_URL", "https://example.com/audio/"),
        ("DEVO_DOWNLOAD_AUDIO", "1"),
    ]);

    let mut config = SiteConfig::default();
    config.apply_env(|key| vars.get(key).map(|v| (*v).to_string()));

    assert_eq!(config.source.url, "env.json");
    assert_eq!(config.build.template, PathBuf::from("env-template.html"));
    assert_eq!(config.build.output, PathBuf::from("env-out"));
    assert!(config.image.enable);
    assert_eq!(config.image.width, 1024);
    assert_eq!(config.audio.server_url, "https://example.com/audio/");
    assert!(config.audio.download);
}

#[test]
fn test_env_ignores_unparseable_values() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DEVO_GENERATE_IMAGES", "yes please"),
        ("DEVO_IMAGE_WIDTH", "wide"),
    ]);

    let mut config = SiteConfig::default();
    config.apply_env(|key| vars.get(key).map(|v| (*v).to_string()));

    assert!(!config.image.enable);
    assert_eq!(config.image.width, 1920);
}

#[test]
fn test_env_absent_keeps_file_values() {
    let mut config = SiteConfig::from_str(
        r#"
        [source]
        url = "file.json"
    "#,
    )
    .unwrap();
    config.apply_env(|_| None);

    assert_eq!(config.source.url, "file.json");
}

#[test]
fn test_update_with_cli_overrides() {
    use clap::Parser;

    let cli: &'static Cli = Box::leak(Box::new(
        Cli::try_parse_from([
            "devogen", "--source", "cli.json", "build", "--images", "--width", "1280",
        ])
        .unwrap(),
    ));
    let mut config = SiteConfig::default();
    config.update_with_cli(cli);

    assert_eq!(config.source.url, "cli.json");
    assert!(config.image.enable);
    assert_eq!(config.image.width, 1280);
    assert!(!config.audio.download);
}

#[test]
fn test_layering_file_env_cli() {
    use clap::Parser;

    // defaults < TOML < env < CLI, each layer only touching what it sets
    let mut config = SiteConfig::from_str(
        r#"
        [source]
        url = "file.json"

        [build]
        output = "file-out"

        [image]
        width = 800
    "#,
    )
    .unwrap();

    let vars: HashMap<&str, &str> =
        HashMap::from([("DEVO_JSON_SOURCE", "env.json"), ("DEVO_IMAGE_WIDTH", "900")]);
    config.apply_env(|key| vars.get(key).map(|v| (*v).to_string()));

    let cli: &'static Cli = Box::leak(Box::new(
        Cli::try_parse_from(["devogen", "--source", "cli.json", "build"]).unwrap(),
    ));
    config.update_with_cli(cli);

    assert_eq!(config.source.url, "cli.json"); // CLI wins
    assert_eq!(config.image.width, 900); // env wins over file
    assert_eq!(config.build.output, PathBuf::from("file-out")); // file wins over default
    assert_eq!(config.serve.port, 3000); // untouched default
}

#[test]
fn test_config_error_display() {
    let io_err = ConfigError::Io(
        PathBuf::from("devo.toml"),
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
    );
    let display = format!("{}", io_err);
    assert!(display.contains("IO error"));
    assert!(display.contains("devo.toml"));

    let validation_err = ConfigError::Validation("Test validation error".to_string());
    let display = format!("{}", validation_err);
    assert!(display.contains("Test validation error"));
}

/// `[build]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Page template with `{{token}}` placeholders
    #[serde(default = "config_defaults::build::template")]
    #[educe(Default = config_defaults::build::template())]
    pub template: PathBuf,

    /// Output directory for generated pages
    #[serde(default = "config_defaults::build::output")]
    #[educe(Default = config_defaults::build::output())]
    pub output: PathBuf,

    /// Static assets directory, copied into the output as `images/`
    #[serde(default = "config_defaults::build::assets")]
    #[educe(Default = config_defaults::build::assets())]
    pub assets: PathBuf,

    /// Aggregate index page template. Skipped silently when the file
    /// does not exist.
    #[serde(default = "config_defaults::build::index_template")]
    #[educe(Default = config_defaults::build::index_template())]
    pub index_template: PathBuf,
}

/// `[image]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// Capture a PNG of each rendered page
    #[serde(default = "config_defaults::r#false")]
    #[educe(Default = config_defaults::r#false())]
    pub enable: bool,

    /// Viewport width in pixels for the capture
    #[serde(default = "config_defaults::image::width")]
    #[educe(Default = config_defaults::image::width())]
    pub width: u32,

    /// Headless browser command and leading arguments
    #[serde(default = "config_defaults::image::command")]
    #[educe(Default = config_defaults::image::command())]
    pub command: Vec<String>,
}

/// `[audio]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct AudioConfig {
    /// Download each devotional's MP3 next to its page
    #[serde(default = "config_defaults::r#false")]
    #[educe(Default = false)]
    pub download: bool,

    /// Base URL where the MP3 files live, e.g.
    /// "https://cenfolic.com/audio/devo/"
    #[serde(default = "config_defaults::audio::server_url")]
    #[educe(Default = config_defaults::audio::server_url())]
    pub server_url: String,
}

/// `[serve]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind (e.g.: "127.0.0.1", "0.0.0.0")
    #[serde(default = "config_defaults::serve::interface")]
    #[educe(Default = config_defaults::serve::interface())]
    pub interface: String,

    /// Port number to listen on
    #[serde(default = "config_defaults::serve::port")]
    #[educe(Default = config_defaults::serve::port())]
    pub port: u16,
}

/// `[podcast]` section in devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PodcastConfig {
    /// Channel title
    #[serde(default = "config_defaults::podcast::title")]
    #[educe(Default = config_defaults::podcast::title())]
    pub title: String,

    /// Channel description, also used as the iTunes summary
    #[serde(default = "config_defaults::podcast::description")]
    #[educe(Default = config_defaults::podcast::description())]
    pub description: String,

    /// Public site URL the feed points back to
    #[serde(default = "config_defaults::podcast::link")]
    #[educe(Default = config_defaults::podcast::link())]
    pub link: String,

    /// Feed language code
    #[serde(default = "config_defaults::podcast::language")]
    #[educe(Default = config_defaults::podcast::language())]
    pub language: String,

    /// Author shown in podcast directories
    #[serde(default = "config_defaults::podcast::author")]
    #[educe(Default = config_defaults::podcast::author())]
    pub author: String,

    /// Owner contact email
    #[serde(default = "config_defaults::podcast::email")]
    #[educe(Default = config_defaults::podcast::email())]
    pub email: String,

    /// Cover art URL (1400x1400 to 3000x3000 px)
    #[serde(default = "config_defaults::podcast::image_url")]
    #[educe(Default = config_defaults::podcast::image_url())]
    pub image_url: String,

    /// iTunes explicit flag: "yes", "no" or "clean"
    #[serde(default = "config_defaults::podcast::explicit")]
    #[educe(Default = config_defaults::podcast::explicit())]
    pub explicit: String,

    /// First episode date, `YYYY-MM-DD`. One episode per day from here
    /// through today.
    #[serde(default = "config_defaults::podcast::start_date")]
    #[educe(Default = config_defaults::podcast::start_date())]
    pub start_date: String,

    /// Output path for the RSS XML
    #[serde(default = "config_defaults::podcast::path")]
    #[educe(Default = config_defaults::podcast::path())]
    pub path: PathBuf,

    /// Output path for the episode list JSON
    #[serde(default = "config_defaults::podcast::episodes_list")]
    #[educe(Default = config_defaults::podcast::episodes_list())]
    pub episodes_list: PathBuf,
}

/// Root configuration structure representing devo.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Posts source
    #[serde(default)]
    pub source: SourceConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// PNG capture settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Audio download settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Podcast feed settings
    #[serde(default)]
    pub podcast: PodcastConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: HashMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get CLI arguments reference
    pub fn get_cli(&self) -> &'static Cli {
        self.cli.unwrap()
    }

    /// Apply the `DEVO_*` environment overrides.
    pub fn update_with_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Overrides from a key lookup, separated from the process
    /// environment so it can be tested.
    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("DEVO_JSON_SOURCE") {
            self.source.url = url;
        }
        if let Some(path) = get("DEVO_TEMPLATE_PATH") {
            self.build.template = path.into();
        }
        if let Some(dir) = get("DEVO_OUTPUT_DIR") {
            self.build.output = dir.into();
        }
        if let Some(value) = get("DEVO_GENERATE_IMAGES")
            && let Some(enable) = parse_env_bool(&value)
        {
            self.image.enable = enable;
        }
        if let Some(value) = get("DEVO_IMAGE_WIDTH")
            && let Ok(width) = value.parse()
        {
            self.image.width = width;
        }
        if let Some(url) = get("DEVO_AUDIO_SERVER_URL") {
            self.audio.server_url = url;
        }
        if let Some(value) = get("DEVO_DOWNLOAD_AUDIO")
            && let Some(download) = parse_env_bool(&value)
        {
            self.audio.download = download;
        }
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        Self::update_option(&mut self.source.url, cli.source.as_ref());
        Self::update_option(&mut self.build.template, cli.template.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        match &cli.command {
            Commands::Build {
                images,
                audio,
                width,
            } => {
                Self::update_option(&mut self.image.enable, images.as_ref());
                Self::update_option(&mut self.audio.download, audio.as_ref());
                Self::update_option(&mut self.image.width, width.as_ref());
            }
            Commands::Serve { interface, port } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
            _ => {}
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        let cli = self.get_cli();

        if self.source.url.is_empty() {
            bail!(ConfigError::Validation(
                "[source.url] must not be empty".into()
            ));
        }

        if !self.audio.server_url.starts_with("http") {
            bail!(ConfigError::Validation(
                "[audio.server_url] must start with http:// or https://".into()
            ));
        }

        if self.image.enable {
            Self::check_command_installed("[image.command]", &self.image.command)?;

            if self.image.width == 0 {
                bail!(ConfigError::Validation(
                    "[image.width] must be greater than zero".into()
                ));
            }
        }

        match &cli.command {
            Commands::Rss | Commands::All => {
                if DateTimeUtc::parse(&self.podcast.start_date).is_none() {
                    bail!(ConfigError::Validation(
                        "[podcast.start_date] must be a YYYY-MM-DD date".into()
                    ));
                }
                if !self.podcast.link.starts_with("http") {
                    bail!(ConfigError::Validation(
                        "[podcast.link] must start with http:// or https://".into()
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        if command.is_empty() {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        }

        let cmd = &command[0];
        which::which(cmd)
            .map_err(|_| ConfigError::Validation(format!("`{cmd}` not found in PATH")))?;

        Ok(())
    }
}

/// The older scripts accepted only literal `true`, this also takes `1`/`0`.
fn parse_env_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[test]
fn test_parse_env_bool() {
    assert_eq!(parse_env_bool("true"), Some(true));
    assert_eq!(parse_env_bool("1"), Some(true));
    assert_eq!(parse_env_bool("false"), Some(false));
    assert_eq!(parse_env_bool("0"), Some(false));
    assert_eq!(parse_env_bool("TRUE"), None);
    assert_eq!(parse_env_bool(""), None);
}
