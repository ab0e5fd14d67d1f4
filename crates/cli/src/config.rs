//! Configuration loading and management

use anyhow::{Context, Result, bail};
use feed_herald_domain::{ContentField, FeedSpec, ForumMapping, PinRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    #[serde(default)]
    pub forums: Vec<ForumConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Home instance host, e.g. "programming.dev"
    #[serde(default)]
    pub instance: String,

    /// Bot account name; also the creator guard for the pin reaction
    #[serde(default)]
    pub username: String,

    /// Environment variable holding the account password
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,

    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,

    #[serde(default = "default_subscription_interval")]
    pub subscription_interval_secs: u64,

    /// Forward shift applied before computing the effective day
    #[serde(default = "default_day_skew")]
    pub day_skew_minutes: i64,
}

/// One polled feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,

    /// Categories granting a pin window, in declaration order
    #[serde(default)]
    pub pin_categories: Vec<PinCategoryConfig>,

    /// Body field selection: "full" or "summary"
    #[serde(default)]
    pub content: ContentField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinCategoryConfig {
    pub name: String,
    pub days: i64,
}

/// One target forum and the feeds routed into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    pub slug: String,
    pub instance: String,
    pub feeds: Vec<String>,
}

impl FeedConfig {
    pub fn to_spec(&self) -> FeedSpec {
        FeedSpec {
            name: self.name.clone(),
            url: self.url.clone(),
            pin_rules: self
                .pin_categories
                .iter()
                .map(|rule| PinRule {
                    category: rule.name.clone(),
                    days: rule.days,
                })
                .collect(),
            content: self.content,
        }
    }
}

impl ForumConfig {
    pub fn to_mapping(&self) -> ForumMapping {
        ForumMapping {
            slug: self.slug.clone(),
            instance: self.instance.clone(),
            feeds: self.feeds.clone(),
        }
    }
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./feed-herald.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_password_env() -> String {
    "FEED_HERALD_PASSWORD".to_string()
}

fn default_publish_interval() -> u64 {
    600
}

fn default_maintenance_interval() -> u64 {
    300
}

fn default_subscription_interval() -> u64 {
    60
}

fn default_day_skew() -> i64 {
    30
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            username: String::new(),
            password_env: default_password_env(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: default_publish_interval(),
            maintenance_interval_secs: default_maintenance_interval(),
            subscription_interval_secs: default_subscription_interval(),
            day_skew_minutes: default_day_skew(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("FEED_HERALD")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Cross-field sanity checks shared by `run` and `doctor`.
    pub fn validate(&self) -> Result<()> {
        if self.bot.instance.trim().is_empty() {
            bail!("bot.instance is not set");
        }
        if self.bot.username.trim().is_empty() {
            bail!("bot.username is not set");
        }
        if self.feeds.is_empty() {
            bail!("no feeds configured");
        }
        for feed in &self.feeds {
            if feed.pin_categories.iter().any(|rule| rule.days < 0) {
                bail!("feed '{}' has a negative pin window", feed.name);
            }
        }
        for forum in &self.forums {
            for name in &forum.feeds {
                if !self.feeds.iter().any(|feed| &feed.name == name) {
                    bail!(
                        "forum '{}@{}' references unknown feed '{}'",
                        forum.slug,
                        forum.instance,
                        name
                    );
                }
            }
        }
        Ok(())
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# feed-herald configuration

[general]
state_db_path = "./feed-herald.sqlite"
log_level = "info"
dry_run = false

[bot]
instance = "programming.dev"
username = "feed_herald"
# The password is read from this environment variable, never from the file.
password_env = "FEED_HERALD_PASSWORD"

[schedule]
publish_interval_secs = 600
maintenance_interval_secs = 300
subscription_interval_secs = 60
day_skew_minutes = 30

[[feeds]]
name = "godot"
url = "https://godotengine.org/rss.xml"
pin_categories = [
    { name = "Release", days = 7 },
    { name = "Pre-Release", days = 7 },
]

[[feeds]]
name = "unreal"
url = "https://www.unrealengine.com/en-US/rss"
content = "summary"

[[feeds]]
name = "unity"
url = "https://blogs.unity3d.com/feed/"

[[forums]]
slug = "godot"
instance = "programming.dev"
feeds = ["godot"]

[[forums]]
slug = "unreal_engine"
instance = "programming.dev"
feeds = ["unreal"]
"#
        .to_string()
    }
}
