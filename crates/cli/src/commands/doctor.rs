//! Doctor command - validate configuration and show status

use anyhow::{Result, bail};
use feed_herald_adapters::feed::HttpFeedSource;
use feed_herald_adapters::forum::{LemmyClient, LemmyConfig};
use feed_herald_adapters::state::SqliteStore;
use feed_herald_domain::{FeedSource, ForumClient, PostLedger, derive_allow_list};
use secrecy::SecretString;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    password: CheckResult,
    state: CheckResult,
    feeds: CheckResult,
    forums: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }

    fn is_warn(&self) -> bool {
        self.status == "warn"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        password: CheckResult::error("Not checked"),
        state: CheckResult::error("Not checked"),
        feeds: CheckResult::error("Not checked"),
        forums: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => {
            report.config = CheckResult::ok(format!(
                "{} feeds, {} forums",
                config.feeds.len(),
                config.forums.len()
            ));
            config
        }
        Err(e) => {
            report.config = CheckResult::error(e.to_string());
            return finish(args, report);
        }
    };

    let password = match std::env::var(&config.bot.password_env) {
        Ok(value) if !value.trim().is_empty() => {
            report.password = CheckResult::ok(format!("{} is set", config.bot.password_env));
            Some(SecretString::from(value))
        }
        _ => {
            report.password =
                CheckResult::warn(format!("{} is not set", config.bot.password_env));
            None
        }
    };

    report.state = match SqliteStore::new(&config.general.state_db_path).await {
        Ok(store) => match store.count().await {
            Ok(count) => CheckResult::ok(format!("{count} posts in ledger")),
            Err(e) => CheckResult::error(e.to_string()),
        },
        Err(e) => CheckResult::error(e.to_string()),
    };

    report.feeds = check_feeds(&config).await;
    report.forums = match password {
        Some(password) => check_forums(&config, password).await,
        None => CheckResult::warn("Skipped (no password)"),
    };

    report.overall = if [
        &report.config,
        &report.password,
        &report.state,
        &report.feeds,
        &report.forums,
    ]
    .iter()
    .any(|check| check.is_error())
    {
        "error".to_string()
    } else if [&report.password, &report.feeds, &report.forums]
        .iter()
        .any(|check| check.is_warn())
    {
        "warn".to_string()
    } else {
        "ok".to_string()
    };

    finish(args, report)
}

async fn check_feeds(config: &AppConfig) -> CheckResult {
    let source = HttpFeedSource::default();
    let mut failures = Vec::new();

    for feed in &config.feeds {
        if let Err(e) = source.fetch(&feed.url).await {
            failures.push(format!("{}: {}", feed.name, e));
        }
    }

    if failures.is_empty() {
        CheckResult::ok(format!("{} feeds reachable", config.feeds.len()))
    } else {
        CheckResult::warn(failures.join("; "))
    }
}

async fn check_forums(config: &AppConfig, password: SecretString) -> CheckResult {
    let mappings: Vec<_> = config.forums.iter().map(|f| f.to_mapping()).collect();
    let client = LemmyClient::new(LemmyConfig {
        instance: config.bot.instance.clone(),
        username: config.bot.username.clone(),
        password,
        allow_list: derive_allow_list(&mappings),
    });

    let mut failures = Vec::new();
    for mapping in &mappings {
        if let Err(e) = client.resolve_forum(&mapping.slug, &mapping.instance).await {
            failures.push(format!("{}@{}: {}", mapping.slug, mapping.instance, e));
        }
    }

    if failures.is_empty() {
        CheckResult::ok(format!("{} forums resolved", mappings.len()))
    } else {
        CheckResult::warn(failures.join("; "))
    }
}

fn finish(args: DoctorArgs, report: DoctorReport) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_check("config", &report.config);
        print_check("password", &report.password);
        print_check("state", &report.state);
        print_check("feeds", &report.feeds);
        print_check("forums", &report.forums);
        println!("overall: {}", report.overall);
    }

    if report.overall == "error" {
        bail!("Doctor found problems");
    }
    Ok(())
}

fn print_check(name: &str, check: &CheckResult) {
    println!("{:<10} [{}] {}", name, check.status, check.message);
}
