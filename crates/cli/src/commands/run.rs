//! Run command - the publish, maintenance, and subscription loops

use anyhow::{Context, Result, bail};
use feed_herald_adapters::feed::HttpFeedSource;
use feed_herald_adapters::forum::{LemmyClient, LemmyConfig};
use feed_herald_adapters::state::SqliteStore;
use feed_herald_domain::usecases::{
    FeatureOnPublish, MaintenanceConfig, PinMaintenance, PublishConfig, PublishTask,
};
use feed_herald_domain::{
    FeedSpec, ForumMapping, PostLedger, PostStream, SystemClock, derive_allow_list,
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::config::AppConfig;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    config.validate()?;

    let dry_run = args.dry_run || config.general.dry_run;

    tracing::info!(
        dry_run,
        once = args.once,
        feeds = config.feeds.len(),
        forums = config.forums.len(),
        instance = %config.bot.instance,
        "Starting feed-herald"
    );

    let store = Arc::new(
        SqliteStore::new(&config.general.state_db_path)
            .await
            .context("Failed to initialize SQLite state store")?,
    );

    let published = store
        .count()
        .await
        .context("Failed to read the post ledger")?;
    tracing::info!(posts = published, "Loaded post ledger");

    // In dry-run no forum call is ever issued, so no credential is needed.
    let password = if dry_run {
        SecretString::from(String::new())
    } else {
        load_password(&config.bot.password_env)?
    };

    let feeds: Vec<FeedSpec> = config.feeds.iter().map(|f| f.to_spec()).collect();
    let forums: Vec<ForumMapping> = config.forums.iter().map(|f| f.to_mapping()).collect();
    let allow_list = derive_allow_list(&forums);

    let forum_client = Arc::new(LemmyClient::new(LemmyConfig {
        instance: config.bot.instance.clone(),
        username: config.bot.username.clone(),
        password,
        allow_list,
    }));
    let feed_source = Arc::new(HttpFeedSource::default());
    let clock = Arc::new(SystemClock);

    let publish = Arc::new(PublishTask::new(
        feed_source,
        Arc::clone(&store),
        Arc::clone(&forum_client),
        PublishConfig {
            feeds,
            forums,
            dry_run,
        },
    ));

    let maintenance = Arc::new(PinMaintenance::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&forum_client),
        clock,
        MaintenanceConfig {
            day_skew: time::Duration::minutes(config.schedule.day_skew_minutes),
            dry_run,
        },
    ));

    let reaction = Arc::new(FeatureOnPublish::new(
        Arc::clone(&store),
        Arc::clone(&forum_client),
        config.bot.username.clone(),
    ));

    if args.once {
        tracing::info!("Running single publish and maintenance ticks");
        let created = publish.tick().await;
        tracing::info!(created, "Publish tick complete");
        match maintenance.tick().await {
            Ok(crossed) => tracing::info!(day_changed = crossed, "Maintenance tick complete"),
            Err(e) => tracing::error!(error = %e, "Maintenance tick failed"),
        }
        return Ok(());
    }

    // Three independent tasks sharing the store through the port contracts;
    // a slow feed fetch or a failing poll never stalls the other timers.
    let publish_loop = tokio::spawn({
        let publish = Arc::clone(&publish);
        let period = Duration::from_secs(config.schedule.publish_interval_secs);
        async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let created = publish.tick().await;
                if created > 0 {
                    tracing::info!(created, "Publish tick complete");
                }
            }
        }
    });

    let maintenance_loop = tokio::spawn({
        let maintenance = Arc::clone(&maintenance);
        let period = Duration::from_secs(config.schedule.maintenance_interval_secs);
        async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = maintenance.tick().await {
                    tracing::error!(error = %e, "Maintenance tick failed");
                }
            }
        }
    });

    let subscription_loop = tokio::spawn({
        let reaction = Arc::clone(&reaction);
        let forum_client = Arc::clone(&forum_client);
        let period = Duration::from_secs(config.schedule.subscription_interval_secs);
        let enabled = !dry_run;
        async move {
            if !enabled {
                // Nothing to pin when nothing is posted.
                return;
            }
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                match forum_client.poll_new_posts().await {
                    Ok(posts) => {
                        for post in posts {
                            if let Err(e) = reaction.handle(&post).await {
                                tracing::error!(
                                    post_id = %post.post_id,
                                    error = %e,
                                    "Failed to handle observed post"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to poll subscribed posts");
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;
    tracing::info!("Shutdown signal received");

    publish_loop.abort();
    maintenance_loop.abort();
    subscription_loop.abort();

    tracing::info!("feed-herald stopped");
    Ok(())
}

fn load_password(env_var: &str) -> Result<SecretString> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => bail!("Environment variable {env_var} is not set"),
    }
}
