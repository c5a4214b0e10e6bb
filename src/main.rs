//! bili-push: binary entrypoint.
//! Loads the config, starts the push scheduler and serves OneBot event reports.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bili_push::api::{self, AppState};
use bili_push::config::{self, watch};
use bili_push::feed::BiliClient;
use bili_push::format::BiliFormatter;
use bili_push::interact::{DirectReplier, InteractSettings};
use bili_push::metrics::Metrics;
use bili_push::push::PushEngine;
use bili_push::transport::onebot::OneBotClient;

pub const ENV_LOG_FORMAT: &str = "BILIPUSH_LOG_FORMAT";

/// RUST_LOG filter (default `bili_push=info,warn`); JSON lines when
/// BILIPUSH_LOG_FORMAT=json, compact text otherwise.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bili_push=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let (cfg, path) = config::load_default()?;
    info!(path = %path.display(), "config loaded");

    let metrics = Metrics::init()?;

    let bili = Arc::new(BiliClient::new()?.with_timeout(cfg.bilibili.fetch_timeout_secs));
    let onebot = Arc::new(OneBotClient::from_config(&cfg.onebot));
    let recent = bili_push::shared_recent_ids();

    let engine = Arc::new(PushEngine::new(
        bili.clone(),
        Arc::new(BiliFormatter),
        onebot.clone(),
        recent.clone(),
    ));
    engine.reload(&cfg.bilibili);

    let replier = Arc::new(DirectReplier::new(
        bili,
        onebot,
        recent,
        InteractSettings::from_config(&cfg.bilibili),
    ));

    if watch::hot_reload_enabled() {
        let engine = engine.clone();
        let replier = replier.clone();
        watch::spawn_config_watcher(path, move |cfg| {
            engine.reload(&cfg.bilibili);
            replier.reload(&cfg.bilibili);
        });
    } else {
        warn!("config hot reload disabled");
    }

    let app = api::router(AppState { replier }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.onebot.listen)
        .await
        .with_context(|| format!("binding {}", cfg.onebot.listen))?;
    info!(listen = %cfg.onebot.listen, "serving OneBot event reports");

    axum::serve(listener, app).await.context("http server")?;
    engine.stop();
    Ok(())
}
