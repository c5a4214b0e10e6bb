// src/config/watch.rs
//! Config hot reload: poll the file's mtime and hand every successfully parsed
//! version to a callback. A broken file keeps the previous config in force.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{load_from, BotConfig};

pub const ENV_HOT_RELOAD: &str = "BILIPUSH_HOT_RELOAD";
const POLL: Duration = Duration::from_secs(2);

/// Hot reload is on unless BILIPUSH_HOT_RELOAD=0.
pub fn hot_reload_enabled() -> bool {
    std::env::var(ENV_HOT_RELOAD)
        .map(|v| v.trim() != "0")
        .unwrap_or(true)
}

async fn mtime(path: &PathBuf) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

/// Spawn the watcher. `on_change` runs on the runtime, after each successful reparse.
pub fn spawn_config_watcher<F>(path: PathBuf, on_change: F) -> JoinHandle<()>
where
    F: Fn(BotConfig) + Send + 'static,
{
    tokio::spawn(async move {
        let mut last = mtime(&path).await;
        let mut ticker = tokio::time::interval(POLL);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(current) = mtime(&path).await else {
                // Missing or unreadable; keep trying.
                continue;
            };
            if last.is_some_and(|prev| current <= prev) {
                continue;
            }
            last = Some(current);

            match load_from(&path) {
                Ok(cfg) => {
                    info!(target: "config", path = %path.display(), "config reloaded");
                    on_change(cfg);
                }
                Err(e) => {
                    warn!(target: "config", error = ?e, "config reload failed; keeping previous");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn picks_up_rewritten_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "[bilibili]\npush_check_interval = 60\n").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = spawn_config_watcher(path.clone(), move |cfg| {
            sink.lock().unwrap().push(cfg.bilibili.push_check_interval);
        });

        // mtime granularity can be coarse; make sure the rewrite is strictly newer.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(&path, "[bilibili]\npush_check_interval = 90\n").unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;
        handle.abort();

        assert_eq!(seen.lock().unwrap().as_slice(), &[90]);
    }
}
