//! Print the expanded push routing for a config file without contacting anything.
//!
//! Usage: `push_routes [path/to/bot.toml]`

use std::path::PathBuf;

use anyhow::Result;
use bili_push::config;
use bili_push::push::routing::Route;
use bili_push::push::PushSnapshot;

fn describe(routes: &[Route]) -> String {
    routes
        .iter()
        .map(|r| {
            let mut s = r.group.to_string();
            if r.at_all {
                s.push_str(" @all");
            }
            if r.only_video {
                s.push_str(" video-only");
            }
            s
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let (cfg, path) = match std::env::args().nth(1) {
        Some(p) => {
            let path = PathBuf::from(p);
            (config::load_from(&path)?, path)
        }
        None => config::load_default()?,
    };
    let snap = PushSnapshot::from_config(&cfg.bilibili);

    println!("config: {}", path.display());
    println!(
        "interval: {}s  bookkeeping ttl: {}s  fetch timeout: {}s  dispatch delay: {}ms",
        snap.interval.as_secs(),
        snap.bookkeeping_ttl.as_secs(),
        snap.fetch_timeout.as_secs(),
        snap.dispatch_delay.as_millis()
    );

    println!("\n[dynamic]");
    for (uid, routes) in &snap.routes.dynamic {
        println!("  {uid} -> {}", describe(routes));
    }
    println!("\n[live]");
    for (uid, routes) in &snap.routes.live {
        println!("  {uid} -> {}", describe(routes));
    }
    println!("\n[season]");
    for (key, routes) in &snap.routes.season {
        println!("  {key} -> {}", describe(routes));
    }
    if snap.routes.is_empty() {
        println!("\n(no push targets; the scheduler would stay idle)");
    }
    Ok(())
}
