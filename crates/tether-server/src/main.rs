mod config;
mod sweep;

use std::sync::Arc;

use tracing::info;

use tether_db::Database;
use tether_resolver::DiscordResolver;
use tether_subs::SubscriptionManager;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=debug,tether_subs=debug,tether_db=info,tether_resolver=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };
    info!("Starting with {:?}", config);

    let db = Arc::new(Database::open(&config.db_path)?);
    let resolver = DiscordResolver::with_api_base(&config.discord_token, &config.discord_api)?;
    let manager = SubscriptionManager::new(db, resolver);

    let Some(every) = config.sanity_interval else {
        sweep::run_pass(&manager).await?;
        return Ok(());
    };

    info!("Reconciling every {} seconds", every.as_secs());
    tokio::select! {
        _ = sweep::run_sanity_loop(manager, every) => {}
        _ = shutdown_signal() => {}
    }

    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
