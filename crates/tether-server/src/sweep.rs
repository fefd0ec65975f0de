use std::time::Duration;

use tracing::{info, warn};

use tether_db::SubscriptionStore;
use tether_resolver::ChannelResolver;
use tether_subs::{SanityReport, SubscriptionManager};

/// Background task that reconciles subscriptions against the platform.
///
/// The first pass runs immediately, then one per `every`. A failed pass is
/// logged and retried on the next tick.
pub async fn run_sanity_loop<S, R>(manager: SubscriptionManager<S, R>, every: Duration)
where
    S: SubscriptionStore,
    R: ChannelResolver,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if let Err(e) = run_pass(&manager).await {
            warn!("Sanity check error: {}", e);
        }
    }
}

pub async fn run_pass<S, R>(manager: &SubscriptionManager<S, R>) -> tether_subs::Result<SanityReport>
where
    S: SubscriptionStore,
    R: ChannelResolver,
{
    let report = manager.sanity_check().await?;
    if !report.is_clean() {
        info!(
            "Sanity check repaired drift: {} invalid channels ({} subs, {} users purged), {} channels and {} users restored",
            report.invalid_channels,
            report.purged_subs,
            report.purged_users,
            report.restored_channels,
            report.restored_users
        );
    }
    if report.skipped > 0 {
        warn!("Sanity check skipped {} subscriptions with unresolvable channels", report.skipped);
    }
    Ok(report)
}
