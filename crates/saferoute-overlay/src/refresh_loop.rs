//! Periodic risk zone refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::backoff::Backoff;
use crate::store::{RefreshOutcome, RiskZoneStore};

const REFRESH_BACKOFF_MAX_SECS: u64 = 300;

/// Refresh `store` every `every` until shutdown is signalled.
///
/// The first refresh runs immediately. Failed refreshes back off
/// exponentially, skipping ticks until the delay has elapsed.
pub async fn run_refresh_loop(
    store: Arc<RiskZoneStore>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut backoff = Backoff::new(every, Duration::from_secs(REFRESH_BACKOFF_MAX_SECS));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Risk zone refresh loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if !backoff.ready() {
                    continue;
                }
                match store.refresh().await {
                    RefreshOutcome::Failed(err) => {
                        let delay = backoff.fail();
                        tracing::warn!(
                            "Risk zone refresh failed: {} (backing off {:?})",
                            err,
                            delay
                        );
                    }
                    RefreshOutcome::Applied { .. } => backoff.reset(),
                    RefreshOutcome::Superseded => {}
                }
            }
        }
    }
}
