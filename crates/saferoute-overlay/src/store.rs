//! Latest known-good set of risk zones.
//!
//! The snapshot lives in a `watch` channel: readers never block, and the
//! coordinator is woken whenever a refresh lands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use saferoute_core::models::{Generation, RiskZone};
use saferoute_core::RiskError;
use tokio::sync::watch;

use crate::source::RiskZoneSource;

/// Read-only view of the store.
#[derive(Debug, Clone)]
pub struct RiskSnapshot {
    pub zones: Arc<[RiskZone]>,
    /// Incremented on every successful refresh
    pub generation: Generation,
    /// At least one refresh has finished, successfully or not
    pub attempted: bool,
    pub last_error: Option<RiskError>,
}

impl Default for RiskSnapshot {
    fn default() -> Self {
        Self {
            zones: Arc::from(Vec::new()),
            generation: Generation::ZERO,
            attempted: false,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied { generation: Generation, zones: usize },
    /// Prior data kept
    Failed(RiskError),
    /// A newer refresh started while this one was in flight; result dropped
    Superseded,
}

pub struct RiskZoneStore {
    source: Arc<dyn RiskZoneSource>,
    tx: watch::Sender<RiskSnapshot>,
    tickets: AtomicU64,
}

impl RiskZoneStore {
    pub fn new(source: Arc<dyn RiskZoneSource>) -> Self {
        let (tx, _rx) = watch::channel(RiskSnapshot::default());
        Self {
            source,
            tx,
            tickets: AtomicU64::new(0),
        }
    }

    /// Current zones and generation. Empty before the first success.
    pub fn snapshot(&self) -> RiskSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RiskSnapshot> {
        self.tx.subscribe()
    }

    /// Fetch from the source and apply the result if no newer refresh
    /// has started in the meantime.
    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.source.fetch_risk_zones().await;

        let mut outcome = RefreshOutcome::Superseded;
        // The ticket check runs under the channel's write lock so two
        // completions can never apply out of order.
        self.tx.send_if_modified(|snapshot| {
            if self.tickets.load(Ordering::SeqCst) != ticket {
                return false;
            }
            snapshot.attempted = true;
            match &result {
                Ok(zones) => {
                    snapshot.generation = snapshot.generation.next();
                    snapshot.zones = Arc::from(zones.as_slice());
                    snapshot.last_error = None;
                    outcome = RefreshOutcome::Applied {
                        generation: snapshot.generation,
                        zones: zones.len(),
                    };
                }
                Err(err) => {
                    let err = as_unavailable(err);
                    snapshot.last_error = Some(err.clone());
                    outcome = RefreshOutcome::Failed(err);
                }
            }
            true
        });

        match &outcome {
            RefreshOutcome::Applied { generation, zones } => {
                tracing::info!("Risk zones refreshed: {} zone(s) at {}", zones, generation);
            }
            RefreshOutcome::Failed(err) => {
                tracing::warn!("Risk zone refresh failed, keeping previous data: {}", err);
            }
            RefreshOutcome::Superseded => {
                tracing::debug!("Risk zone refresh #{} superseded, result dropped", ticket);
            }
        }
        outcome
    }
}

fn as_unavailable(err: &RiskError) -> RiskError {
    match err {
        RiskError::RiskDataUnavailable(_) => err.clone(),
        other => RiskError::RiskDataUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Reply = Result<Vec<RiskZone>, RiskError>;

    /// Each fetch waits on the next queued gate.
    struct GatedSource {
        gates: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    }

    impl GatedSource {
        fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Reply>>) {
            let mut senders = Vec::new();
            let mut gates = VecDeque::new();
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                gates.push_back(rx);
            }
            (Arc::new(Self { gates: Mutex::new(gates) }), senders)
        }
    }

    impl RiskZoneSource for GatedSource {
        fn fetch_risk_zones(&self) -> BoxFuture<'_, Reply> {
            let gate = self.gates.lock().unwrap().pop_front();
            Box::pin(async move {
                match gate {
                    Some(rx) => rx.await.unwrap_or_else(|_| {
                        Err(RiskError::RiskDataUnavailable("gate dropped".into()))
                    }),
                    None => Err(RiskError::RiskDataUnavailable("no gate".into())),
                }
            })
        }
    }

    #[tokio::test]
    async fn snapshot_is_empty_before_first_refresh() {
        let (source, _gates) = GatedSource::new(0);
        let store = RiskZoneStore::new(source);
        let snapshot = store.snapshot();
        assert!(snapshot.zones.is_empty());
        assert_eq!(snapshot.generation, Generation::ZERO);
        assert!(!snapshot.attempted);
    }

    #[tokio::test]
    async fn success_increments_generation_and_failure_keeps_data() {
        let (source, mut gates) = GatedSource::new(2);
        let store = RiskZoneStore::new(source);

        gates.remove(0).send(Ok(vec![RiskZone::new(12.9, 77.6)])).unwrap();
        let outcome = store.refresh().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Applied {
                generation: Generation(1),
                zones: 1
            }
        );

        gates
            .remove(0)
            .send(Err(RiskError::RouteNotFound("wrong kind".into())))
            .unwrap();
        let outcome = store.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Failed(RiskError::RiskDataUnavailable(_))));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.generation, Generation(1));
        assert_eq!(snapshot.zones.len(), 1);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn older_refresh_finishing_late_is_superseded() {
        let (source, mut gates) = GatedSource::new(2);
        let store = Arc::new(RiskZoneStore::new(source));

        let first_gate = gates.remove(0);
        let second_gate = gates.remove(0);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.refresh().await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.refresh().await }
        });
        tokio::task::yield_now().await;

        second_gate.send(Ok(vec![RiskZone::new(2.0, 2.0)])).unwrap();
        assert!(matches!(second.await.unwrap(), RefreshOutcome::Applied { .. }));

        first_gate
            .send(Ok(vec![RiskZone::new(1.0, 1.0), RiskZone::new(1.5, 1.5)]))
            .unwrap();
        assert_eq!(first.await.unwrap(), RefreshOutcome::Superseded);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.zones.len(), 1);
        assert_eq!(snapshot.zones[0], RiskZone::new(2.0, 2.0));
        assert_eq!(snapshot.generation, Generation(1));
    }

    #[tokio::test]
    async fn subscribers_see_failed_first_attempt() {
        let (source, mut gates) = GatedSource::new(1);
        let store = RiskZoneStore::new(source);
        let mut rx = store.subscribe();

        gates
            .remove(0)
            .send(Err(RiskError::RiskDataUnavailable("503".into())))
            .unwrap();
        store.refresh().await;

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.attempted);
        assert!(snapshot.zones.is_empty());
    }
}
