//! Scheduler: owns the live target set and drives the probes.
//!
//! Two independent loops share the set. The probe loop takes an `Arc`
//! snapshot each cycle and spawns one task per target; the watch loop polls
//! the config file's modification time and swaps in a freshly reconciled
//! set when it changes. The swap is a single `Arc` replacement, so a cycle
//! already holding the old snapshot keeps probing it unharmed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::config::ConfigManager;
use crate::db::{Measurement, Store, Target, TargetSet};
use crate::probe::Prober;
use crate::registry;

/// How often the config file is polled for changes.
const WATCH_INTERVAL: Duration = Duration::from_secs(5);

pub struct Scheduler {
    store: Arc<Store>,
    config: Arc<ConfigManager>,
    targets: RwLock<Arc<TargetSet>>,
    prober: RwLock<Arc<Prober>>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, config: Arc<ConfigManager>) -> Self {
        let ping_count = config.get().ping_count;
        Self {
            store,
            config,
            targets: RwLock::new(Arc::new(TargetSet::new())),
            prober: RwLock::new(Arc::new(Prober::new(ping_count as u32))),
        }
    }

    /// Load persisted targets, reconcile them against the current config,
    /// run one awaited startup pass, then spawn the two loops.
    ///
    /// Errors here are startup errors and abort the process; once the loops
    /// are running every failure is contained and logged.
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let existing = self.store.load_targets()?;
        let cfg = self.config.get();
        let set = registry::reconcile(&self.store, &existing, &cfg.targets)?;

        tracing::info!("monitoring {} targets", set.len());
        for target in set.values() {
            // Console logging always shows the real address.
            tracing::info!("- {} ({})", target.description, target.address);
        }

        *self.targets.write().await = Arc::new(set);

        // Startup pass, awaited so initial reachability shows in the log
        // before steady state begins. Results are not persisted.
        let snapshot = self.snapshot().await;
        let prober = self.current_prober().await;
        for target in snapshot.values() {
            let (latency, success) = prober.probe(target).await;
            if success {
                tracing::info!("startup test {} ({}): {:.2}ms", target.description, target.address, latency);
            } else {
                tracing::warn!("startup test {} ({}): unreachable", target.description, target.address);
            }
        }

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.probe_loop().await });

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.watch_loop().await });

        Ok(())
    }

    async fn snapshot(&self) -> Arc<TargetSet> {
        self.targets.read().await.clone()
    }

    async fn current_prober(&self) -> Arc<Prober> {
        self.prober.read().await.clone()
    }

    /// Steady-state cycle: sleep for the configured interval, snapshot the
    /// set, launch one unawaited task per target. Probes outliving a cycle
    /// simply overlap with the next one.
    async fn probe_loop(self: Arc<Self>) {
        loop {
            let interval = self.config.get().ping_interval.max(1) as u64;
            tokio::time::sleep(Duration::from_secs(interval)).await;

            let snapshot = self.snapshot().await;
            let prober = self.current_prober().await;

            for target in snapshot.values() {
                let target = target.clone();
                let prober = prober.clone();
                let store = self.store.clone();
                tokio::spawn(async move {
                    probe_and_record(&store, &prober, &target).await;
                });
            }
        }
    }

    /// Poll the config file and reconcile on change. Any failure leaves the
    /// previous config and target set fully in place.
    async fn watch_loop(self: Arc<Self>) {
        let mut tick = tokio::time::interval(WATCH_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            let Ok(meta) = tokio::fs::metadata(self.config.path()).await else {
                continue;
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let changed = match self.config.last_modified() {
                Some(seen) => modified > seen,
                None => true,
            };
            if !changed {
                continue;
            }

            tracing::info!("config file changed, reloading");
            if let Err(e) = self.config.load() {
                tracing::error!("config reload failed: {}", e);
                continue;
            }

            let cfg = self.config.get();
            let old = self.snapshot().await;
            let next = match registry::reconcile(&self.store, &old, &cfg.targets) {
                Ok(set) => Arc::new(set),
                Err(e) => {
                    tracing::error!("target reconciliation failed: {}", e);
                    continue;
                }
            };

            *self.targets.write().await = next.clone();
            *self.prober.write().await = Arc::new(Prober::new(cfg.ping_count as u32));

            // New targets get a data point now instead of waiting a tick.
            let prober = self.current_prober().await;
            for target in newly_added(&old, &next) {
                tracing::info!(
                    "new target, probing immediately: {} ({})",
                    target.description,
                    target.address
                );
                let target = target.clone();
                let prober = prober.clone();
                let store = self.store.clone();
                tokio::spawn(async move {
                    probe_and_record(&store, &prober, &target).await;
                });
            }

            tracing::info!("config reload complete");
        }
    }

    /// Current target roster for the web layer.
    pub async fn targets(&self) -> Arc<TargetSet> {
        self.snapshot().await
    }
}

/// Targets present in `next` but not in `old`.
fn newly_added<'a>(old: &TargetSet, next: &'a TargetSet) -> Vec<&'a Target> {
    next.values().filter(|t| !old.contains_key(&t.id)).collect()
}

/// Probe one target and append the outcome. An append failure loses one
/// sample and a log line, never the loop.
async fn probe_and_record(store: &Store, prober: &Prober, target: &Target) {
    let (latency, success) = prober.probe(target).await;

    let measurement = Measurement {
        target_id: target.id.clone(),
        latency_ms: latency,
        success,
        timestamp: Utc::now(),
    };

    if let Err(e) = store.add_measurement(&measurement) {
        tracing::error!("failed to record measurement for {}: {}", target.description, e);
    }

    if success {
        tracing::info!("{} ({}): {:.2}ms", target.description, target.address, latency);
    } else {
        tracing::warn!("{} ({}): unreachable", target.description, target.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSpec;
    use tempfile::NamedTempFile;

    fn spec(addr: &str, description: &str) -> TargetSpec {
        TargetSpec {
            addr: addr.to_string(),
            description: description.to_string(),
            hide_addr: false,
            dns_server: String::new(),
        }
    }

    #[test]
    fn newly_added_finds_only_fresh_ids() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let old = registry::reconcile(&store, &TargetSet::new(), &[spec("8.8.8.8", "Google DNS")])
            .unwrap();
        let next = registry::reconcile(
            &store,
            &old,
            &[spec("8.8.8.8", "Google DNS"), spec("1.1.1.1", "Cloudflare")],
        )
        .unwrap();

        let added = newly_added(&old, &next);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].address, "1.1.1.1");

        // Reconciling the same config again adds nothing.
        let again = registry::reconcile(
            &store,
            &next,
            &[spec("8.8.8.8", "Google DNS"), spec("1.1.1.1", "Cloudflare")],
        )
        .unwrap();
        assert!(newly_added(&next, &again).is_empty());
    }

    #[tokio::test]
    async fn target_set_swap_is_wholesale() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let config = Arc::new(ConfigManager::new("unused.json"));
        let scheduler = Scheduler::new(store.clone(), config);

        let set = registry::reconcile(
            &store,
            &TargetSet::new(),
            &[spec("8.8.8.8", "Google DNS")],
        )
        .unwrap();

        let before = scheduler.snapshot().await;
        *scheduler.targets.write().await = Arc::new(set);
        let after = scheduler.snapshot().await;

        // The old snapshot is untouched by the swap.
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
    }
}
