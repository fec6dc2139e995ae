//! Expiration sweep loop

use crate::config::SweeperConfig;
use charter_governance::GovernanceService;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Runs the expiration sweeper on a fixed interval
pub struct Scheduler {
    config: SweeperConfig,
    service: Arc<GovernanceService>,
    running: Arc<RwLock<bool>>,
    last_sweep: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(config: SweeperConfig, service: Arc<GovernanceService>) -> Arc<Self> {
        Arc::new(Self {
            config,
            service,
            running: Arc::new(RwLock::new(false)),
            last_sweep: RwLock::new(None),
        })
    }

    pub fn interval_secs(&self) -> u64 {
        self.config.interval_secs
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn last_sweep(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        *self.last_sweep.read().await
    }

    /// Sweep until [`Scheduler::stop`] is called. The first sweep runs
    /// immediately.
    pub async fn start(self: Arc<Self>) {
        if !self.config.enabled {
            tracing::info!("Expiration sweeper disabled");
            return;
        }

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(interval_secs = self.config.interval_secs, "Scheduler started");

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if !*self.running.read().await {
                break;
            }

            self.sweep().await;
        }

        tracing::info!("Scheduler stopped");
    }

    /// Run one sweep, logging rather than propagating failures.
    pub async fn sweep(&self) {
        match self.service.expire_proposals().await {
            Ok(report) => {
                tracing::debug!(expired = report.count(), "Scheduled sweep finished");
            }
            Err(e) => {
                tracing::error!(error = %e, "Expiration sweep failed");
            }
        }
        *self.last_sweep.write().await = Some(chrono::Utc::now());
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }
}
