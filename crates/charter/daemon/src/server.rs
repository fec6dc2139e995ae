//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::Scheduler;
use crate::storage;
use charter_governance::{GovernanceService, SystemClock};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Charter Daemon Server
pub struct Server {
    config: DaemonConfig,
    service: Arc<GovernanceService>,
    scheduler: Arc<Scheduler>,
}

impl Server {
    /// Create a new server with the given configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = storage::open(&config.storage).await?;

        let service = Arc::new(GovernanceService::new(
            storage,
            Arc::new(SystemClock),
            config.governance,
        ));

        let scheduler = Scheduler::new(config.sweeper.clone(), service.clone());

        Ok(Self {
            config,
            service,
            scheduler,
        })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.service.clone(), self.scheduler.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Charter daemon listening on {}", addr);
        tracing::info!(
            votes_for_threshold = self.config.governance.votes_for_threshold,
            votes_against_limit = self.config.governance.votes_against_limit,
            min_voting_period_days = self.config.governance.min_voting_period_days,
            proposal_ttl_days = self.config.governance.proposal_ttl_days,
            "Ratification policy"
        );

        // Start sweeper in background
        let scheduler = self.scheduler.clone();
        let sweeper_handle = tokio::spawn(async move {
            scheduler.start().await;
        });

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Charter daemon shutting down");

        self.scheduler.stop().await;
        sweeper_handle.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
