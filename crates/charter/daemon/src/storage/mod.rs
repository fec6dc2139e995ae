//! Storage backend selection

use crate::config::StorageConfig;
use crate::error::DaemonResult;
use charter_governance::{GovernanceStorage, InMemoryStorage};
use std::sync::Arc;

/// Open the backend named in `config`.
pub async fn open(config: &StorageConfig) -> DaemonResult<Arc<dyn GovernanceStorage>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            tracing::info!(max_connections, "Connecting to PostgreSQL");
            let storage = charter_governance::PostgresStorage::new(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(crate::error::DaemonError::Config(
            "postgres storage requested but charterd was built without the `postgres` feature"
                .into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_governance::storage::CharterStorage;

    #[tokio::test]
    async fn test_open_memory() {
        let storage = open(&StorageConfig::Memory).await.unwrap();
        assert!(storage.list_versions().await.unwrap().is_empty());
    }
}
