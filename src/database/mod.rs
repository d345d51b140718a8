pub mod manager;
pub mod repository;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::domain::LeadRepository;

pub use manager::{DatabaseError, DatabaseManager};
pub use repository::{NoopLeadRepository, PgLeadRepository};

/// Postgres store when a URL is configured, otherwise a no-op sink
pub async fn lead_repository(config: &DatabaseConfig) -> Result<Arc<dyn LeadRepository>, DatabaseError> {
    if config.url.as_deref().map_or(true, str::is_empty) {
        warn!("DATABASE_URL not set, leads will not be persisted");
        return Ok(Arc::new(NoopLeadRepository));
    }

    let manager = DatabaseManager::connect(config).await?;
    manager.health_check().await?;

    let repository = PgLeadRepository::new(&config.table_name, manager.pool().clone())?;
    repository.ensure_schema().await?;

    info!(table = %config.table_name, "lead persistence enabled");
    Ok(Arc::new(repository))
}
