use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::domain::{mask_tax_id, Lead, LeadRepository, RepositoryError};

/// Postgres lead store, one row per (organization, tax id)
#[derive(Debug, Clone)]
pub struct PgLeadRepository {
    table_name: String,
    pool: PgPool,
}

impl PgLeadRepository {
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Result<Self, DatabaseError> {
        let table_name = table_name.into();
        if !DatabaseManager::is_valid_table_name(&table_name) {
            return Err(DatabaseError::InvalidTableName(table_name));
        }
        Ok(Self { table_name, pool })
    }

    /// Create the lead table and its dedup constraint if missing
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(&create_table_sql(&self.table_name))
            .execute(&self.pool)
            .await?;
        info!(table = %self.table_name, "lead table ready");
        Ok(())
    }
}

#[async_trait]
impl LeadRepository for PgLeadRepository {
    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        sqlx::query(&upsert_sql(&self.table_name))
            .bind(&lead.organization_id)
            .bind(&lead.tax_id)
            .bind(&lead.name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(lead.membership_status.as_str())
            .bind(lead.origin.as_str())
            .bind(lead.primary_lookup_found)
            .bind(lead.primary_lookup_latency_ms as i64)
            .bind(lead.partner_status().as_str())
            .bind(&lead.partner_user_id)
            .bind(&lead.partner_error)
            .bind(lead.partner_latency_ms as i64)
            .bind(lead.partner_attempts as i32)
            .bind(lead.created_at)
            .bind(lead.updated_at)
            .execute(&self.pool)
            .await?;

        debug!(key = %format!("{}_{}", lead.organization_id, mask_tax_id(&lead.tax_id)), "lead saved");
        Ok(())
    }
}

/// Used when no database is configured. Leads only reach the logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLeadRepository;

#[async_trait]
impl LeadRepository for NoopLeadRepository {
    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        debug!(
            tax_id = %mask_tax_id(&lead.tax_id),
            membership = lead.membership_status.as_str(),
            partner = lead.partner_status().as_str(),
            "lead not persisted, no database configured"
        );
        Ok(())
    }
}

fn create_table_sql(table: &str) -> String {
    let quoted = DatabaseManager::quote_identifier(table);
    let constraint = DatabaseManager::quote_identifier(&format!("{}_dedup", table));
    format!(
        r#"CREATE TABLE IF NOT EXISTS {quoted} (
    organization_id TEXT NOT NULL,
    tax_id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    membership_status TEXT NOT NULL,
    origin TEXT NOT NULL,
    primary_lookup_found BOOLEAN NOT NULL DEFAULT FALSE,
    primary_lookup_latency_ms BIGINT NOT NULL DEFAULT 0,
    partner_status TEXT NOT NULL,
    partner_user_id TEXT,
    partner_error TEXT,
    partner_latency_ms BIGINT NOT NULL DEFAULT 0,
    partner_attempts INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT {constraint} UNIQUE (organization_id, tax_id)
)"#
    )
}

/// Insert or overwrite by dedup key. `created_at` keeps its first value.
fn upsert_sql(table: &str) -> String {
    let quoted = DatabaseManager::quote_identifier(table);
    format!(
        r#"INSERT INTO {quoted} (
    organization_id, tax_id, name, email, phone, membership_status, origin,
    primary_lookup_found, primary_lookup_latency_ms, partner_status, partner_user_id,
    partner_error, partner_latency_ms, partner_attempts, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
ON CONFLICT (organization_id, tax_id) DO UPDATE SET
    name = EXCLUDED.name,
    email = EXCLUDED.email,
    phone = EXCLUDED.phone,
    membership_status = EXCLUDED.membership_status,
    origin = EXCLUDED.origin,
    primary_lookup_found = EXCLUDED.primary_lookup_found,
    primary_lookup_latency_ms = EXCLUDED.primary_lookup_latency_ms,
    partner_status = EXCLUDED.partner_status,
    partner_user_id = EXCLUDED.partner_user_id,
    partner_error = EXCLUDED.partner_error,
    partner_latency_ms = EXCLUDED.partner_latency_ms,
    partner_attempts = EXCLUDED.partner_attempts,
    updated_at = EXCLUDED.updated_at"#
    )
}
