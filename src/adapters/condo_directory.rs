use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::MembershipConfig;
use crate::domain::{mask_tax_id, LookupError, MemberRecord, MembershipLookup};

/// Organization id that asks the directory to search every condominium
pub const SEARCH_ALL: &str = "-1";

#[derive(Debug, Deserialize)]
struct UnitRow {
    #[serde(default)]
    nome_proprietario: String,
    #[serde(default)]
    email_proprietario: String,
    #[serde(default)]
    celular_proprietario: String,
    #[serde(default)]
    telefone_proprietario: String,
}

#[derive(Debug, Deserialize)]
struct CondoRow {
    id_condominio_cond: String,
}

/// Condominium-management API client resolving unit owners by tax ID
#[derive(Debug, Clone)]
pub struct CondoDirectoryClient {
    base_url: String,
    app_token: String,
    access_token: String,
    scan_fallback_max_id: u32,
    listing_page_size: u32,
    http: Client,
}

impl CondoDirectoryClient {
    pub fn new(config: &MembershipConfig) -> Result<Self, LookupError> {
        if config.app_token.is_empty() || config.access_token.is_empty() {
            warn!("membership directory credentials are not configured");
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(url = %config.base_url, "membership directory client initialized");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_token: config.app_token.clone(),
            access_token: config.access_token.clone(),
            scan_fallback_max_id: config.scan_fallback_max_id,
            listing_page_size: config.listing_page_size,
            http,
        })
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Content-Type", "application/json")
            .header("app_token", &self.app_token)
            .header("access_token", &self.access_token)
    }

    /// Look the tax ID up inside a single condominium
    async fn check_unit(&self, organization_id: &str, tax_id: &str) -> Result<Option<MemberRecord>, LookupError> {
        let started = Instant::now();
        let url = format!("{}/unidades/index", self.base_url);

        let response = self
            .with_headers(self.http.get(&url))
            .query(&[
                ("idCondominio", organization_id),
                ("pesquisa", tax_id),
                ("itensPorPagina", "1"),
                ("exibirDadosDosContatos", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let rows: Vec<UnitRow> = response.json().await?;
        let Some(unit) = rows.into_iter().next() else {
            return Ok(None);
        };

        let phone = if unit.celular_proprietario.is_empty() {
            unit.telefone_proprietario
        } else {
            unit.celular_proprietario
        };

        Ok(Some(MemberRecord {
            organization_id: organization_id.to_string(),
            name: unit.nome_proprietario,
            email: unit.email_proprietario,
            phone,
            latency_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Ids of every condominium to scan. Falls back to `1..=scan_fallback_max_id`
    /// when the listing is refused or empty.
    async fn list_condos(&self) -> Result<Vec<String>, LookupError> {
        let url = format!("{}/condominios/index", self.base_url);
        let page_size = self.listing_page_size.to_string();

        let response = self
            .with_headers(self.http.get(&url))
            .query(&[("itensPorPagina", page_size.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "condominium listing refused, probing ids sequentially");
            return Ok(self.fallback_ids());
        }

        let rows: Vec<CondoRow> = response.json().await?;
        if rows.is_empty() {
            return Ok(self.fallback_ids());
        }

        Ok(rows.into_iter().map(|row| row.id_condominio_cond).collect())
    }

    fn fallback_ids(&self) -> Vec<String> {
        (1..=self.scan_fallback_max_id).map(|id| id.to_string()).collect()
    }
}

#[async_trait]
impl MembershipLookup for CondoDirectoryClient {
    async fn validate_member(
        &self,
        organization_id: &str,
        tax_id: &str,
    ) -> Result<Option<MemberRecord>, LookupError> {
        if !organization_id.is_empty() && organization_id != SEARCH_ALL {
            return self.check_unit(organization_id, tax_id).await;
        }

        // Global search first; any failure there falls through to the scan
        match self.check_unit(SEARCH_ALL, tax_id).await {
            Ok(Some(member)) => return Ok(Some(member)),
            Ok(None) => {}
            Err(err) => debug!(error = %err, "global unit search failed"),
        }

        let ids = self.list_condos().await?;
        debug!(condominiums = ids.len(), tax_id = %mask_tax_id(tax_id), "scanning condominiums");

        for id in ids {
            match self.check_unit(&id, tax_id).await {
                Ok(Some(member)) => return Ok(Some(member)),
                Ok(None) => {}
                Err(err) => debug!(condominium = %id, error = %err, "unit search failed, skipping"),
            }
        }

        Ok(None)
    }
}
