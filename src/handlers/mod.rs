// handlers/mod.rs - HTTP surface of the validation service
//
// Public endpoints only; the landing page calls them directly:
//   POST /v1/validate        -> validate::validate_post
//   POST /v1/confirm-email   -> confirm_email::confirm_email_post
//   GET  /config             -> frontend_config::config_get
//   GET  /health, /v1/health -> health::health_get

pub mod confirm_email;
pub mod frontend_config;
pub mod health;
pub mod validate;

use std::future::Future;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::middleware::TenantOrganization;

/// Formatted or bare CPF: `123.456.789-00` or `12345678900`
static CPF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}\.?\d{3}\.?\d{3}-?\d{2}$").expect("valid CPF pattern"));

/// Trimmed CPF, or a 400 when it does not look like one
pub fn validate_cpf(raw: &str) -> Result<String, ApiError> {
    let cpf = raw.trim();
    if cpf.is_empty() {
        return Err(ApiError::field("cpf", "CPF é obrigatório"));
    }
    if !CPF_PATTERN.is_match(cpf) {
        return Err(ApiError::field("cpf", "CPF inválido"));
    }
    Ok(cpf.to_string())
}

/// Organization for a request: body, then host mapping, then default
pub fn resolve_organization(
    config: &AppConfig,
    from_body: &str,
    tenant: Option<&TenantOrganization>,
) -> Result<String, ApiError> {
    let organization = Some(from_body.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| tenant.map(|t| t.0.clone()).filter(|id| !id.is_empty()))
        .unwrap_or_else(|| config.server.default_organization_id.clone());

    if organization.is_empty() && config.server.organization_id_required {
        return Err(ApiError::field("condo_id", "Condomínio é obrigatório"));
    }
    Ok(organization)
}

/// Bound a pipeline by the configured request deadline
pub async fn with_deadline<F, T>(config: &AppConfig, pipeline: F) -> Result<T, ApiError>
where
    F: Future<Output = T>,
{
    let limit = config.request_timeout();
    tokio::time::timeout(limit, pipeline).await.map_err(|_| {
        tracing::warn!("Request exceeded deadline of {:?}", limit);
        ApiError::gateway_timeout("Tempo de resposta excedido. Tente novamente.")
    })
}
