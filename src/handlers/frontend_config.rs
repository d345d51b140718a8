// handlers/frontend_config.rs - GET /config handler

use axum::{extract::State, Extension};
use serde::Serialize;

use crate::app::AppState;
use crate::config::{ActivationMode, BrandingConfig};
use crate::middleware::{ApiResponse, TenantOrganization};

/// Settings the landing page needs to render itself
#[derive(Debug, Serialize)]
pub struct FrontendConfig {
    pub branding: BrandingConfig,
    pub activation_mode: ActivationMode,
    pub requires_email_confirmation: bool,
    pub condo_id: String,
    pub condo_id_required: bool,
    pub environment: String,
}

/// GET /config - branding and behavior snapshot, in the success envelope
pub async fn config_get(
    State(state): State<AppState>,
    tenant: Option<Extension<TenantOrganization>>,
) -> ApiResponse<FrontendConfig> {
    let config = &state.config;
    let condo_id = tenant
        .map(|Extension(t)| t.0)
        .unwrap_or_else(|| config.server.default_organization_id.clone());

    ApiResponse::success(FrontendConfig {
        branding: config.branding.clone(),
        activation_mode: config.activation.mode,
        requires_email_confirmation: config.activation.mode == ActivationMode::TwoStep,
        condo_id,
        condo_id_required: config.server.organization_id_required,
        environment: format!("{:?}", config.environment).to_lowercase(),
    })
}
