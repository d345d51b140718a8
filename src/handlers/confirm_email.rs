// handlers/confirm_email.rs - POST /v1/confirm-email handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::domain::{EmailConfirmationRequest, ValidationResponse};
use crate::error::ApiError;
use crate::middleware::TenantOrganization;

use super::{resolve_organization, validate_cpf, with_deadline};

/// POST /v1/confirm-email - second step of the two-step activation.
/// Wrong email and unknown CPF answer with the same generic error scenario.
pub async fn confirm_email_post(
    State(state): State<AppState>,
    tenant: Option<Extension<TenantOrganization>>,
    payload: Result<Json<EmailConfirmationRequest>, JsonRejection>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let Json(request) = payload?;
    let cpf = validate_cpf(&request.cpf)?;

    let email = request.email.trim();
    if email.is_empty() {
        return Err(ApiError::field("email", "E-mail é obrigatório"));
    }

    let organization = resolve_organization(&state.config, &request.condo_id, tenant.as_deref())?;

    let response = with_deadline(
        &state.config,
        state.service.confirm_email(&cpf, &organization, email),
    )
    .await?;

    Ok(Json(response))
}
