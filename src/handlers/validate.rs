// handlers/validate.rs - POST /v1/validate handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::domain::{ValidationRequest, ValidationResponse};
use crate::error::ApiError;
use crate::middleware::TenantOrganization;

use super::{resolve_organization, validate_cpf, with_deadline};

/**
 * POST /v1/validate - Reconcile a CPF with the condominium and partner directories
 *
 * Expected Input:
 * ```json
 * { "cpf": "123.456.789-00", "condo_id": "4" }
 * ```
 *
 * `condo_id` is optional; the host mapping or the configured default is used
 * when it is missing. The body is always a business response tagged with
 * `scenario`; only malformed input (400) and the request deadline (504)
 * produce the error envelope.
 */
pub async fn validate_post(
    State(state): State<AppState>,
    tenant: Option<Extension<TenantOrganization>>,
    payload: Result<Json<ValidationRequest>, JsonRejection>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let Json(request) = payload?;
    let cpf = validate_cpf(&request.cpf)?;
    let organization = resolve_organization(&state.config, &request.condo_id, tenant.as_deref())?;

    let evaluation = with_deadline(&state.config, state.service.evaluate(&cpf, &organization)).await?;

    Ok(Json(evaluation.response))
}
