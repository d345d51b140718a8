use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::config::AppConfig;

/// Organization resolved from the request host, injected by middleware
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantOrganization(pub String);

/// Middleware that maps the request host to an organization id via
/// `server.tenant_hosts`, falling back to the configured default
pub async fn resolve_tenant_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    let organization = request_host(request.headers())
        .map(|host| config.organization_for_host(host))
        .unwrap_or_else(|| config.server.default_organization_id.clone());

    tracing::debug!("Resolved tenant organization: {:?}", organization);
    request.extensions_mut().insert(TenantOrganization(organization));

    next.run(request).await
}

/// Proxy-forwarded host first, then the Host header
fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim())
        .filter(|value| !value.is_empty())
}
