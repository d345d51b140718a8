//! Router wiring shared by the binary and the integration tests

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{resolve_tenant_middleware, security_headers_middleware};
use crate::services::ValidationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<ValidationService>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, service: ValidationService) -> Self {
        Self {
            config,
            service: Arc::new(service),
        }
    }
}

/// Build the full HTTP router
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::health_get))
        .route("/v1/health", get(handlers::health::health_get))
        .route("/config", get(handlers::frontend_config::config_get))
        .route("/v1/validate", post(handlers::validate::validate_post))
        .route("/v1/confirm-email", post(handlers::confirm_email::confirm_email_post))
        .layer(from_fn_with_state(state.config.clone(), resolve_tenant_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(from_fn(security_headers_middleware)),
        )
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_is_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
