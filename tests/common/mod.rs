#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use benefit_gate::adapters::RetryPolicy;
use benefit_gate::config::{MembershipConfig, PartnerConfig};

/// Axum router served on an ephemeral port, aborted on drop
pub struct TestServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    }
}

// ---------------------------------------------------------------------------
// Fake partner (benefits club) API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PartnerState {
    pub auth_calls: AtomicUsize,
    pub user_posts: AtomicUsize,
    pub users: Mutex<Vec<Value>>,
    pub posted: Mutex<Vec<Value>>,
    pub deletes: Mutex<Vec<String>>,
    pub sso_requests: Mutex<Vec<String>>,
    /// Scripted answers for `POST /users`; once empty the user is created
    pub post_script: Mutex<VecDeque<(u16, Value)>>,
    pub reject_auth: Mutex<bool>,
    /// SSO identifiers answered with 500
    pub failing_sso: Mutex<Vec<String>>,
}

impl PartnerState {
    pub fn add_user(&self, id: &str, cpf: &str, email: &str) {
        self.users.lock().unwrap().push(json!({
            "id": id,
            "name": "Ana Souza",
            "email": email,
            "cpf": cpf,
            "cellphone": "(11) 98888-7777",
            "active": true,
        }));
    }

    pub fn script_post(&self, status: u16, body: Value) {
        self.post_script.lock().unwrap().push_back((status, body));
    }

    pub fn fail_sso_for(&self, identifier: &str) {
        self.failing_sso.lock().unwrap().push(identifier.to_string());
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn user_posts(&self) -> usize {
        self.user_posts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn sso_requests(&self) -> Vec<String> {
        self.sso_requests.lock().unwrap().clone()
    }
}

pub struct FakePartner {
    pub server: TestServer,
    pub state: Arc<PartnerState>,
}

impl FakePartner {
    pub async fn spawn() -> Self {
        let state = Arc::new(PartnerState::default());
        let app = Router::new()
            .route("/api/auth", post(partner_auth))
            .route("/api/users", get(partner_find).post(partner_create))
            .route("/api/users/:id", delete(partner_delete))
            .route("/api/sso-token", get(partner_sso))
            .with_state(state.clone());

        Self {
            server: TestServer::spawn(app).await,
            state,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/api", self.server.base_url)
    }

    pub fn config(&self) -> PartnerConfig {
        PartnerConfig {
            base_url: self.base_url(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            bearer_token: None,
            timeout_secs: 5,
            token_refresh_margin_secs: 300,
        }
    }
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("Bearer token-"))
}

async fn partner_auth(State(state): State<Arc<PartnerState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if *state.reject_auth.lock().unwrap() || body["grant_type"] != "client_credentials" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid client"})));
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": format!("token-{}", n), "expires_in": 3600, "token_type": "Bearer"})),
    )
}

async fn partner_find(
    State(state): State<Arc<PartnerState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !bearer_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unauthenticated"})));
    }
    let search = query.get("search").cloned().unwrap_or_default();
    let users: Vec<Value> = state
        .users
        .lock()
        .unwrap()
        .iter()
        .filter(|u| u["cpf"].as_str().map_or(false, |cpf| cpf.contains(&search)))
        .cloned()
        .collect();
    (StatusCode::OK, Json(json!({ "data": users })))
}

async fn partner_create(
    State(state): State<Arc<PartnerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = state.user_posts.fetch_add(1, Ordering::SeqCst) + 1;
    if !bearer_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unauthenticated"})));
    }
    state.posted.lock().unwrap().push(body.clone());

    if let Some((status, response)) = state.post_script.lock().unwrap().pop_front() {
        return (StatusCode::from_u16(status).unwrap(), Json(response));
    }

    let id = format!("new-{}", n);
    state.users.lock().unwrap().push(json!({
        "id": id,
        "name": body["name"],
        "email": body["email"],
        "cpf": body["cpf"],
        "active": true,
    }));
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn partner_delete(
    State(state): State<Arc<PartnerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.deletes.lock().unwrap().push(id.clone());
    let mut users = state.users.lock().unwrap();
    let before = users.len();
    users.retain(|u| u["id"] != id.as_str());
    if users.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn partner_sso(
    State(state): State<Arc<PartnerState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !bearer_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unauthenticated"})));
    }
    let identifier = query.get("user_id").cloned().unwrap_or_default();
    state.sso_requests.lock().unwrap().push(identifier.clone());
    if state.failing_sso.lock().unwrap().contains(&identifier) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "sso unavailable"})));
    }

    let known = state
        .users
        .lock()
        .unwrap()
        .iter()
        .any(|u| u["id"] == identifier.as_str() || u["email"] == identifier.as_str());
    if !known {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "user not found"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "token": format!("sso-{}", identifier),
            "redirect": format!("https://club.example.com/sso?user={}", identifier),
        })),
    )
}

// ---------------------------------------------------------------------------
// Fake condominium-management API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CondoState {
    /// (condominium id, tax id) -> unit row
    pub units: Mutex<HashMap<(String, String), Value>>,
    /// `None` answers the listing with 500
    pub listing: Mutex<Option<Vec<String>>>,
    pub unit_queries: Mutex<Vec<String>>,
}

impl CondoState {
    pub fn add_owner(&self, condo: &str, cpf: &str, name: &str, email: &str) {
        self.units.lock().unwrap().insert(
            (condo.to_string(), cpf.to_string()),
            json!({
                "nome_proprietario": name,
                "email_proprietario": email,
                "celular_proprietario": "",
                "telefone_proprietario": "1133334444",
            }),
        );
    }

    pub fn set_listing(&self, ids: &[&str]) {
        *self.listing.lock().unwrap() = Some(ids.iter().map(|s| s.to_string()).collect());
    }

    pub fn unit_queries(&self) -> Vec<String> {
        self.unit_queries.lock().unwrap().clone()
    }
}

pub struct FakeCondo {
    pub server: TestServer,
    pub state: Arc<CondoState>,
}

impl FakeCondo {
    pub async fn spawn() -> Self {
        let state = Arc::new(CondoState::default());
        let app = Router::new()
            .route("/condor/unidades/index", get(condo_units))
            .route("/condor/condominios/index", get(condo_listing))
            .with_state(state.clone());

        Self {
            server: TestServer::spawn(app).await,
            state,
        }
    }

    pub fn config(&self) -> MembershipConfig {
        MembershipConfig {
            base_url: format!("{}/condor", self.server.base_url),
            app_token: "app".to_string(),
            access_token: "access".to_string(),
            timeout_secs: 5,
            scan_fallback_max_id: 5,
            listing_page_size: 100,
        }
    }
}

fn condo_headers_ok(headers: &HeaderMap) -> bool {
    headers.get("app_token").is_some() && headers.get("access_token").is_some()
}

async fn condo_units(
    State(state): State<Arc<CondoState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !condo_headers_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "missing tokens"})));
    }
    let condo = query.get("idCondominio").cloned().unwrap_or_default();
    let cpf = query.get("pesquisa").cloned().unwrap_or_default();
    state.unit_queries.lock().unwrap().push(condo.clone());

    if condo == "-1" {
        return (StatusCode::OK, Json(json!([])));
    }
    if condo == "3" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"msg": "boom"})));
    }

    let rows: Vec<Value> = state
        .units
        .lock()
        .unwrap()
        .get(&(condo, cpf))
        .cloned()
        .into_iter()
        .collect();
    (StatusCode::OK, Json(Value::Array(rows)))
}

async fn condo_listing(State(state): State<Arc<CondoState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !condo_headers_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "missing tokens"})));
    }
    match state.listing.lock().unwrap().clone() {
        Some(ids) => {
            let rows: Vec<Value> = ids.into_iter().map(|id| json!({"id_condominio_cond": id})).collect();
            (StatusCode::OK, Json(Value::Array(rows)))
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"msg": "listing disabled"}))),
    }
}
