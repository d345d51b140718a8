use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::adapters::retry::RetryPolicy;
use crate::adapters::token::{IssuedToken, TokenCache};
use crate::config::PartnerConfig;
use crate::domain::{
    digits_only, mask_email, mask_tax_id, Lead, PartnerDirectory, PartnerError, PartnerStatus, PartnerUser,
    SsoToken,
};

/// Diagnostic stored on the lead when the partner already knows the person
pub const USER_ALREADY_EXISTS: &str = "USER_ALREADY_EXISTS";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    data: Vec<UserRow>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    cpf: String,
    #[serde(default)]
    cellphone: Option<String>,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Option<Value>,
}

enum RegisterOutcome {
    Created(Option<String>),
    AlreadyExists,
}

/// Benefits-club API client
#[derive(Debug)]
pub struct PartnerClient {
    base_url: Url,
    client_id: String,
    client_secret: String,
    fixed_token: Option<String>,
    http: Client,
    tokens: TokenCache,
    retry: RetryPolicy,
}

impl PartnerClient {
    pub fn new(config: &PartnerConfig, retry: RetryPolicy) -> Result<Self, PartnerError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| PartnerError::Config(format!("invalid base url '{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PartnerError::Config(format!("base url '{}' cannot be a base", config.base_url)));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let fixed_token = config.bearer_token.clone().filter(|t| !t.is_empty());
        let auth_mode = if fixed_token.is_some() { "fixed token" } else { "oauth2" };
        info!(url = %base_url, auth = auth_mode, "partner client initialized");

        Ok(Self {
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            fixed_token,
            http,
            tokens: TokenCache::new(Duration::from_secs(config.token_refresh_margin_secs)),
            retry,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PartnerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PartnerError::Config("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn token(&self) -> Result<String, PartnerError> {
        if let Some(token) = &self.fixed_token {
            return Ok(token.clone());
        }
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    /// OAuth2 client-credentials exchange
    async fn fetch_token(&self) -> Result<IssuedToken, PartnerError> {
        let payload = json!({
            "grant_type": "client_credentials",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "scope": "*",
        });

        let response = self
            .http
            .post(self.endpoint(&["auth"])?)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PartnerError::Auth(format!("HTTP {}: {}", status, body)));
        }

        let auth: AuthResponse = response.json().await?;
        Ok(IssuedToken {
            access_token: auth.access_token,
            expires_in: Duration::from_secs(auth.expires_in),
        })
    }

    /// Turn a non-success response into a classified error, dropping the
    /// cached token when the partner no longer accepts it
    async fn error_from(&self, response: Response) -> PartnerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status == 401 {
            self.tokens.invalidate().await;
        }
        PartnerError::from_status(status, body)
    }

    async fn post_user(&self, token: &str, payload: &Value) -> Result<RegisterOutcome, PartnerError> {
        let response = self
            .http
            .post(self.endpoint(&["users"])?)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let id = id_from_value(body.get("id"))
                .or_else(|| id_from_value(body.get("data").and_then(|d| d.get("id"))));
            return Ok(RegisterOutcome::Created(id));
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            if is_already_exists(&body) {
                return Ok(RegisterOutcome::AlreadyExists);
            }
            let message = if body.message.is_empty() { text } else { body.message };
            return Err(PartnerError::Rejected { status: 422, message });
        }

        Err(self.error_from(response).await)
    }
}

#[async_trait]
impl PartnerDirectory for PartnerClient {
    async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<PartnerUser>, PartnerError> {
        let token = self.token().await?;
        let digits = digits_only(tax_id);

        let response = self
            .http
            .get(self.endpoint(&["users"])?)
            .query(&[("search", digits.as_str()), ("limit", "5")])
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let list: UserListResponse = response.json().await?;
        let user = list
            .data
            .into_iter()
            .find(|row| digits_only(&row.cpf) == digits)
            .map(|row| PartnerUser {
                id: id_from_value(Some(&row.id)).unwrap_or_default(),
                name: row.name,
                email: row.email,
                tax_id: row.cpf,
                phone: row.cellphone.unwrap_or_default(),
                active: row.active,
            });

        match &user {
            Some(user) if user.id.is_empty() => {
                warn!(tax_id = %mask_tax_id(tax_id), "partner account has no id, it cannot be removed or used for SSO")
            }
            Some(user) => debug!(user_id = %user.id, email = %mask_email(&user.email), "partner account found"),
            None => debug!(tax_id = %mask_tax_id(tax_id), "no partner account"),
        }

        Ok(user)
    }

    async fn register(&self, lead: &mut Lead) -> Result<(), PartnerError> {
        let token = match self.token().await {
            Ok(token) => token,
            Err(err) => {
                lead.partner_error = Some(format!("AUTH_ERROR: {}", err));
                lead.advance_partner_status(PartnerStatus::Failed);
                return Err(err);
            }
        };

        let payload = registration_payload(lead);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            lead.partner_attempts += 1;
            let outcome = self.post_user(&token, &payload).await;
            lead.partner_latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(RegisterOutcome::Created(id)) => {
                    if let Some(id) = id {
                        lead.partner_user_id = Some(id);
                    }
                    lead.partner_error = None;
                    lead.advance_partner_status(PartnerStatus::Registered);
                    info!(user_id = ?lead.partner_user_id, attempt, "partner account created");
                    return Ok(());
                }
                Ok(RegisterOutcome::AlreadyExists) => {
                    lead.partner_error = Some(USER_ALREADY_EXISTS.to_string());
                    lead.advance_partner_status(PartnerStatus::Registered);
                    info!(tax_id = %mask_tax_id(&lead.tax_id), "partner account already exists");
                    return Ok(());
                }
                Err(err) if self.retry.should_retry(attempt, &err) => {
                    let delay = self.retry.delay_after(attempt);
                    lead.partner_error = Some(diagnostic(&err));
                    lead.advance_partner_status(PartnerStatus::RetryPending);
                    warn!(attempt, ?delay, error = %err, "partner registration failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    lead.partner_error = Some(diagnostic(&err));
                    lead.advance_partner_status(PartnerStatus::Failed);
                    warn!(attempt, error = %err, "partner registration failed");
                    return Err(err);
                }
            }
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), PartnerError> {
        if user_id.is_empty() {
            return Err(PartnerError::MissingIdentifier);
        }
        let token = self.token().await?;

        let response = self
            .http
            .delete(self.endpoint(&["users", user_id])?)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!(user_id, status = status.as_u16(), "partner account removed");
            return Ok(());
        }

        Err(self.error_from(response).await)
    }

    async fn get_sso_token(&self, identifier: &str) -> Result<SsoToken, PartnerError> {
        if identifier.is_empty() {
            return Err(PartnerError::MissingIdentifier);
        }
        let token = self.token().await?;

        let response = self
            .http
            .get(self.endpoint(&["sso-token"])?)
            .query(&[("user_id", identifier)])
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let sso: SsoToken = response.json().await?;
        debug!(redirect = %sso.redirect, "SSO token issued");
        Ok(sso)
    }
}

/// Body for account creation. The account is activated immediately.
fn registration_payload(lead: &Lead) -> Value {
    let cpf: String = digits_only(&lead.tax_id).chars().take(11).collect();
    let mut payload = json!({
        "name": lead.name.trim(),
        "email": lead.email.trim(),
        "cpf": cpf,
        "authorized": true,
    });
    if let Some(cellphone) = format_cellphone(&lead.phone) {
        payload["cellphone"] = Value::String(cellphone);
    }
    payload
}

/// `(XX) 9XXXX-XXXX` for 11-digit mobile numbers; anything else is dropped
fn format_cellphone(phone: &str) -> Option<String> {
    let digits = digits_only(phone);
    if digits.len() != 11 || digits.as_bytes()[2] != b'9' {
        return None;
    }
    Some(format!("({}) {}-{}", &digits[0..2], &digits[2..7], &digits[7..11]))
}

fn is_already_exists(body: &ErrorBody) -> bool {
    let mut fragments = vec![body.message.to_lowercase()];
    if let Some(errors) = &body.errors {
        collect_strings(errors, &mut fragments);
    }
    fragments.iter().any(|fragment| says_already_exists(fragment))
}

/// One lowercase error line naming a duplicate account
fn says_already_exists(text: &str) -> bool {
    if ["não ", "nao ", "not "].iter().any(|negation| text.contains(negation)) {
        return false;
    }
    let duplicate = ["já existe", "ja existe", "already exists", "already been taken", "already registered"]
        .iter()
        .any(|phrase| text.contains(phrase));
    let registered = text.contains("cadastrad") && (text.contains("email") || text.contains("cpf"));
    duplicate || registered
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.to_lowercase()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn id_from_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Short machine-readable reason stored in `partner_error`
fn diagnostic(err: &PartnerError) -> String {
    match err {
        PartnerError::Auth(msg) => format!("AUTH_ERROR: {}", msg),
        PartnerError::Rejected { status: 422, message } => format!("VALIDATION_ERROR: {}", message),
        PartnerError::Rejected { status, message } => format!("HTTP_{}: {}", status, message),
        PartnerError::Server { status, body } => format!("HTTP_{}: {}", status, body),
        PartnerError::Transport(msg) => format!("NETWORK_ERROR: {}", msg),
        PartnerError::Decode(msg) => format!("DECODE_ERROR: {}", msg),
        PartnerError::MissingIdentifier | PartnerError::Config(_) => err.to_string(),
    }
}
