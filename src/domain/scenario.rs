use serde::{Deserialize, Serialize};

/// Outcome of reconciling the membership and partner lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    NewUser,
    ExistingUser,
    PendingEmailConfirmation,
    RevokedUser,
    NotFound,
    Error,
}

impl Scenario {
    /// Total classification over both lookup results
    pub fn classify(found_primary: bool, found_partner: bool) -> Self {
        match (found_primary, found_partner) {
            (true, false) => Scenario::NewUser,
            (true, true) => Scenario::ExistingUser,
            (false, true) => Scenario::RevokedUser,
            (false, false) => Scenario::NotFound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::NewUser => "new_user",
            Scenario::ExistingUser => "existing_user",
            Scenario::PendingEmailConfirmation => "pending_email_confirmation",
            Scenario::RevokedUser => "revoked_user",
            Scenario::NotFound => "not_found",
            Scenario::Error => "error",
        }
    }
}

/// Payload sent by the landing page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationRequest {
    pub cpf: String,
    #[serde(default)]
    pub condo_id: String,
}

/// Second step of the two-step flow
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfirmationRequest {
    pub cpf: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub condo_id: String,
}

/// Response consumed by the landing page; the frontend branches on `scenario`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub scenario: Scenario,
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sso_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub redirect_url: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_email_confirmation: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_activate_button: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_marketing: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_revoked_notice: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ValidationResponse {
    pub fn new(valid: bool, scenario: Scenario, message: impl Into<String>) -> Self {
        Self {
            valid,
            scenario,
            message: message.into(),
            name: String::new(),
            email: String::new(),
            email_hint: String::new(),
            user_id: String::new(),
            sso_token: String::new(),
            redirect_url: String::new(),
            requires_email_confirmation: false,
            show_activate_button: false,
            show_marketing: false,
            show_revoked_notice: false,
        }
    }

    /// Generic failure shape shared by every email-confirmation rejection
    pub fn rejection(message: impl Into<String>) -> Self {
        Self::new(false, Scenario::Error, message)
    }

    pub fn has_sso(&self) -> bool {
        !self.sso_token.is_empty()
    }
}
