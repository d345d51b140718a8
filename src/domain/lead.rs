use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a lead entered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    LandingPage,
    EmailConfirmation,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::LandingPage => "landing_page",
            Origin::EmailConfirmation => "email_confirmation",
        }
    }
}

/// Membership verdict for the condominium side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    Error,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "PENDING",
            MembershipStatus::Approved => "APPROVED",
            MembershipStatus::Rejected => "REJECTED",
            MembershipStatus::Error => "ERROR",
        }
    }
}

/// Partner (benefits club) integration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerStatus {
    Pending,
    Registered,
    RetryPending,
    Failed,
    Revoked,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Pending => "PENDING",
            PartnerStatus::Registered => "REGISTERED",
            PartnerStatus::RetryPending => "RETRY_PENDING",
            PartnerStatus::Failed => "FAILED",
            PartnerStatus::Revoked => "REVOKED",
        }
    }

    /// Terminal states cannot be left within one request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PartnerStatus::Registered | PartnerStatus::Failed | PartnerStatus::Revoked
        )
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_advance_to(&self, next: PartnerStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        !matches!(next, PartnerStatus::Pending)
    }
}

/// Contact data returned by the membership directory for a known member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub organization_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub latency_ms: u64,
}

/// Account in the partner directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tax_id: String,
    pub phone: String,
    pub active: bool,
}

/// SSO credential issued by the partner for passwordless login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoToken {
    pub token: String,
    #[serde(alias = "redirect_url")]
    pub redirect: String,
}

/// A person attempting validation. Built fresh for every request, mutated
/// through the decision pipeline and persisted once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub tax_id: String,
    pub organization_id: String,

    pub name: String,
    pub email: String,
    pub phone: String,

    pub membership_status: MembershipStatus,
    pub origin: Origin,

    pub primary_lookup_found: bool,
    pub primary_lookup_latency_ms: u64,

    partner_status: PartnerStatus,
    pub partner_user_id: Option<String>,
    pub partner_error: Option<String>,
    pub partner_latency_ms: u64,
    pub partner_attempts: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(tax_id: impl Into<String>, organization_id: impl Into<String>, origin: Origin) -> Self {
        let now = Utc::now();
        Self {
            tax_id: tax_id.into(),
            organization_id: organization_id.into(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            membership_status: MembershipStatus::Pending,
            origin,
            primary_lookup_found: false,
            primary_lookup_latency_ms: 0,
            partner_status: PartnerStatus::Pending,
            partner_user_id: None,
            partner_error: None,
            partner_latency_ms: 0,
            partner_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy contact data from a positive membership lookup. Contact fields are
    /// only ever populated together with the found flag.
    pub fn apply_member(&mut self, member: &MemberRecord) {
        self.name = member.name.clone();
        self.email = member.email.clone();
        self.phone = member.phone.clone();
        self.primary_lookup_found = true;
        self.primary_lookup_latency_ms = member.latency_ms;
        self.touch();
    }

    /// Reset the primary lookup to "not found", dropping any contact data
    pub fn clear_member(&mut self) {
        self.name.clear();
        self.email.clear();
        self.phone.clear();
        self.primary_lookup_found = false;
        self.touch();
    }

    pub fn partner_status(&self) -> PartnerStatus {
        self.partner_status
    }

    /// Move the partner status forward. Returns false (and leaves the status
    /// untouched) when the transition would go backwards or leave a terminal state.
    pub fn advance_partner_status(&mut self, next: PartnerStatus) -> bool {
        if !self.partner_status.can_advance_to(next) {
            tracing::debug!(
                from = self.partner_status.as_str(),
                to = next.as_str(),
                "ignoring backward partner status transition"
            );
            return false;
        }
        self.partner_status = next;
        self.touch();
        true
    }

    pub fn set_membership_status(&mut self, status: MembershipStatus) {
        self.membership_status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
