use async_trait::async_trait;
use thiserror::Error;

use crate::domain::lead::{Lead, MemberRecord, PartnerUser, SsoToken};

/// Errors from the membership (condominium) directory
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("membership directory unreachable: {0}")]
    Transport(String),

    #[error("membership directory returned HTTP {0}")]
    Status(u16),

    #[error("membership directory response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Decode(err.to_string())
        } else {
            LookupError::Transport(err.to_string())
        }
    }
}

/// Errors from the partner (benefits club) directory
#[derive(Debug, Error)]
pub enum PartnerError {
    #[error("partner authentication failed: {0}")]
    Auth(String),

    #[error("partner rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("partner server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("partner unreachable: {0}")]
    Transport(String),

    #[error("partner response could not be decoded: {0}")]
    Decode(String),

    #[error("no partner identifier available")]
    MissingIdentifier,

    #[error("invalid partner configuration: {0}")]
    Config(String),
}

impl PartnerError {
    /// Network errors and 5xx are worth another attempt; everything else is final
    pub fn is_retryable(&self) -> bool {
        matches!(self, PartnerError::Transport(_) | PartnerError::Server { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, PartnerError::Auth(_))
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => PartnerError::Auth(format!("HTTP {}: {}", status, body)),
            400..=499 => PartnerError::Rejected { status, message: body },
            _ => PartnerError::Server { status, body },
        }
    }
}

impl From<reqwest::Error> for PartnerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PartnerError::Decode(err.to_string())
        } else {
            PartnerError::Transport(err.to_string())
        }
    }
}

/// Errors from the lead persistence sink
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Resolves whether a tax ID belongs to a known condominium member
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn validate_member(
        &self,
        organization_id: &str,
        tax_id: &str,
    ) -> Result<Option<MemberRecord>, LookupError>;
}

/// Benefits-club account directory
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    async fn find_by_tax_id(&self, tax_id: &str) -> Result<Option<PartnerUser>, PartnerError>;

    /// Creates the account for `lead`, recording the outcome on the lead's
    /// partner fields. An "already exists" answer counts as success.
    async fn register(&self, lead: &mut Lead) -> Result<(), PartnerError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), PartnerError>;

    /// `identifier` may be a partner user ID or an email address
    async fn get_sso_token(&self, identifier: &str) -> Result<SsoToken, PartnerError>;

    /// Register, then issue SSO by email with the partner ID as fallback
    async fn register_and_get_sso(&self, lead: &mut Lead) -> Result<SsoToken, PartnerError> {
        self.register(lead).await?;

        if lead.email.trim().is_empty() {
            return Err(PartnerError::MissingIdentifier);
        }

        match self.get_sso_token(lead.email.trim()).await {
            Ok(sso) => Ok(sso),
            Err(err) => match lead.partner_user_id.clone() {
                Some(id) if !id.is_empty() => {
                    tracing::warn!(error = %err, "SSO by email failed, retrying with partner id");
                    self.get_sso_token(&id).await
                }
                _ => Err(err),
            },
        }
    }
}

/// Durable audit record of every attempt
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(PartnerError::from_status(401, "").is_auth());
        assert!(PartnerError::from_status(403, "").is_auth());
        assert!(matches!(
            PartnerError::from_status(422, "bad"),
            PartnerError::Rejected { status: 422, .. }
        ));
        assert!(matches!(
            PartnerError::from_status(503, "down"),
            PartnerError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn only_transport_and_server_errors_retry() {
        assert!(PartnerError::Transport("reset".into()).is_retryable());
        assert!(PartnerError::from_status(500, "").is_retryable());
        assert!(!PartnerError::from_status(401, "").is_retryable());
        assert!(!PartnerError::from_status(422, "").is_retryable());
        assert!(!PartnerError::Decode("eof".into()).is_retryable());
        assert!(!PartnerError::MissingIdentifier.is_retryable());
    }
}
