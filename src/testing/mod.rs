//! In-memory collaborators for service tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapters::USER_ALREADY_EXISTS;
use crate::domain::{
    Lead, LeadRepository, LookupError, MemberRecord, MembershipLookup, PartnerDirectory, PartnerError,
    PartnerStatus, PartnerUser, RepositoryError, SsoToken,
};

pub fn member(name: &str, email: &str) -> MemberRecord {
    MemberRecord {
        organization_id: "4".to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: "11988887777".to_string(),
        latency_ms: 12,
    }
}

pub fn partner_user(id: &str, email: &str) -> PartnerUser {
    PartnerUser {
        id: id.to_string(),
        name: "Ana Souza".to_string(),
        email: email.to_string(),
        tax_id: "12345678900".to_string(),
        phone: String::new(),
        active: true,
    }
}

/// Membership lookup with a fixed answer
#[derive(Debug, Default)]
pub struct StubMembership {
    member: Option<MemberRecord>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubMembership {
    pub fn found(member: MemberRecord) -> Self {
        Self {
            member: Some(member),
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipLookup for StubMembership {
    async fn validate_member(
        &self,
        _organization_id: &str,
        _tax_id: &str,
    ) -> Result<Option<MemberRecord>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LookupError::Transport("connection refused".to_string()));
        }
        Ok(self.member.clone())
    }
}

#[derive(Debug, Clone)]
pub enum RegisterBehavior {
    Created(String),
    AlreadyExists,
    Rejected(u16),
    Unavailable,
}

/// Partner directory that records every call
#[derive(Debug)]
pub struct StubPartner {
    user: Option<PartnerUser>,
    find_fails: bool,
    register: RegisterBehavior,
    sso_fails: bool,
    pub registrations: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub sso_requests: Mutex<Vec<String>>,
}

impl Default for StubPartner {
    fn default() -> Self {
        Self {
            user: None,
            find_fails: false,
            register: RegisterBehavior::Created("new-1".to_string()),
            sso_fails: false,
            registrations: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            sso_requests: Mutex::new(Vec::new()),
        }
    }
}

impl StubPartner {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_user(user: PartnerUser) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    pub fn failing_lookup() -> Self {
        Self {
            find_fails: true,
            ..Self::default()
        }
    }

    pub fn register_behavior(mut self, behavior: RegisterBehavior) -> Self {
        self.register = behavior;
        self
    }

    pub fn failing_sso(mut self) -> Self {
        self.sso_fails = true;
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn sso_requests(&self) -> Vec<String> {
        self.sso_requests.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Any call besides the initial account lookup
    pub fn side_effects(&self) -> usize {
        self.registrations() + self.deleted().len() + self.sso_requests().len()
    }
}

#[async_trait]
impl PartnerDirectory for StubPartner {
    async fn find_by_tax_id(&self, _tax_id: &str) -> Result<Option<PartnerUser>, PartnerError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.find_fails {
            return Err(PartnerError::Transport("timed out".to_string()));
        }
        Ok(self.user.clone())
    }

    async fn register(&self, lead: &mut Lead) -> Result<(), PartnerError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        lead.partner_attempts += 1;
        match &self.register {
            RegisterBehavior::Created(id) => {
                lead.partner_user_id = Some(id.clone());
                lead.advance_partner_status(PartnerStatus::Registered);
                Ok(())
            }
            RegisterBehavior::AlreadyExists => {
                lead.partner_error = Some(USER_ALREADY_EXISTS.to_string());
                lead.advance_partner_status(PartnerStatus::Registered);
                Ok(())
            }
            RegisterBehavior::Rejected(status) => {
                let err = PartnerError::from_status(*status, "rejected");
                lead.partner_error = Some(err.to_string());
                lead.advance_partner_status(PartnerStatus::Failed);
                Err(err)
            }
            RegisterBehavior::Unavailable => {
                let err = PartnerError::Server {
                    status: 503,
                    body: "unavailable".to_string(),
                };
                lead.partner_error = Some(err.to_string());
                lead.advance_partner_status(PartnerStatus::RetryPending);
                lead.advance_partner_status(PartnerStatus::Failed);
                Err(err)
            }
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), PartnerError> {
        if user_id.is_empty() {
            return Err(PartnerError::MissingIdentifier);
        }
        self.deleted.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn get_sso_token(&self, identifier: &str) -> Result<SsoToken, PartnerError> {
        self.sso_requests.lock().unwrap().push(identifier.to_string());
        if self.sso_fails {
            return Err(PartnerError::Server {
                status: 500,
                body: "sso down".to_string(),
            });
        }
        Ok(SsoToken {
            token: format!("sso-{}", identifier),
            redirect: format!("https://club.example.com/sso?user={}", identifier),
        })
    }
}

/// Lead store keeping every saved record in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    fail: bool,
    saved: Mutex<Vec<Lead>>,
}

impl MemoryRepository {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<Lead> {
        self.saved.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Lead> {
        self.saved.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LeadRepository for MemoryRepository {
    async fn save(&self, lead: &Lead) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.saved.lock().unwrap().push(lead.clone());
        Ok(())
    }
}
