use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ActivationMode, AppConfig};
use crate::domain::{
    first_name, mask_email, mask_tax_id, normalize_email, Lead, LeadRepository, MembershipLookup,
    MembershipStatus, Origin, PartnerDirectory, PartnerStatus, PartnerUser, Scenario, SsoToken,
    ValidationResponse,
};

/// Classified scenario together with the response sent to the caller.
/// In two-step mode the response scenario is `PendingEmailConfirmation`
/// while `scenario` keeps the classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub scenario: Scenario,
    pub response: ValidationResponse,
}

/// Reconciles the membership directory with the partner directory
pub struct ValidationService {
    config: Arc<AppConfig>,
    membership: Arc<dyn MembershipLookup>,
    partner: Arc<dyn PartnerDirectory>,
    repository: Arc<dyn LeadRepository>,
}

impl ValidationService {
    pub fn new(
        config: Arc<AppConfig>,
        membership: Arc<dyn MembershipLookup>,
        partner: Arc<dyn PartnerDirectory>,
        repository: Arc<dyn LeadRepository>,
    ) -> Self {
        Self {
            config,
            membership,
            partner,
            repository,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn activation_mode(&self) -> ActivationMode {
        self.config.activation.mode
    }

    /// Run both lookups, classify, and execute exactly one scenario handler
    pub async fn evaluate(&self, tax_id: &str, organization_id: &str) -> Evaluation {
        let span = info_span!(
            "evaluate",
            request_id = %Uuid::new_v4(),
            tax_id = %mask_tax_id(tax_id),
            organization_id = %organization_id,
        );

        async move {
            let mut lead = Lead::new(tax_id, organization_id, Origin::LandingPage);

            self.lookup_member(&mut lead).await;
            let partner_user = self.lookup_partner(tax_id).await;

            let scenario = Scenario::classify(lead.primary_lookup_found, partner_user.is_some());
            info!(scenario = scenario.as_str(), mode = ?self.activation_mode(), "lookups classified");

            let response = match (lead.primary_lookup_found, partner_user) {
                (true, None) => self.handle_new_user(&mut lead).await,
                (true, Some(user)) => self.handle_existing_user(&mut lead, &user).await,
                (false, Some(user)) => self.handle_revoked_user(&mut lead, &user).await,
                (false, None) => self.handle_not_found(&mut lead),
            };

            self.persist(&lead).await;
            Evaluation { scenario, response }
        }
        .instrument(span)
        .await
    }

    /// Second step: verify the supplied email before registering and issuing SSO
    pub async fn confirm_email(
        &self,
        tax_id: &str,
        organization_id: &str,
        supplied_email: &str,
    ) -> ValidationResponse {
        let span = info_span!(
            "confirm_email",
            request_id = %Uuid::new_v4(),
            tax_id = %mask_tax_id(tax_id),
            organization_id = %organization_id,
        );

        async move {
            let mut lead = Lead::new(tax_id, organization_id, Origin::EmailConfirmation);
            let response = self.run_confirmation(&mut lead, supplied_email).await;
            self.persist(&lead).await;
            response
        }
        .instrument(span)
        .await
    }

    async fn run_confirmation(&self, lead: &mut Lead, supplied_email: &str) -> ValidationResponse {
        let messages = &self.config.messages;

        match self.membership.validate_member(&lead.organization_id, &lead.tax_id).await {
            Ok(Some(member)) => lead.apply_member(&member),
            Ok(None) => {
                lead.set_membership_status(MembershipStatus::Rejected);
                info!("confirmation for unknown tax id");
                return ValidationResponse::rejection(&messages.confirmation_restart);
            }
            Err(err) => {
                lead.set_membership_status(MembershipStatus::Error);
                warn!(error = %err, "membership lookup failed during confirmation");
                return ValidationResponse::rejection(&messages.confirmation_restart);
            }
        }

        let expected = normalize_email(&lead.email);
        if expected.is_empty() || normalize_email(supplied_email) != expected {
            lead.set_membership_status(MembershipStatus::Rejected);
            warn!(
                supplied = %mask_email(supplied_email),
                expected = %mask_email(&lead.email),
                "email confirmation mismatch"
            );
            return ValidationResponse::rejection(&messages.email_mismatch);
        }

        lead.set_membership_status(MembershipStatus::Approved);
        info!(email = %mask_email(&lead.email), "email confirmed");

        match self.lookup_partner(&lead.tax_id).await {
            None => {
                if let Err(err) = self.partner.register(lead).await {
                    warn!(error = %err, status = lead.partner_status().as_str(), "registration failed after confirmation");
                    return self.manual_activation(lead, Scenario::NewUser, &messages.activation_manual);
                }
                let id = lead.partner_user_id.clone().unwrap_or_default();
                let email = lead.email.clone();
                let sso = self.issue_sso(&id, &email).await;
                self.activated(lead, Scenario::NewUser, sso, messages.activation_success.clone())
            }
            Some(user) => {
                lead.partner_user_id = Some(user.id.clone());
                lead.advance_partner_status(PartnerStatus::Registered);
                let sso = self.issue_sso(&user.email, &user.id).await;
                let greeting = messages.welcome_back_for(first_name(&lead.name));
                self.activated(lead, Scenario::ExistingUser, sso, greeting)
            }
        }
    }

    async fn lookup_member(&self, lead: &mut Lead) {
        match self.membership.validate_member(&lead.organization_id, &lead.tax_id).await {
            Ok(Some(member)) => {
                lead.apply_member(&member);
                debug!(latency_ms = member.latency_ms, "member found");
            }
            Ok(None) => lead.clear_member(),
            Err(err) => {
                lead.clear_member();
                lead.set_membership_status(MembershipStatus::Error);
                warn!(error = %err, "membership lookup failed, treating as not found");
            }
        }
    }

    async fn lookup_partner(&self, tax_id: &str) -> Option<PartnerUser> {
        match self.partner.find_by_tax_id(tax_id).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "partner lookup failed, treating as not found");
                None
            }
        }
    }

    async fn handle_new_user(&self, lead: &mut Lead) -> ValidationResponse {
        let messages = &self.config.messages;

        match self.activation_mode() {
            ActivationMode::TwoStep => {
                lead.set_membership_status(MembershipStatus::Pending);
                self.pending_confirmation(lead, &messages.confirm_email_new)
            }
            ActivationMode::Direct => {
                lead.set_membership_status(MembershipStatus::Approved);
                if let Err(err) = self.partner.register(lead).await {
                    warn!(error = %err, status = lead.partner_status().as_str(), "registration failed");
                    return self.manual_activation(lead, Scenario::NewUser, &messages.activation_manual);
                }
                let id = lead.partner_user_id.clone().unwrap_or_default();
                let email = lead.email.clone();
                let sso = self.issue_sso(&id, &email).await;
                self.activated(lead, Scenario::NewUser, sso, messages.activation_success.clone())
            }
        }
    }

    async fn handle_existing_user(&self, lead: &mut Lead, user: &PartnerUser) -> ValidationResponse {
        let messages = &self.config.messages;
        lead.partner_user_id = Some(user.id.clone());

        match self.activation_mode() {
            ActivationMode::TwoStep => {
                lead.set_membership_status(MembershipStatus::Pending);
                let mut response = self.pending_confirmation(lead, &messages.confirm_email_existing);
                response.user_id = user.id.clone();
                response
            }
            ActivationMode::Direct => {
                lead.set_membership_status(MembershipStatus::Approved);
                lead.advance_partner_status(PartnerStatus::Registered);
                let sso = self.issue_sso(&user.id, &user.email).await;
                let name = if lead.name.is_empty() { &user.name } else { &lead.name };
                let greeting = messages.welcome_back_for(first_name(name));
                let mut response = self.activated(lead, Scenario::ExistingUser, sso, greeting);
                response.user_id = user.id.clone();
                response
            }
        }
    }

    async fn handle_revoked_user(&self, lead: &mut Lead, user: &PartnerUser) -> ValidationResponse {
        lead.partner_user_id = Some(user.id.clone()).filter(|id| !id.is_empty());

        match self.partner.delete_user(&user.id).await {
            Ok(()) => info!(user_id = %user.id, "partner access revoked"),
            Err(err) => {
                lead.partner_error = Some(err.to_string());
                warn!(user_id = %user.id, error = %err, "partner account deletion failed");
            }
        }

        lead.advance_partner_status(PartnerStatus::Revoked);
        lead.set_membership_status(MembershipStatus::Rejected);

        let mut response = ValidationResponse::new(false, Scenario::RevokedUser, &self.config.messages.revoked);
        response.show_revoked_notice = true;
        response
    }

    fn handle_not_found(&self, lead: &mut Lead) -> ValidationResponse {
        lead.clear_member();
        lead.set_membership_status(MembershipStatus::Rejected);

        let mut response = ValidationResponse::new(false, Scenario::NotFound, &self.config.messages.not_found);
        response.show_marketing = true;
        response
    }

    fn pending_confirmation(&self, lead: &Lead, message: &str) -> ValidationResponse {
        let mut response = ValidationResponse::new(true, Scenario::PendingEmailConfirmation, message);
        response.name = first_name(&lead.name).to_string();
        response.email_hint = mask_email(&lead.email);
        response.requires_email_confirmation = true;
        response
    }

    fn manual_activation(&self, lead: &Lead, scenario: Scenario, message: &str) -> ValidationResponse {
        let mut response = ValidationResponse::new(true, scenario, message);
        response.name = first_name(&lead.name).to_string();
        response.show_activate_button = true;
        response
    }

    /// Success response; without an SSO token the member is told the
    /// account is active and offered the manual activation button
    fn activated(
        &self,
        lead: &Lead,
        scenario: Scenario,
        sso: Option<SsoToken>,
        message: String,
    ) -> ValidationResponse {
        let Some(sso) = sso else {
            return self.manual_activation(lead, scenario, &self.config.messages.account_active);
        };

        let mut response = ValidationResponse::new(true, scenario, message);
        response.name = first_name(&lead.name).to_string();
        if lead.origin == Origin::LandingPage {
            response.email = lead.email.clone();
        }
        response.user_id = lead.partner_user_id.clone().unwrap_or_default();
        response.sso_token = sso.token;
        response.redirect_url = sso.redirect;
        response
    }

    /// SSO by `primary`, then by `fallback`. Empty identifiers are skipped.
    async fn issue_sso(&self, primary: &str, fallback: &str) -> Option<SsoToken> {
        let primary = primary.trim();
        let fallback = fallback.trim();

        let mut identifiers = vec![primary];
        if fallback != primary {
            identifiers.push(fallback);
        }

        for identifier in identifiers.into_iter().filter(|id| !id.is_empty()) {
            match self.partner.get_sso_token(identifier).await {
                Ok(sso) => return Some(sso),
                Err(err) => warn!(error = %err, "SSO issuance failed"),
            }
        }
        None
    }

    /// Best effort. Errors are logged and never reach the caller.
    async fn persist(&self, lead: &Lead) {
        if let Err(err) = self.repository.save(lead).await {
            warn!(
                key = %format!("{}_{}", lead.organization_id, mask_tax_id(&lead.tax_id)),
                error = %err,
                "failed to persist lead"
            );
        }
    }
}
