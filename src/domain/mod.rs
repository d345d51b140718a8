pub mod lead;
pub mod mask;
pub mod ports;
pub mod scenario;

pub use lead::{Lead, MemberRecord, MembershipStatus, Origin, PartnerStatus, PartnerUser, SsoToken};
pub use mask::{digits_only, first_name, mask_email, mask_tax_id, normalize_email};
pub use ports::{
    LeadRepository, LookupError, MembershipLookup, PartnerDirectory, PartnerError, RepositoryError,
};
pub use scenario::{EmailConfirmationRequest, Scenario, ValidationRequest, ValidationResponse};
