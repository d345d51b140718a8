//! Upstream HTTP clients behind the domain ports

pub mod condo_directory;
pub mod partner;
pub mod retry;
pub mod token;

pub use condo_directory::{CondoDirectoryClient, SEARCH_ALL};
pub use partner::{PartnerClient, USER_ALREADY_EXISTS};
pub use retry::RetryPolicy;
pub use token::{IssuedToken, TokenCache};
