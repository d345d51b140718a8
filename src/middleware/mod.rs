pub mod response;
pub mod security;
pub mod tenant;

pub use response::ApiResponse;
pub use security::security_headers_middleware;
pub use tenant::{resolve_tenant_middleware, TenantOrganization};
