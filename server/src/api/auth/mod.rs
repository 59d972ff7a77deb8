//! Authentication for the query, ingest and admin surfaces
//!
//! - `tenant` - bearer credential to tenant id (static secret or issued keys)
//! - `admin` - admin key check for provisioning endpoints
//! - `middleware` - axum middleware and the shared error response

mod admin;
mod middleware;
mod tenant;

pub use admin::AdminAuth;
pub use middleware::{AuthError, require_admin, require_tenant};
pub use tenant::{TenantAuth, TenantId};
