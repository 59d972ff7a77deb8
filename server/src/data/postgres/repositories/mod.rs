//! PostgreSQL repository modules
//!
//! - **gpu**: inventory upserts and GPU listing
//! - **tenant**: tenant CRUD for the admin surface
//! - **api_key**: key lookup, creation and revocation
//! - **usage**: daily usage counters

pub mod api_key;
pub mod gpu;
pub mod tenant;
pub mod usage;
