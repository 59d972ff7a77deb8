//! Tenant resolution and usage metering

mod resolver;
mod usage;

pub use resolver::{ResolveError, TenantResolver};
pub use usage::{UsageMeter, UsageRecorder};
