//! Bearer credential to tenant mapping
//!
//! Shared by the HTTP middleware and the gRPC export handler so both edges
//! authenticate identically.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::AuthError;
use crate::core::AuthMode;
use crate::core::config::AuthConfig;
use crate::core::constants::DEFAULT_TENANT_ID;
use crate::domain::{ResolveError, TenantResolver};
use crate::utils::api_key::extract_bearer;
use crate::utils::crypto::constant_time_eq;

/// Tenant id attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(pub String);

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantId>()
            .cloned()
            .ok_or_else(AuthError::unauthorized)
    }
}

pub enum TenantAuth {
    /// One shared secret; `None` accepts every caller
    Static { api_key: Option<String> },
    MultiTenant(Arc<TenantResolver>),
}

impl TenantAuth {
    /// `resolver` is only consulted in multi-tenant mode
    pub fn from_config(config: &AuthConfig, resolver: Option<Arc<TenantResolver>>) -> Self {
        match (config.mode, resolver) {
            (AuthMode::MultiTenant, Some(resolver)) => Self::MultiTenant(resolver),
            _ => Self::Static {
                api_key: config.api_key.clone(),
            },
        }
    }

    /// Map an `Authorization` header value to a tenant id
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        match self {
            Self::Static { api_key: None } => Ok(DEFAULT_TENANT_ID.to_string()),
            Self::Static {
                api_key: Some(expected),
            } => {
                let token = authorization
                    .and_then(extract_bearer)
                    .ok_or_else(AuthError::unauthorized)?;
                if constant_time_eq(token, expected) {
                    Ok(DEFAULT_TENANT_ID.to_string())
                } else {
                    Err(AuthError::unauthorized())
                }
            }
            Self::MultiTenant(resolver) => {
                let token = authorization
                    .and_then(extract_bearer)
                    .ok_or_else(AuthError::unauthorized)?;
                resolver.resolve(token).await.map_err(|e| match e {
                    ResolveError::Unauthorized => AuthError::unauthorized(),
                    ResolveError::Store(e) => {
                        tracing::error!(error = %e, "Tenant lookup failed");
                        AuthError::unavailable()
                    }
                })
            }
        }
    }
}
