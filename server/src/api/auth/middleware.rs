//! Authentication middleware

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::{AdminAuth, TenantAuth, TenantId};

/// Authentication error response
///
/// Every credential failure renders the same 401 body so callers cannot
/// tell an unknown key from a revoked one or an inactive tenant.
#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub error: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "unauthorized",
            code: "UNAUTHORIZED",
            message: "Missing or invalid credentials".to_string(),
        }
    }

    /// Key store unreachable; not a verdict on the credential
    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "service_unavailable",
            code: "AUTH_UNAVAILABLE",
            message: "Authentication backend unavailable".to_string(),
        }
    }

    /// gRPC equivalent for the export handler
    pub fn into_status(self) -> tonic::Status {
        if self.status == StatusCode::UNAUTHORIZED {
            tonic::Status::unauthenticated(self.error)
        } else {
            tonic::Status::unavailable(self.message)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.error,
                "code": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

/// Owned copy so no borrow of the request is held across an await
fn authorization(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Resolve the caller's tenant and attach it as a [`TenantId`] extension
pub async fn require_tenant(
    State(auth): State<Arc<TenantAuth>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = authorization(&request);
    let tenant_id = auth.authenticate(header.as_deref()).await?;
    request.extensions_mut().insert(TenantId(tenant_id));
    Ok(next.run(request).await)
}

/// Gate for the provisioning endpoints
pub async fn require_admin(
    State(admin): State<Arc<AdminAuth>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !admin.verify(authorization(&request).as_deref()) {
        tracing::debug!(uri = %request.uri(), "Rejected admin request");
        return Err(AuthError::unauthorized());
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_status() {
        assert_eq!(
            AuthError::unauthorized().into_status().code(),
            tonic::Code::Unauthenticated
        );
        assert_eq!(
            AuthError::unavailable().into_status().code(),
            tonic::Code::Unavailable
        );
    }

    #[test]
    fn test_unauthorized_response() {
        let response = AuthError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
