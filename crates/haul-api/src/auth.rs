//! # Authentication Middleware and Tenant Context
//!
//! Bearer-token authentication for API endpoints, with the token compared
//! in constant time. Health probes and `/metrics` are mounted outside this
//! middleware and remain unauthenticated.
//!
//! Token issuance and tenant resolution are the identity collaborator's
//! job: it terminates the JWT at the gateway and forwards the resolved
//! tenant and actor as headers. The core trusts those headers and never
//! a tenant id found in a request body.

use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

use haul_state::ActorKind;

use crate::error::AppError;

/// Header carrying the tenant resolved by the identity collaborator.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Header carrying the acting principal kind (`user`, `driver`, `system`).
pub const ACTOR_HEADER: &str = "x-actor";
/// Header carrying the acting principal's subject identifier.
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// A secret that zeroizes its memory on drop and never appears in Debug output.
#[derive(Clone)]
pub struct SecretString {
    inner: Zeroizing<String>,
}

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: &str) -> Self {
        Self {
            inner: Zeroizing::new(value.to_string()),
        }
    }

    /// Constant-time equality against a candidate value.
    ///
    /// Length is checked first; only equal-length comparisons reach the
    /// constant-time byte compare.
    pub fn ct_eq(&self, candidate: &str) -> bool {
        let secret = self.inner.as_bytes();
        let candidate = candidate.as_bytes();
        if secret.len() != candidate.len() {
            return false;
        }
        secret.ct_eq(candidate).into()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

/// Authentication configuration injected as a request extension.
///
/// When `token` is `None`, authentication is disabled (development and
/// tests only).
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
}

/// The authenticated request context: who is acting, for which tenant.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Tenant every store lookup is scoped to.
    pub tenant_id: Uuid,
    /// The kind of principal acting on this request.
    pub actor: ActorKind,
    /// Opaque subject identifier of the principal.
    pub subject: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("missing tenant context".to_string()))
    }
}

/// Middleware enforcing bearer-token auth and attaching the tenant context.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if let Some(expected) = &config.token {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match presented {
            Some(token) if expected.ct_eq(token) => {}
            _ => {
                return AppError::Unauthorized("missing or invalid bearer token".to_string())
                    .into_response();
            }
        }
    }

    let context = context_from_headers(&request);
    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Build the tenant context from gateway-forwarded headers.
///
/// Absent or malformed headers fall back to the nil tenant and a `user`
/// actor, single-tenant deployments run without the gateway entirely.
fn context_from_headers(request: &Request) -> TenantContext {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let tenant_id = header(TENANT_HEADER)
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .unwrap_or(Uuid::nil());

    let actor = match header(ACTOR_HEADER).as_deref() {
        Some("driver") => ActorKind::Driver,
        Some("system") => ActorKind::System,
        _ => ActorKind::User,
    };

    let subject = header(PRINCIPAL_HEADER).unwrap_or_else(|| "anonymous".to_string());

    TenantContext {
        tenant_id,
        actor,
        subject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_ct_eq_matches_equal_values() {
        let secret = SecretString::new("dispatch-token-1");
        assert!(secret.ct_eq("dispatch-token-1"));
    }

    #[test]
    fn secret_ct_eq_rejects_different_values() {
        let secret = SecretString::new("dispatch-token-1");
        assert!(!secret.ct_eq("dispatch-token-2"));
        assert!(!secret.ct_eq("dispatch-token-1x"));
        assert!(!secret.ct_eq(""));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretString::new("super-secret");
        let out = format!("{secret:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("redacted"));
    }

    #[test]
    fn context_defaults_without_headers() {
        let request = Request::builder().body(axum::body::Body::empty()).unwrap();
        let ctx = context_from_headers(&request);
        assert_eq!(ctx.tenant_id, Uuid::nil());
        assert_eq!(ctx.actor, ActorKind::User);
        assert_eq!(ctx.subject, "anonymous");
    }

    #[test]
    fn context_reads_gateway_headers() {
        let tenant = Uuid::new_v4();
        let request = Request::builder()
            .header(TENANT_HEADER, tenant.to_string())
            .header(ACTOR_HEADER, "driver")
            .header(PRINCIPAL_HEADER, "d-100")
            .body(axum::body::Body::empty())
            .unwrap();
        let ctx = context_from_headers(&request);
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.actor, ActorKind::Driver);
        assert_eq!(ctx.subject, "d-100");
    }

    #[test]
    fn malformed_tenant_header_falls_back_to_nil() {
        let request = Request::builder()
            .header(TENANT_HEADER, "not-a-uuid")
            .body(axum::body::Body::empty())
            .unwrap();
        let ctx = context_from_headers(&request);
        assert_eq!(ctx.tenant_id, Uuid::nil());
    }
}
