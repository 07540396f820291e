use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use iamkit_core::{PrincipalId, TenantId};

use crate::{AuthorizationPolicy, PermissionName, Principal, RoleName, authorize};

/// Access-token claims (transport-agnostic).
///
/// Decoding and signature verification happen upstream. Roles and permissions
/// carried here were resolved when the token was issued, so a super-admin role
/// claim is honoured exactly like a resolved super-admin assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Tenant context for the token.
    pub tenant_id: TenantId,

    #[serde(default)]
    pub roles: Vec<RoleName>,

    #[serde(default)]
    pub permissions: Vec<PermissionName>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token issued for another tenant")]
    TenantMismatch,
}

/// Deterministically validate claims for use in `tenant_id` at `now`.
pub fn validate_claims(
    claims: &AccessClaims,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    if claims.tenant_id != tenant_id {
        return Err(TokenValidationError::TenantMismatch);
    }
    Ok(())
}

impl Principal {
    /// Principal as stated by already-validated claims.
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            principal_id: claims.sub,
            roles: claims.roles.iter().cloned().collect(),
            permissions: claims.permissions.iter().cloned().collect(),
        }
    }
}

/// Validate `claims` and authorize `required`. Invalid claims are a denial.
pub fn authorize_claims(
    claims: &AccessClaims,
    tenant_id: TenantId,
    now: DateTime<Utc>,
    required: &str,
    policy: &AuthorizationPolicy,
) -> bool {
    match validate_claims(claims, tenant_id, now) {
        Ok(()) => authorize(&Principal::from_claims(claims), required, policy),
        Err(error) => {
            tracing::debug!(principal_id = %claims.sub, %error, "rejecting claims");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(roles: &[&'static str], permissions: &[&'static str]) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            sub: PrincipalId::new(),
            tenant_id: TenantId::new(),
            roles: roles.iter().copied().map(RoleName::new).collect(),
            permissions: permissions.iter().copied().map(PermissionName::new).collect(),
            issued_at: now - Duration::minutes(5),
            expires_at: now + Duration::minutes(55),
        }
    }

    #[test]
    fn super_admin_claim_bypasses() {
        let c = claims(&["SuperAdmin"], &[]);
        let policy = AuthorizationPolicy::default();
        assert!(authorize_claims(&c, c.tenant_id, Utc::now(), "AnythingAtAll", &policy));
    }

    #[test]
    fn permission_claims_are_checked_exactly() {
        let c = claims(&["Admin"], &["Usuarios.Listar"]);
        let policy = AuthorizationPolicy::default();
        assert!(authorize_claims(&c, c.tenant_id, Utc::now(), "Usuarios.Listar", &policy));
        assert!(!authorize_claims(&c, c.tenant_id, Utc::now(), "Usuarios.Excluir", &policy));
    }

    #[test]
    fn expired_claims_are_denied_even_for_super_admin() {
        let c = claims(&["SuperAdmin"], &["*"]);
        let later = c.expires_at;
        let policy = AuthorizationPolicy::default();

        assert_eq!(
            validate_claims(&c, c.tenant_id, later),
            Err(TokenValidationError::Expired)
        );
        assert!(!authorize_claims(&c, c.tenant_id, later, "Usuarios.Listar", &policy));
    }

    #[test]
    fn other_tenant_is_denied() {
        let c = claims(&["SuperAdmin"], &[]);
        let policy = AuthorizationPolicy::default();
        assert!(!authorize_claims(&c, TenantId::new(), Utc::now(), "Usuarios.Listar", &policy));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut c = claims(&[], &[]);
        c.expires_at = c.issued_at;
        assert_eq!(
            validate_claims(&c, c.tenant_id, Utc::now()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn missing_role_and_permission_claims_default_to_empty() {
        let c = claims(&[], &[]);
        let json = serde_json::json!({
            "sub": c.sub,
            "tenant_id": c.tenant_id,
            "issued_at": c.issued_at,
            "expires_at": c.expires_at,
        });
        let decoded: AccessClaims = serde_json::from_value(json).unwrap();
        assert!(decoded.roles.is_empty());
        assert!(Principal::from_claims(&decoded).permissions.is_empty());
    }
}
