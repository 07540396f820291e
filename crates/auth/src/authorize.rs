use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use iamkit_core::{PrincipalId, RoleId};

use crate::graph::RolePermissionGraph;
use crate::resolve::{SkipReason, effective_roles, follow_assignment};
use crate::{AuthorizationPolicy, PermissionName, PrincipalAccount, RoleName};

/// A fully resolved principal for authorization decisions.
///
/// Built either from a stored account plus its role-permission graph
/// ([`Principal::resolve`]) or from validated token claims. Decisions never
/// look anywhere else, so the evaluator runs the same inside a request, a
/// background job or a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub roles: BTreeSet<RoleName>,
    pub permissions: BTreeSet<PermissionName>,
}

impl Principal {
    /// Principal with no roles and no permissions.
    pub fn anonymous(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
        }
    }

    /// Resolve roles and effective permissions of `account` at `as_of`.
    ///
    /// A deactivated account resolves to no roles and no permissions.
    pub fn resolve(
        account: &PrincipalAccount,
        graph: &RolePermissionGraph,
        as_of: DateTime<Utc>,
    ) -> Self {
        if !account.active {
            return Self::anonymous(account.id);
        }

        let mut roles = BTreeSet::new();
        let mut permissions = BTreeSet::new();
        for role in effective_roles(account, graph, as_of) {
            roles.insert(role.name.clone());
            permissions.extend(graph.granted_by(role.id).cloned());
        }

        Self {
            principal_id: account.id,
            roles,
            permissions,
        }
    }

    pub fn has_role(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }
}

/// Which rule produced a decision (first match wins, in this order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "via", rename_all = "snake_case")]
pub enum DecisionBasis {
    SuperAdmin,
    Wildcard(PermissionName),
    Explicit,
    Missing,
}

impl DecisionBasis {
    pub fn is_granted(&self) -> bool {
        !matches!(self, DecisionBasis::Missing)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Evaluate the decision rules for `required`.
///
/// - No IO
/// - No panics
/// - Unknown or malformed names simply fail to match
pub fn decide(principal: &Principal, required: &str, policy: &AuthorizationPolicy) -> DecisionBasis {
    if principal.has_role(policy.super_admin_role()) {
        return DecisionBasis::SuperAdmin;
    }

    if let Some(wildcard) = principal.permissions.iter().find(|p| policy.is_wildcard(p)) {
        return DecisionBasis::Wildcard(wildcard.clone());
    }

    if principal.permissions.iter().any(|p| p.as_str() == required) {
        DecisionBasis::Explicit
    } else {
        DecisionBasis::Missing
    }
}

/// May `principal` perform `required`?
pub fn authorize(principal: &Principal, required: &str, policy: &AuthorizationPolicy) -> bool {
    let basis = decide(principal, required, policy);
    if !basis.is_granted() {
        tracing::debug!(
            principal_id = %principal.principal_id,
            required,
            "authorization denied"
        );
    }
    basis.is_granted()
}

/// [`authorize`] as a `Result`, for call sites that propagate with `?`.
pub fn require(
    principal: &Principal,
    required: &str,
    policy: &AuthorizationPolicy,
) -> Result<(), AuthzError> {
    if authorize(principal, required, policy) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Callers log this next to the decision; the engine itself never writes audit
/// records.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub principal_id: PrincipalId,
    pub required_permission: String,
    pub granted: bool,
    pub basis: DecisionBasis,
    pub account_active: bool,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    /// Assignments that were present but did not count.
    pub skipped: Vec<SkippedAssignment>,
    /// Active roles in the graph that would grant the missing permission
    /// (directly, via a wildcard, or as the super-admin role).
    pub granting_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedAssignment {
    pub role_id: RoleId,
    pub role_name: Option<String>,
    pub reason: SkipReason,
}

/// Explain why a decision was made (or would be made) for `account`.
pub fn explain(
    account: &PrincipalAccount,
    graph: &RolePermissionGraph,
    policy: &AuthorizationPolicy,
    as_of: DateTime<Utc>,
    required: &str,
) -> AuthorizationExplanation {
    let principal = Principal::resolve(account, graph, as_of);
    let basis = decide(&principal, required, policy);

    let skipped = account
        .roles
        .iter()
        .filter_map(|edge| {
            follow_assignment(edge, graph, as_of)
                .err()
                .map(|reason| SkippedAssignment {
                    role_id: edge.role_id,
                    role_name: graph.role(&edge.role_id).map(|r| r.name.to_string()),
                    reason,
                })
        })
        .collect();

    let granting_roles = if basis.is_granted() {
        Vec::new()
    } else {
        let mut names: Vec<String> = graph
            .roles()
            .filter(|role| role.active)
            .filter(|role| {
                policy.is_super_admin_role(&role.name)
                    || graph
                        .granted_by(role.id)
                        .any(|p| p.as_str() == required || policy.is_wildcard(p))
            })
            .map(|role| role.name.to_string())
            .collect();
        names.sort();
        names
    };

    AuthorizationExplanation {
        principal_id: account.id,
        required_permission: required.to_string(),
        granted: basis.is_granted(),
        basis,
        account_active: account.active,
        roles: principal.roles.iter().map(|r| r.to_string()).collect(),
        effective_permissions: principal.permissions.iter().map(|p| p.to_string()).collect(),
        skipped,
        granting_roles,
    }
}
