//! Effective permission resolution.
//!
//! Resolution is a pure function of an account, a role-permission graph and a
//! point in time. Nothing here can fail: anything that cannot be followed
//! (dangling role ids, inactive endpoints, expired assignments) is skipped.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::{PrincipalRoleEdge, RolePermissionGraph};
use crate::{PermissionName, PrincipalAccount, Role};

/// Why a role assignment contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The assignment edge was soft-removed.
    AssignmentInactive,
    /// The assignment's `expires_at` is at or before the evaluation time.
    AssignmentExpired,
    /// The role exists but is deactivated.
    RoleInactive,
    /// The edge points at a role the graph does not know.
    UnknownRole,
}

/// Follow one assignment edge to its role, if the edge currently counts.
///
/// Expiry is checked independently of the soft-delete flag, so an active but
/// expired edge is still skipped.
pub fn follow_assignment<'g>(
    edge: &PrincipalRoleEdge,
    graph: &'g RolePermissionGraph,
    as_of: DateTime<Utc>,
) -> Result<&'g Role, SkipReason> {
    if !edge.active {
        return Err(SkipReason::AssignmentInactive);
    }
    if edge.is_expired_at(as_of) {
        return Err(SkipReason::AssignmentExpired);
    }
    let role = graph.role(&edge.role_id).ok_or(SkipReason::UnknownRole)?;
    if !role.active {
        return Err(SkipReason::RoleInactive);
    }
    Ok(role)
}

/// Roles currently in effect for `account`.
pub fn effective_roles<'a>(
    account: &'a PrincipalAccount,
    graph: &'a RolePermissionGraph,
    as_of: DateTime<Utc>,
) -> impl Iterator<Item = &'a Role> + 'a {
    account
        .roles
        .iter()
        .filter_map(move |edge| follow_assignment(edge, graph, as_of).ok())
}

/// Deduplicated permission names reachable through `account`'s valid roles.
pub fn effective_permissions(
    account: &PrincipalAccount,
    graph: &RolePermissionGraph,
    as_of: DateTime<Utc>,
) -> BTreeSet<PermissionName> {
    let mut permissions = BTreeSet::new();
    for role in effective_roles(account, graph, as_of) {
        permissions.extend(graph.granted_by(role.id).cloned());
    }

    tracing::trace!(
        principal_id = %account.id,
        permissions = permissions.len(),
        "resolved effective permissions"
    );

    permissions
}
