//! Role ↔ permission graph and the association edges shared with principals.
//!
//! Associations are never duplicated: removing one flips `active` off, and
//! assigning it again reactivates the same edge with a fresh `assigned_at`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamkit_core::{DomainError, DomainResult, PermissionId, PrincipalId, RoleId};

use crate::{Permission, PermissionName, Role, RoleName};

// ─────────────────────────────────────────────────────────────────────────────
// Association edges
// ─────────────────────────────────────────────────────────────────────────────

/// Soft-deletable association keyed by a composite identity.
pub trait AssociationEdge {
    type Key: Copy + Eq;

    fn key(&self) -> Self::Key;

    fn is_active(&self) -> bool;

    /// Whether the edge currently counts. Edges that can lapse override this.
    fn is_in_effect(&self, _as_of: DateTime<Utc>) -> bool {
        self.is_active()
    }

    /// Bring an inactive or lapsed edge back, taking the assignment details of `candidate`.
    fn reactivate_from(&mut self, candidate: Self);

    fn deactivate(&mut self);
}

/// What [`upsert_edge`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeUpsert {
    Created,
    Reactivated,
    AlreadyActive,
}

/// Insert `candidate`, preferring reactivation of an existing edge with the
/// same key over a duplicate insertion.
///
/// An existing edge that no longer counts at `as_of` (removed or lapsed) takes
/// the candidate's details.
pub fn upsert_edge<E: AssociationEdge>(
    edges: &mut Vec<E>,
    candidate: E,
    as_of: DateTime<Utc>,
) -> EdgeUpsert {
    let key = candidate.key();
    match edges.iter_mut().find(|e| e.key() == key) {
        Some(existing) if existing.is_in_effect(as_of) => EdgeUpsert::AlreadyActive,
        Some(existing) => {
            existing.reactivate_from(candidate);
            EdgeUpsert::Reactivated
        }
        None => {
            edges.push(candidate);
            EdgeUpsert::Created
        }
    }
}

/// Soft-remove the edge with `key`. Returns `true` if an active edge was
/// deactivated.
pub fn deactivate_edge<E: AssociationEdge>(edges: &mut [E], key: E::Key) -> bool {
    match edges.iter_mut().find(|e| e.key() == key && e.is_active()) {
        Some(edge) => {
            edge.deactivate();
            true
        }
        None => false,
    }
}

/// Role → permission association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionEdge {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
}

impl RolePermissionEdge {
    pub fn new(role_id: RoleId, permission_id: PermissionId, assigned_at: DateTime<Utc>) -> Self {
        Self {
            role_id,
            permission_id,
            active: true,
            assigned_at,
        }
    }
}

impl AssociationEdge for RolePermissionEdge {
    type Key = (RoleId, PermissionId);

    fn key(&self) -> Self::Key {
        (self.role_id, self.permission_id)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn reactivate_from(&mut self, candidate: Self) {
        self.active = true;
        self.assigned_at = candidate.assigned_at;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Principal → role association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRoleEdge {
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Who made the assignment. Cleared (not cascaded) when that principal is
    /// permanently deleted.
    pub assigned_by: Option<PrincipalId>,
}

impl PrincipalRoleEdge {
    pub fn new(principal_id: PrincipalId, role_id: RoleId, assigned_at: DateTime<Utc>) -> Self {
        Self {
            principal_id,
            role_id,
            active: true,
            assigned_at,
            expires_at: None,
            assigned_by: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn assigned_by(mut self, assigner: PrincipalId) -> Self {
        self.assigned_by = Some(assigner);
        self
    }

    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= as_of)
    }

    /// Active and not expired. Says nothing about the role itself.
    pub fn is_valid_at(&self, as_of: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(as_of)
    }
}

impl AssociationEdge for PrincipalRoleEdge {
    type Key = (PrincipalId, RoleId);

    fn key(&self) -> Self::Key {
        (self.principal_id, self.role_id)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_in_effect(&self, as_of: DateTime<Utc>) -> bool {
        self.is_valid_at(as_of)
    }

    fn reactivate_from(&mut self, candidate: Self) {
        self.active = true;
        self.assigned_at = candidate.assigned_at;
        self.expires_at = candidate.expires_at;
        self.assigned_by = candidate.assigned_by;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role-permission graph
// ─────────────────────────────────────────────────────────────────────────────

/// Bipartite role ↔ permission relation with its reference data.
///
/// Edges may point at roles or permissions the graph does not know about
/// (dangling references from a partial load); those edges are simply
/// unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionGraph {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    edges: Vec<RolePermissionEdge>,
}

impl RolePermissionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from already-loaded parts.
    ///
    /// Duplicate edges for the same pair are collapsed, keeping the first one
    /// unless a later duplicate is active and the kept one is not.
    pub fn from_parts(
        roles: impl IntoIterator<Item = Role>,
        permissions: impl IntoIterator<Item = Permission>,
        edges: impl IntoIterator<Item = RolePermissionEdge>,
    ) -> Self {
        let mut graph = Self::new();
        for role in roles {
            graph.roles.insert(role.id, role);
        }
        for permission in permissions {
            graph.permissions.insert(permission.id, permission);
        }
        for edge in edges {
            let key = edge.key();
            match graph.edges.iter_mut().find(|e| e.key() == key) {
                Some(existing) if !existing.active && edge.active => *existing = edge,
                Some(_) => {}
                None => graph.edges.push(edge),
            }
        }
        graph
    }

    /// Insert or replace a role. Names must stay unique.
    pub fn upsert_role(&mut self, role: Role) -> DomainResult<()> {
        if role.name.as_str().trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        if self
            .roles
            .values()
            .any(|r| r.name == role.name && r.id != role.id)
        {
            return Err(DomainError::conflict(format!(
                "role name '{}' already in use",
                role.name
            )));
        }
        self.roles.insert(role.id, role);
        Ok(())
    }

    /// Insert or replace a permission. Names must stay unique.
    pub fn upsert_permission(&mut self, permission: Permission) -> DomainResult<()> {
        if permission.name.as_str().trim().is_empty() {
            return Err(DomainError::validation("permission name cannot be empty"));
        }
        if self
            .permissions
            .values()
            .any(|p| p.name == permission.name && p.id != permission.id)
        {
            return Err(DomainError::conflict(format!(
                "permission name '{}' already in use",
                permission.name
            )));
        }
        self.permissions.insert(permission.id, permission);
        Ok(())
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn role_by_name(&self, name: &RoleName) -> Option<&Role> {
        self.roles.values().find(|r| &r.name == name)
    }

    pub fn permission(&self, id: &PermissionId) -> Option<&Permission> {
        self.permissions.get(id)
    }

    pub fn permission_by_name(&self, name: &PermissionName) -> Option<&Permission> {
        self.permissions.values().find(|p| &p.name == name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    pub fn edges(&self) -> &[RolePermissionEdge] {
        &self.edges
    }

    /// Soft-delete a role. Its edges are left untouched.
    pub fn set_role_active(&mut self, id: &RoleId, active: bool) -> DomainResult<()> {
        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("role {id}")))?;
        role.active = active;
        Ok(())
    }

    /// Soft-delete a permission. Its edges are left untouched.
    pub fn set_permission_active(&mut self, id: &PermissionId, active: bool) -> DomainResult<()> {
        let permission = self
            .permissions
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("permission {id}")))?;
        permission.active = active;
        Ok(())
    }

    /// Associate a permission with a role (reactivating a removed association).
    pub fn grant(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> DomainResult<EdgeUpsert> {
        if !self.roles.contains_key(&role_id) {
            return Err(DomainError::not_found(format!("role {role_id}")));
        }
        if !self.permissions.contains_key(&permission_id) {
            return Err(DomainError::not_found(format!("permission {permission_id}")));
        }
        Ok(upsert_edge(
            &mut self.edges,
            RolePermissionEdge::new(role_id, permission_id, at),
            at,
        ))
    }

    /// Soft-remove a role → permission association.
    pub fn revoke(&mut self, role_id: RoleId, permission_id: PermissionId) -> bool {
        deactivate_edge(&mut self.edges, (role_id, permission_id))
    }

    /// Mutable access to the raw edges, for maintenance routines.
    pub fn edges_mut(&mut self) -> &mut [RolePermissionEdge] {
        &mut self.edges
    }

    /// Names of the permissions a role currently grants.
    ///
    /// Only active edges to active, known permissions count. Whether the role
    /// itself is active is the caller's concern.
    pub fn granted_by(&self, role_id: RoleId) -> impl Iterator<Item = &PermissionName> {
        self.edges
            .iter()
            .filter(move |e| e.role_id == role_id && e.active)
            .filter_map(move |e| self.permissions.get(&e.permission_id))
            .filter(|p| p.active)
            .map(|p| &p.name)
    }
}
