//! Orphaned edge detection and cleanup.
//!
//! Deactivating a role, permission or principal leaves its edges in place.
//! Those edges are already harmless to resolution; this module only reports
//! them and, on request, soft-deactivates them. References to entities that no
//! longer exist count as inactive.

use serde::Serialize;

use iamkit_auth::{AccessDirectory, deactivate_edge};
use iamkit_core::{Entity, PermissionId, PrincipalId, RoleId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Active role->permission edges whose role is inactive.
    pub grants_on_inactive_roles: Vec<(RoleId, PermissionId)>,
    /// Active role->permission edges whose permission is inactive.
    pub grants_of_inactive_permissions: Vec<(RoleId, PermissionId)>,
    /// Active principal->role edges whose role is inactive.
    pub assignments_of_inactive_roles: Vec<(PrincipalId, RoleId)>,
    /// Active principal->role edges on deactivated accounts.
    pub assignments_of_inactive_principals: Vec<(PrincipalId, RoleId)>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of distinct edges listed.
    ///
    /// An edge whose role and permission are both inactive is listed under
    /// both grant buckets but counted once.
    pub fn total(&self) -> usize {
        let overlap = self
            .grants_of_inactive_permissions
            .iter()
            .filter(|pair| self.grants_on_inactive_roles.contains(pair))
            .count();
        let overlap = overlap
            + self
                .assignments_of_inactive_roles
                .iter()
                .filter(|pair| self.assignments_of_inactive_principals.contains(pair))
                .count();

        self.grants_on_inactive_roles.len()
            + self.grants_of_inactive_permissions.len()
            + self.assignments_of_inactive_roles.len()
            + self.assignments_of_inactive_principals.len()
            - overlap
    }
}

pub fn find_orphans(dir: &AccessDirectory) -> OrphanReport {
    let graph = dir.graph();
    let role_active = |id: &RoleId| graph.role(id).is_some_and(Entity::is_active);
    let permission_active = |id: &PermissionId| graph.permission(id).is_some_and(Entity::is_active);

    let mut report = OrphanReport::default();

    for edge in graph.edges().iter().filter(|e| e.active) {
        let pair = (edge.role_id, edge.permission_id);
        if !role_active(&edge.role_id) {
            report.grants_on_inactive_roles.push(pair);
        }
        if !permission_active(&edge.permission_id) {
            report.grants_of_inactive_permissions.push(pair);
        }
    }

    for account in dir.accounts() {
        for edge in account.roles.iter().filter(|e| e.active) {
            let pair = (account.id, edge.role_id);
            if !role_active(&edge.role_id) {
                report.assignments_of_inactive_roles.push(pair);
            }
            if !account.is_active() {
                report.assignments_of_inactive_principals.push(pair);
            }
        }
    }

    report.grants_on_inactive_roles.sort();
    report.grants_of_inactive_permissions.sort();
    report.assignments_of_inactive_roles.sort();
    report.assignments_of_inactive_principals.sort();
    report
}

/// Soft-deactivate every edge [`find_orphans`] reports and return the report.
pub fn cleanup_orphans(dir: &mut AccessDirectory) -> OrphanReport {
    let report = find_orphans(dir);

    let grants = report
        .grants_on_inactive_roles
        .iter()
        .chain(&report.grants_of_inactive_permissions);
    for key in grants {
        deactivate_edge(dir.graph_mut().edges_mut(), *key);
    }

    let assignments = report
        .assignments_of_inactive_roles
        .iter()
        .chain(&report.assignments_of_inactive_principals);
    for (principal_id, role_id) in assignments {
        if let Some(account) = dir.account_mut(principal_id) {
            account.remove_role(*role_id);
        }
    }

    report
}
