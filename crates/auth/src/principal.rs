use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamkit_core::{Entity, PrincipalId, RoleId};

use crate::graph::{EdgeUpsert, PrincipalRoleEdge, deactivate_edge, upsert_edge};

/// Stored principal (user account) and its role assignments.
///
/// `active` is the account's soft-delete flag. Deactivating an account does not
/// touch its role edges; maintenance routines reconcile those separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAccount {
    pub id: PrincipalId,
    pub active: bool,
    pub roles: Vec<PrincipalRoleEdge>,
}

/// Details of a role assignment other than the principal/role pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<PrincipalId>,
}

impl RoleAssignment {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            expires_at: None,
            assigned_by: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn by(mut self, assigner: PrincipalId) -> Self {
        self.assigned_by = Some(assigner);
        self
    }
}

impl PrincipalAccount {
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            active: true,
            roles: Vec::new(),
        }
    }

    /// Assign `role_id`. An existing edge that was removed or has expired by
    /// `assignment.at` is renewed with the new details.
    pub fn assign_role(&mut self, role_id: RoleId, assignment: RoleAssignment) -> EdgeUpsert {
        let edge = PrincipalRoleEdge {
            principal_id: self.id,
            role_id,
            active: true,
            assigned_at: assignment.at,
            expires_at: assignment.expires_at,
            assigned_by: assignment.assigned_by,
        };
        upsert_edge(&mut self.roles, edge, assignment.at)
    }

    /// Soft-remove a role assignment.
    pub fn remove_role(&mut self, role_id: RoleId) -> bool {
        deactivate_edge(&mut self.roles, (self.id, role_id))
    }

    /// Assignments that are active and unexpired at `as_of`.
    pub fn valid_assignments(&self, as_of: DateTime<Utc>) -> impl Iterator<Item = &PrincipalRoleEdge> {
        self.roles.iter().filter(move |e| e.is_valid_at(as_of))
    }

    /// Whether any of this account's edges was assigned by `assigner`.
    pub fn was_assigned_by(&self, assigner: PrincipalId) -> bool {
        self.roles.iter().any(|e| e.assigned_by == Some(assigner))
    }

    /// Drop the provenance of every edge assigned by `assigner`. Returns how
    /// many edges were touched.
    pub fn forget_assigner(&mut self, assigner: PrincipalId) -> usize {
        let mut cleared = 0;
        for edge in self.roles.iter_mut().filter(|e| e.assigned_by == Some(assigner)) {
            edge.assigned_by = None;
            cleared += 1;
        }
        cleared
    }
}

impl Entity for PrincipalAccount {
    type Id = PrincipalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn edges_carry_the_owning_principal() {
        let mut account = PrincipalAccount::new(PrincipalId::new());
        let role = RoleId::new();
        account.assign_role(role, RoleAssignment::at(Utc::now()));

        assert_eq!(account.roles.len(), 1);
        assert_eq!(account.roles[0].principal_id, account.id);
    }

    #[test]
    fn remove_then_assign_reactivates() {
        let mut account = PrincipalAccount::new(PrincipalId::new());
        let role = RoleId::new();
        let t0 = Utc::now();
        account.assign_role(role, RoleAssignment::at(t0));

        assert!(account.remove_role(role));
        assert_eq!(account.valid_assignments(t0).count(), 0);

        let outcome = account.assign_role(role, RoleAssignment::at(t0 + Duration::minutes(1)));
        assert_eq!(outcome, EdgeUpsert::Reactivated);
        assert_eq!(account.roles.len(), 1);
        assert_eq!(account.valid_assignments(t0).count(), 1);
    }

    #[test]
    fn expired_assignment_can_be_renewed() {
        let mut account = PrincipalAccount::new(PrincipalId::new());
        let role = RoleId::new();
        let now = Utc::now();
        account.assign_role(
            role,
            RoleAssignment::at(now - Duration::days(30)).expiring_at(now - Duration::days(1)),
        );
        assert_eq!(account.valid_assignments(now).count(), 0);

        let outcome = account.assign_role(
            role,
            RoleAssignment::at(now).expiring_at(now + Duration::days(30)),
        );

        assert_eq!(outcome, EdgeUpsert::Reactivated);
        assert_eq!(account.roles.len(), 1);
        assert_eq!(account.valid_assignments(now).count(), 1);
        assert_eq!(account.roles[0].expires_at, Some(now + Duration::days(30)));
    }

    #[test]
    fn expired_assignments_are_not_valid() {
        let mut account = PrincipalAccount::new(PrincipalId::new());
        let t0 = Utc::now();
        account.assign_role(
            RoleId::new(),
            RoleAssignment::at(t0 - Duration::days(2)).expiring_at(t0 - Duration::days(1)),
        );

        assert_eq!(account.valid_assignments(t0).count(), 0);
        assert_eq!(account.valid_assignments(t0 - Duration::days(2)).count(), 1);
    }

    #[test]
    fn forget_assigner_clears_only_matching_edges() {
        let assigner = PrincipalId::new();
        let other = PrincipalId::new();
        let mut account = PrincipalAccount::new(PrincipalId::new());
        let t0 = Utc::now();
        account.assign_role(RoleId::new(), RoleAssignment::at(t0).by(assigner));
        account.assign_role(RoleId::new(), RoleAssignment::at(t0).by(other));

        assert!(account.was_assigned_by(assigner));
        assert_eq!(account.forget_assigner(assigner), 1);
        assert!(!account.was_assigned_by(assigner));
        assert!(account.was_assigned_by(other));
    }
}
