//! Tenant-isolated, in-memory RBAC store.
//!
//! Every tenant owns one [`AccessDirectory`]. Mutations that the invariant
//! guard has to clear are checked and committed under the same write lock, so
//! two concurrent requests can never both remove "the other" super-admin.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use iamkit_auth::{
    AccessDirectory, AuthorizationExplanation, AuthorizationPolicy, EdgeUpsert, GuardFacts,
    GuardVerdict, InvariantGuard, MutationOperation, MutationRequest, Permission, PermissionName,
    PrincipalAccount, Role, RoleAssignment, RoleName, explain,
};
use iamkit_core::{PermissionId, PrincipalId, RoleId, TenantId};

use crate::config::EngineConfig;
use crate::error::{StoreError, StoreResult};
use crate::maintenance::{self, OrphanReport};

/// What a committed mutation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub account_changed: bool,
    pub edges_activated: usize,
    pub edges_deactivated: usize,
    /// Edges on other accounts whose `assigned_by` was cleared.
    pub provenance_cleared: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    inner: RwLock<HashMap<TenantId, AccessDirectory>>,
    policy: AuthorizationPolicy,
}

impl InMemoryRbacStore {
    pub fn new(policy: AuthorizationPolicy) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.policy.clone())
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<TenantId, AccessDirectory>>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<TenantId, AccessDirectory>>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn with_tenant<T>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&AccessDirectory) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let map = self.read()?;
        match map.get(&tenant_id) {
            Some(directory) => f(directory),
            None => f(&AccessDirectory::default()),
        }
    }

    fn with_tenant_mut<T>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut AccessDirectory) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut map = self.write()?;
        f(map.entry(tenant_id).or_default())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reference data
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a role. Deactivating or renaming the super-admin role
    /// is refused while anyone holds it.
    pub fn upsert_role(&self, tenant_id: TenantId, role: Role) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            if let Some(current) = dir.graph().role(&role.id) {
                let retiring = current.active && (!role.active || current.name != role.name);
                if retiring {
                    self.guard_role_retirement(tenant_id, &*dir, &current.name)?;
                }
            }
            let name = role.name.clone();
            dir.graph_mut().upsert_role(role)?;
            tracing::info!(%tenant_id, role = %name, "role upserted");
            Ok(())
        })
    }

    pub fn upsert_permission(&self, tenant_id: TenantId, permission: Permission) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            let name = permission.name.clone();
            dir.graph_mut().upsert_permission(permission)?;
            tracing::info!(%tenant_id, permission = %name, "permission upserted");
            Ok(())
        })
    }

    /// Soft-(de)activate a role. Edges are not cascaded. Deactivating the
    /// super-admin role is refused while anyone holds it.
    pub fn set_role_active(&self, tenant_id: TenantId, role_id: RoleId, active: bool) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            if let Some(current) = dir.graph().role(&role_id) {
                if current.active && !active {
                    self.guard_role_retirement(tenant_id, &*dir, &current.name)?;
                }
            }
            dir.graph_mut().set_role_active(&role_id, active)?;
            tracing::info!(%tenant_id, %role_id, active, "role activation changed");
            Ok(())
        })
    }

    /// Soft-(de)activate a permission. Edges are not cascaded.
    pub fn set_permission_active(
        &self,
        tenant_id: TenantId,
        permission_id: PermissionId,
        active: bool,
    ) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            dir.graph_mut().set_permission_active(&permission_id, active)?;
            tracing::info!(%tenant_id, %permission_id, active, "permission activation changed");
            Ok(())
        })
    }

    pub fn grant_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
        at: DateTime<Utc>,
    ) -> StoreResult<EdgeUpsert> {
        self.with_tenant_mut(tenant_id, |dir| {
            let outcome = dir.graph_mut().grant(role_id, permission_id, at)?;
            tracing::info!(%tenant_id, %role_id, %permission_id, ?outcome, "permission granted to role");
            Ok(outcome)
        })
    }

    pub fn revoke_permission(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> StoreResult<bool> {
        self.with_tenant_mut(tenant_id, |dir| {
            let changed = dir.graph_mut().revoke(role_id, permission_id);
            tracing::info!(%tenant_id, %role_id, %permission_id, changed, "permission revoked from role");
            Ok(changed)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_principal(&self, tenant_id: TenantId, principal_id: PrincipalId) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            dir.insert_account(PrincipalAccount::new(principal_id))?;
            tracing::info!(%tenant_id, %principal_id, "principal created");
            Ok(())
        })
    }

    /// Assign a role. Adding roles never weakens an invariant, so the guard is
    /// not consulted.
    pub fn assign_role(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        role_id: RoleId,
        assignment: RoleAssignment,
    ) -> StoreResult<EdgeUpsert> {
        self.with_tenant_mut(tenant_id, |dir| {
            if dir.graph().role(&role_id).is_none() {
                return Err(StoreError::UnknownRole(role_id.to_string()));
            }
            let account = dir
                .account_mut(&principal_id)
                .ok_or(StoreError::UnknownPrincipal(principal_id))?;
            let outcome = account.assign_role(role_id, assignment);
            tracing::info!(%tenant_id, %principal_id, %role_id, ?outcome, "role assigned");
            Ok(outcome)
        })
    }

    /// Report audit records authored by `principal_id` (an immutable
    /// dependency that blocks permanent deletion).
    pub fn record_audit_authorship(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        records: u64,
    ) -> StoreResult<()> {
        self.with_tenant_mut(tenant_id, |dir| {
            dir.record_authored(principal_id, records);
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn resolve(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        as_of: DateTime<Utc>,
    ) -> StoreResult<BTreeSet<PermissionName>> {
        self.with_tenant(tenant_id, |dir| Ok(dir.resolve(&principal_id, as_of)))
    }

    /// Yes/no decision. Any failure along the way is a denial.
    pub fn authorize(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        required: &str,
        as_of: DateTime<Utc>,
    ) -> bool {
        self.with_tenant(tenant_id, |dir| {
            Ok(dir.authorize(&principal_id, required, &self.policy, as_of))
        })
        .unwrap_or_else(|error| {
            tracing::warn!(%tenant_id, %principal_id, %error, "authorization failed closed");
            false
        })
    }

    pub fn explain(
        &self,
        tenant_id: TenantId,
        principal_id: PrincipalId,
        required: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<AuthorizationExplanation> {
        self.with_tenant(tenant_id, |dir| {
            let account = dir
                .account(&principal_id)
                .ok_or(StoreError::UnknownPrincipal(principal_id))?;
            Ok(explain(account, dir.graph(), &self.policy, as_of, required))
        })
    }

    pub fn active_super_admins(
        &self,
        tenant_id: TenantId,
        as_of: DateTime<Utc>,
    ) -> StoreResult<BTreeSet<PrincipalId>> {
        self.with_tenant(tenant_id, |dir| {
            Ok(dir.active_holders(self.policy.super_admin_role(), as_of))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Guarded mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Refuse retiring `role` if the guard says so. Runs under the caller's
    /// write lock.
    fn guard_role_retirement(
        &self,
        tenant_id: TenantId,
        dir: &AccessDirectory,
        role: &RoleName,
    ) -> StoreResult<()> {
        let verdict = InvariantGuard::new(&self.policy).can_retire_role(dir, role, Utc::now());
        if let GuardVerdict::Denied(reason) = verdict {
            tracing::warn!(%tenant_id, %role, %reason, "role retirement refused");
            return Err(StoreError::GuardDenied(reason));
        }
        Ok(())
    }

    /// Preview the guard's verdict without writing anything.
    pub fn check_mutation(
        &self,
        tenant_id: TenantId,
        request: &MutationRequest,
        as_of: DateTime<Utc>,
    ) -> StoreResult<GuardVerdict> {
        self.with_tenant(tenant_id, |dir| {
            Ok(InvariantGuard::new(&self.policy).can_mutate(dir, request, as_of))
        })
    }

    /// Check `request` with the invariant guard and commit it, atomically.
    pub fn apply_mutation(
        &self,
        tenant_id: TenantId,
        request: &MutationRequest,
        at: DateTime<Utc>,
    ) -> StoreResult<MutationOutcome> {
        let mut map = self.write()?;
        let dir = map
            .get_mut(&tenant_id)
            .ok_or(StoreError::UnknownPrincipal(request.target))?;
        if dir.account(&request.target).is_none() {
            return Err(StoreError::UnknownPrincipal(request.target));
        }

        if let GuardVerdict::Denied(reason) =
            InvariantGuard::new(&self.policy).can_mutate(&*dir, request, at)
        {
            tracing::warn!(
                %tenant_id,
                target_principal = %request.target,
                actor = ?request.actor,
                %reason,
                "mutation refused"
            );
            return Err(StoreError::GuardDenied(reason));
        }

        let outcome = execute(dir, request, at)?;
        tracing::info!(
            %tenant_id,
            target_principal = %request.target,
            operation = ?request.operation,
            ?outcome,
            "mutation committed"
        );
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    pub fn orphan_report(&self, tenant_id: TenantId) -> StoreResult<OrphanReport> {
        self.with_tenant(tenant_id, |dir| Ok(maintenance::find_orphans(dir)))
    }

    /// Soft-deactivate every orphaned edge. Returns what was deactivated.
    pub fn cleanup_orphans(&self, tenant_id: TenantId) -> StoreResult<OrphanReport> {
        self.with_tenant_mut(tenant_id, |dir| {
            let report = maintenance::cleanup_orphans(dir);
            tracing::info!(%tenant_id, deactivated = report.total(), "orphaned edges deactivated");
            Ok(report)
        })
    }

    /// Copy of a tenant's directory (empty for unknown tenants).
    pub fn snapshot(&self, tenant_id: TenantId) -> StoreResult<AccessDirectory> {
        self.with_tenant(tenant_id, |dir| Ok(dir.clone()))
    }
}

fn role_id_by_name(dir: &AccessDirectory, name: &RoleName) -> StoreResult<RoleId> {
    dir.graph()
        .role_by_name(name)
        .map(|role| role.id)
        .ok_or_else(|| StoreError::UnknownRole(name.to_string()))
}

/// Apply an already-cleared mutation.
fn execute(
    dir: &mut AccessDirectory,
    request: &MutationRequest,
    at: DateTime<Utc>,
) -> StoreResult<MutationOutcome> {
    let target = request.target;
    let mut outcome = MutationOutcome::default();

    match &request.operation {
        MutationOperation::Deactivate => {
            let account = dir
                .account_mut(&target)
                .ok_or(StoreError::UnknownPrincipal(target))?;
            outcome.account_changed = account.active;
            account.active = false;
        }
        MutationOperation::RemoveRole(name) => {
            let role_id = role_id_by_name(dir, name)?;
            let account = dir
                .account_mut(&target)
                .ok_or(StoreError::UnknownPrincipal(target))?;
            if account.remove_role(role_id) {
                outcome.edges_deactivated = 1;
            }
        }
        MutationOperation::ReplaceRoles(names) => {
            // Resolve every name before touching anything.
            let wanted = names
                .iter()
                .map(|name| role_id_by_name(dir, name))
                .collect::<StoreResult<BTreeSet<RoleId>>>()?;
            let account = dir
                .account_mut(&target)
                .ok_or(StoreError::UnknownPrincipal(target))?;

            let current: Vec<RoleId> = account
                .roles
                .iter()
                .filter(|e| e.active && !wanted.contains(&e.role_id))
                .map(|e| e.role_id)
                .collect();
            for role_id in current {
                if account.remove_role(role_id) {
                    outcome.edges_deactivated += 1;
                }
            }

            let mut assignment = RoleAssignment::at(at);
            assignment.assigned_by = request.actor;
            for role_id in wanted {
                if account.assign_role(role_id, assignment) != EdgeUpsert::AlreadyActive {
                    outcome.edges_activated += 1;
                }
            }
        }
        MutationOperation::Delete => {
            let before: usize = dir
                .accounts()
                .filter(|a| a.id != target)
                .map(|a| a.roles.iter().filter(|e| e.assigned_by == Some(target)).count())
                .sum();
            dir.remove_account(&target)
                .ok_or(StoreError::UnknownPrincipal(target))?;
            outcome.account_changed = true;
            outcome.provenance_cleared = before;
        }
    }

    Ok(outcome)
}
