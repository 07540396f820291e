//! In-memory view of one tenant's principals and role-permission graph.
//!
//! This is the already-loaded input the resolver, evaluator and guard work
//! over. Storage adapters fill it; it performs no IO of its own.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamkit_core::{DomainError, DomainResult, PrincipalId};

use crate::graph::RolePermissionGraph;
use crate::guard::GuardFacts;
use crate::resolve::{effective_permissions, effective_roles};
use crate::{AuthorizationPolicy, PermissionName, Principal, PrincipalAccount, RoleName, authorize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDirectory {
    graph: RolePermissionGraph,
    accounts: HashMap<PrincipalId, PrincipalAccount>,
    /// Audit records authored per principal, as reported by the audit subsystem.
    authored_records: HashMap<PrincipalId, u64>,
}

impl AccessDirectory {
    pub fn new(graph: RolePermissionGraph) -> Self {
        Self {
            graph,
            ..Self::default()
        }
    }

    pub fn graph(&self) -> &RolePermissionGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RolePermissionGraph {
        &mut self.graph
    }

    pub fn account(&self, id: &PrincipalId) -> Option<&PrincipalAccount> {
        self.accounts.get(id)
    }

    pub fn account_mut(&mut self, id: &PrincipalId) -> Option<&mut PrincipalAccount> {
        self.accounts.get_mut(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &PrincipalAccount> {
        self.accounts.values()
    }

    pub fn accounts_mut(&mut self) -> impl Iterator<Item = &mut PrincipalAccount> {
        self.accounts.values_mut()
    }

    /// Register a new account. Ids are unique.
    pub fn insert_account(&mut self, account: PrincipalAccount) -> DomainResult<()> {
        if self.accounts.contains_key(&account.id) {
            return Err(DomainError::conflict(format!(
                "principal {} already exists",
                account.id
            )));
        }
        self.accounts.insert(account.id, account);
        Ok(())
    }

    /// Permanently remove an account.
    ///
    /// Edges on other accounts that name it as assigner lose their provenance
    /// instead of being removed.
    pub fn remove_account(&mut self, id: &PrincipalId) -> Option<PrincipalAccount> {
        let removed = self.accounts.remove(id)?;
        for account in self.accounts.values_mut() {
            account.forget_assigner(*id);
        }
        self.authored_records.remove(id);
        Some(removed)
    }

    pub fn record_authored(&mut self, id: PrincipalId, records: u64) {
        let count = self.authored_records.entry(id).or_default();
        *count = count.saturating_add(records);
    }

    pub fn authored_records(&self, id: &PrincipalId) -> u64 {
        self.authored_records.get(id).copied().unwrap_or_default()
    }

    /// Effective permissions of `id`; unknown principals resolve to nothing.
    pub fn resolve(&self, id: &PrincipalId, as_of: DateTime<Utc>) -> BTreeSet<PermissionName> {
        self.accounts
            .get(id)
            .map(|account| effective_permissions(account, &self.graph, as_of))
            .unwrap_or_default()
    }

    pub fn principal(&self, id: &PrincipalId, as_of: DateTime<Utc>) -> Option<Principal> {
        self.accounts
            .get(id)
            .map(|account| Principal::resolve(account, &self.graph, as_of))
    }

    /// Decision for `id`; unknown principals are denied.
    pub fn authorize(
        &self,
        id: &PrincipalId,
        required: &str,
        policy: &AuthorizationPolicy,
        as_of: DateTime<Utc>,
    ) -> bool {
        self.principal(id, as_of)
            .is_some_and(|principal| authorize(&principal, required, policy))
    }
}

impl GuardFacts for AccessDirectory {
    fn active_holders(&self, role: &RoleName, as_of: DateTime<Utc>) -> BTreeSet<PrincipalId> {
        self.accounts
            .values()
            .filter(|account| account.active)
            .filter(|account| effective_roles(account, &self.graph, as_of).any(|r| &r.name == role))
            .map(|account| account.id)
            .collect()
    }

    fn has_dependencies(&self, principal: PrincipalId) -> bool {
        self.authored_records(&principal) > 0
            || self
                .accounts
                .values()
                .filter(|account| account.id != principal)
                .any(|account| account.was_assigned_by(principal))
    }
}
