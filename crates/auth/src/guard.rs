//! Pre-commit safety checks for principal and role mutations.
//!
//! The guard only reads. Whoever commits the mutation must evaluate it inside
//! the same atomic scope as the write, otherwise two concurrent removals of
//! different super-admins can both observe "another one remains".

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamkit_core::PrincipalId;

use crate::{AuthorizationPolicy, RoleName};

/// What the guard needs to know about the world.
pub trait GuardFacts {
    /// Active principals holding a valid assignment to the active role `role`.
    fn active_holders(&self, role: &RoleName, as_of: DateTime<Utc>) -> BTreeSet<PrincipalId>;

    /// Whether `principal` is referenced by immutable history (authored audit
    /// records, provenance of other principals' role assignments).
    fn has_dependencies(&self, principal: PrincipalId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum MutationOperation {
    /// Soft-delete the account.
    Deactivate,
    RemoveRole(RoleName),
    ReplaceRoles(BTreeSet<RoleName>),
    /// Permanent deletion.
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Who asks. `None` for system jobs.
    pub actor: Option<PrincipalId>,
    pub target: PrincipalId,
    pub operation: MutationOperation,
}

impl MutationRequest {
    pub fn new(target: PrincipalId, operation: MutationOperation) -> Self {
        Self {
            actor: None,
            target,
            operation,
        }
    }

    pub fn by(mut self, actor: PrincipalId) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Closed set of reasons a mutation may be refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialReason {
    LastSuperAdmin,
    SelfOperationForbidden,
    HasDependencies,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::LastSuperAdmin => "LastSuperAdmin",
            DenialReason::SelfOperationForbidden => "SelfOperationForbidden",
            DenialReason::HasDependencies => "HasDependencies",
        }
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason")]
pub enum GuardVerdict {
    Allowed,
    Denied(DenialReason),
}

impl GuardVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardVerdict::Allowed)
    }

    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            GuardVerdict::Allowed => Ok(()),
            GuardVerdict::Denied(reason) => Err(reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InvariantGuard<'p> {
    policy: &'p AuthorizationPolicy,
}

impl<'p> InvariantGuard<'p> {
    pub fn new(policy: &'p AuthorizationPolicy) -> Self {
        Self { policy }
    }

    /// Check `request` against the current `facts`.
    ///
    /// Rules, first match wins:
    /// 1. deleting yourself is refused;
    /// 2. removing the super-admin role from, deactivating or deleting the only
    ///    active super-admin is refused;
    /// 3. permanently deleting a principal with historical dependencies is
    ///    refused (soft deactivation never checks this).
    pub fn can_mutate<F>(&self, facts: &F, request: &MutationRequest, as_of: DateTime<Utc>) -> GuardVerdict
    where
        F: GuardFacts + ?Sized,
    {
        let verdict = self.evaluate(facts, request, as_of);
        if let GuardVerdict::Denied(reason) = verdict {
            tracing::debug!(
                target_principal = %request.target,
                actor = ?request.actor,
                operation = ?request.operation,
                %reason,
                "mutation denied by invariant guard"
            );
        }
        verdict
    }

    /// Check retiring `role`, i.e. deactivating or renaming it.
    ///
    /// Retiring the super-admin role while anyone holds it would take the
    /// active super-admin count to zero in one step.
    pub fn can_retire_role<F>(&self, facts: &F, role: &RoleName, as_of: DateTime<Utc>) -> GuardVerdict
    where
        F: GuardFacts + ?Sized,
    {
        if self.policy.is_super_admin_role(role) && !facts.active_holders(role, as_of).is_empty() {
            tracing::debug!(%role, "role retirement denied by invariant guard");
            return GuardVerdict::Denied(DenialReason::LastSuperAdmin);
        }
        GuardVerdict::Allowed
    }

    fn evaluate<F>(&self, facts: &F, request: &MutationRequest, as_of: DateTime<Utc>) -> GuardVerdict
    where
        F: GuardFacts + ?Sized,
    {
        let deleting = matches!(request.operation, MutationOperation::Delete);

        if deleting && request.actor == Some(request.target) {
            return GuardVerdict::Denied(DenialReason::SelfOperationForbidden);
        }

        if self.strips_super_admin(&request.operation) {
            let holders = facts.active_holders(self.policy.super_admin_role(), as_of);
            if holders.contains(&request.target) && holders.len() <= 1 {
                return GuardVerdict::Denied(DenialReason::LastSuperAdmin);
            }
        }

        if deleting && facts.has_dependencies(request.target) {
            return GuardVerdict::Denied(DenialReason::HasDependencies);
        }

        GuardVerdict::Allowed
    }

    /// Would `operation` leave the target without the super-admin role (or
    /// without an active account)?
    fn strips_super_admin(&self, operation: &MutationOperation) -> bool {
        match operation {
            MutationOperation::Deactivate | MutationOperation::Delete => true,
            MutationOperation::RemoveRole(role) => self.policy.is_super_admin_role(role),
            MutationOperation::ReplaceRoles(roles) => {
                !roles.iter().any(|role| self.policy.is_super_admin_role(role))
            }
        }
    }
}
