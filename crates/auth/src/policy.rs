//! Authorization policy knobs: which role bypasses checks and which
//! permission names act as wildcards.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{PermissionName, RoleName, SUPER_ADMIN};

/// Permission sentinels that grant everything.
pub const DEFAULT_WILDCARDS: [&str; 2] = ["*", "Sistema.Controle.Total"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    super_admin_role: RoleName,
    wildcards: BTreeSet<PermissionName>,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            super_admin_role: RoleName::new(SUPER_ADMIN),
            wildcards: DEFAULT_WILDCARDS.into_iter().map(PermissionName::new).collect(),
        }
    }
}

impl AuthorizationPolicy {
    pub fn new(
        super_admin_role: RoleName,
        wildcards: impl IntoIterator<Item = PermissionName>,
    ) -> Self {
        Self {
            super_admin_role,
            wildcards: wildcards.into_iter().collect(),
        }
    }

    pub fn super_admin_role(&self) -> &RoleName {
        &self.super_admin_role
    }

    pub fn wildcards(&self) -> impl Iterator<Item = &PermissionName> {
        self.wildcards.iter()
    }

    pub fn is_super_admin_role(&self, role: &RoleName) -> bool {
        role == &self.super_admin_role
    }

    pub fn is_wildcard(&self, permission: &PermissionName) -> bool {
        self.wildcards.contains(permission)
    }
}
