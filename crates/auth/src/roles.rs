use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use iamkit_core::{Entity, RoleId};

/// Name of the distinguished role that bypasses permission checks.
pub const SUPER_ADMIN: &str = "SuperAdmin";

/// Role identifier used for RBAC.
///
/// Role names are unique within a tenant; comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn super_admin() -> Self {
        Self::new(SUPER_ADMIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Role reference data.
///
/// `level` is an ordering hint only; the engine never derives permissions from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub category: String,
    pub level: i32,
    pub active: bool,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<RoleName>) -> Self {
        Self {
            id,
            name: name.into(),
            category: String::new(),
            level: 0,
            active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
