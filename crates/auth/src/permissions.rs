use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use iamkit_core::{Entity, PermissionId};

/// Permission identifier.
///
/// Permissions are modeled as opaque action names (e.g. `"Usuarios.Listar"`).
/// The segment before the first `.` is treated as the permission's category.
/// Which names act as wildcards is decided by the
/// [`AuthorizationPolicy`](crate::AuthorizationPolicy), not by the name itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(Cow<'static, str>);

impl PermissionName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment of a dotted name, if any.
    pub fn category(&self) -> Option<&str> {
        self.0
            .split_once('.')
            .map(|(head, _)| head)
            .filter(|head| !head.is_empty())
    }
}

impl core::fmt::Display for PermissionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PermissionName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Permission reference data, owned by the identity subsystem.
///
/// Permissions referenced by historical records are soft-deactivated rather than
/// removed, so the engine must always check `active` before granting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: PermissionName,
    pub category: String,
    pub active: bool,
}

impl Permission {
    /// Active permission whose category is derived from its name.
    pub fn new(id: PermissionId, name: impl Into<PermissionName>) -> Self {
        let name = name.into();
        let category = name.category().unwrap_or_default().to_string();
        Self {
            id,
            name,
            category,
            active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
