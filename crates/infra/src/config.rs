//! Engine configuration from the environment.

use std::collections::BTreeSet;

use anyhow::{Context, bail};

use iamkit_auth::{AuthorizationPolicy, DEFAULT_WILDCARDS, PermissionName, RoleName, SUPER_ADMIN};

/// Overrides the name of the role that bypasses permission checks.
pub const SUPER_ADMIN_ROLE_VAR: &str = "IAMKIT_SUPER_ADMIN_ROLE";

/// Comma-separated permission names that grant everything.
pub const WILDCARD_PERMISSIONS_VAR: &str = "IAMKIT_WILDCARD_PERMISSIONS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub policy: AuthorizationPolicy,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Unset variables keep their defaults; blank ones are reported and ignored.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let super_admin = match non_blank(&lookup, SUPER_ADMIN_ROLE_VAR) {
            Some(name) => {
                validate_name(&name).with_context(|| format!("invalid {SUPER_ADMIN_ROLE_VAR}"))?;
                RoleName::new(name)
            }
            None => RoleName::new(SUPER_ADMIN),
        };

        let wildcards: BTreeSet<PermissionName> = match non_blank(&lookup, WILDCARD_PERMISSIONS_VAR) {
            Some(list) => {
                let mut names = BTreeSet::new();
                for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    validate_name(name)
                        .with_context(|| format!("invalid {WILDCARD_PERMISSIONS_VAR}"))?;
                    names.insert(PermissionName::new(name.to_string()));
                }
                names
            }
            None => DEFAULT_WILDCARDS.into_iter().map(PermissionName::new).collect(),
        };

        tracing::debug!(
            super_admin_role = %super_admin,
            wildcards = wildcards.len(),
            "authorization policy configured"
        );

        Ok(Self {
            policy: AuthorizationPolicy::new(super_admin, wildcards),
        })
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::warn!(variable = key, "blank configuration value ignored; using default");
        return None;
    }
    Some(trimmed.to_string())
}

fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.chars().any(char::is_whitespace) {
        bail!("'{name}' contains whitespace");
    }
    Ok(())
}
