//! `iamkit-core` — identity foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the authorization
//! engine and its storage adapters (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{PermissionId, PrincipalId, RoleId, TenantId};
