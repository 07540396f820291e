//! `iamkit-auth` — pure role-based authorization engine.
//!
//! Resolves effective permissions, evaluates authorization decisions and
//! guards role/principal mutations. No HTTP, no storage, no clock: every
//! function takes the time it evaluates at.

pub mod authorize;
pub mod claims;
pub mod directory;
pub mod graph;
pub mod guard;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod resolve;
pub mod roles;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DecisionBasis, Principal, SkippedAssignment, authorize,
    decide, explain, require,
};
pub use claims::{AccessClaims, TokenValidationError, authorize_claims, validate_claims};
pub use directory::AccessDirectory;
pub use graph::{
    AssociationEdge, EdgeUpsert, PrincipalRoleEdge, RolePermissionEdge, RolePermissionGraph,
    deactivate_edge, upsert_edge,
};
pub use guard::{
    DenialReason, GuardFacts, GuardVerdict, InvariantGuard, MutationOperation, MutationRequest,
};
pub use permissions::{Permission, PermissionName};
pub use policy::{AuthorizationPolicy, DEFAULT_WILDCARDS};
pub use principal::{PrincipalAccount, RoleAssignment};
pub use resolve::{SkipReason, effective_permissions, effective_roles, follow_assignment};
pub use roles::{Role, RoleName, SUPER_ADMIN};
