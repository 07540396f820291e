//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Roles, permissions and principal accounts are entities: they keep their
/// identity while being soft-deactivated and reactivated.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Whether the entity is currently active (not soft-deleted).
    fn is_active(&self) -> bool;
}
