//! Aggregate identity.

/// Something the repositories can look up by a stable, typed id.
///
/// Every aggregate implements this with its matching newtype from
/// [`crate::id`]; the trait carries no behavior, it only fixes the
/// id/aggregate pairing at the type level.
pub trait Entity {
    /// The id newtype for this aggregate.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
