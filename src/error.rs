use crate::entity::Entity;
use thiserror::Error;

/// Errors reported by world and pool operations.
///
/// All of these indicate a programming error on the caller's side rather than
/// an environmental failure; none are retried or recovered internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EcsError {
    /// The referenced entity's version does not match the allocator's current
    /// version for that index.
    #[error("entity {0} is not alive")]
    NotAlive(Entity),

    /// A component was requested from a live entity that does not carry it.
    #[error("entity {entity} has no {component} component")]
    NotPresent {
        entity: Entity,
        component: &'static str,
    },

    /// A singleton accessor found a component count other than one.
    #[error("expected exactly one {component}, found {found}")]
    SingletonViolation {
        component: &'static str,
        found: usize,
    },

    /// The entity was already destroyed.
    #[error("entity {0} destroyed twice")]
    DoubleDestroy(Entity),

    /// The 20-bit entity index space is exhausted.
    #[error("entity index space exhausted ({0} live slots)")]
    CapacityExhausted(usize),
}
