use crate::error::EcsError;
use std::fmt::Display;
use tracing::trace;

/// Bits of an [`Entity`] devoted to the slot index.
pub const INDEX_BITS: u32 = 20;
/// Bits of an [`Entity`] devoted to the version counter.
pub const VERSION_BITS: u32 = 12;

pub(crate) const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
pub(crate) const VERSION_MASK: u32 = (1 << VERSION_BITS) - 1;

/// Maximum number of entity slots a single allocator will issue.
pub const MAX_ENTITY_COUNT: usize = 1 << INDEX_BITS;

/// A handle onto an entity.
///
/// Packed into 32 bits: the slot index occupies bits 0–19 and the slot
/// version bits 20–31. The all-ones value is reserved as [`Entity::NULL`].
/// Handles are plain values; they carry no reference to any world and remain
/// cheap to copy and to serialize as a `u32`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// The reserved invalid handle.
    ///
    /// Note this shares a bit pattern with version 4095 of the final slot;
    /// the allocator's version counter wraps within 12 bits, so that pattern
    /// is unreachable in practice but not provably so over unbounded churn.
    pub const NULL: Entity = Entity(u32::MAX);

    pub(crate) fn from_parts(index: u32, version: u32) -> Entity {
        debug_assert!(index <= INDEX_MASK);
        debug_assert!(version <= VERSION_MASK);
        Entity((version << INDEX_BITS) | index)
    }

    /// The slot index portion of the handle.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// The version portion of the handle.
    #[inline]
    pub const fn version(self) -> u32 {
        self.0 >> INDEX_BITS
    }

    /// The raw packed representation.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Reconstructs a handle from [`Entity::to_bits`].
    #[inline]
    pub const fn from_bits(bits: u32) -> Entity {
        Entity(bits)
    }

    /// Whether this is the reserved invalid handle.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}#{}", self.index(), self.version())
    }
}

/// Issues and recycles entity handles.
///
/// Each slot carries a version counter which is incremented when the slot is
/// freed, invalidating every handle issued for the previous lifetime of the
/// slot. Freed slots are reused in LIFO order.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    versions: Vec<u32>,
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity handle.
    ///
    /// The most recently freed slot is reused if one exists; otherwise a new
    /// slot is appended at version 0. Fails with
    /// [`EcsError::CapacityExhausted`] once all `2^20` slots are live.
    pub fn create(&mut self) -> Result<Entity, EcsError> {
        if let Some(index) = self.free.pop() {
            let version = self.versions[index as usize];
            return Ok(Entity::from_parts(index, version));
        }

        if self.versions.len() >= MAX_ENTITY_COUNT {
            return Err(EcsError::CapacityExhausted(self.versions.len()));
        }

        let index = self.versions.len() as u32;
        self.versions.push(0);
        Ok(Entity::from_parts(index, 0))
    }

    /// Destroys a live entity, invalidating every copy of its handle.
    ///
    /// The slot's version wraps within its 12-bit field, so after 4096
    /// lifetimes of one slot a sufficiently stale handle can alias a new one.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::DoubleDestroy(entity));
        }

        let index = entity.index();
        self.versions[index as usize] = (entity.version() + 1) & VERSION_MASK;
        self.free.push(index);
        trace!(entity = %entity, "destroyed entity");
        Ok(())
    }

    /// Whether `entity` refers to the current lifetime of its slot.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.versions
            .get(entity.index() as usize)
            .map_or(false, |v| *v == entity.version())
    }

    /// Hints that `additional` more slots will be allocated.
    pub fn reserve(&mut self, additional: usize) {
        self.versions.reserve(additional);
    }

    /// Number of currently live entities.
    pub fn live_count(&self) -> usize {
        self.versions.len() - self.free.len()
    }
}
