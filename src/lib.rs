//! A sparse-set entity component system.
//!
//! A [`World`] issues lightweight generational [`Entity`] handles and
//! associates typed component values with them in per-type [`Pool`]s: dense
//! arrays indexed through paged sparse maps, giving O(1) attach, detach and
//! lookup with contiguous iteration. [`View`]s iterate the intersection of
//! several pools, caching the result and rebuilding it only when a pool's
//! structural version drifts.
//!
//! ```
//! use warren::World;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//!
//! let entity = world.create_entity()?;
//! world.attach(entity, Position { x: 0.0, y: 0.0 })?;
//! world.attach(entity, Velocity { dx: 1.0, dy: 2.0 })?;
//!
//! world.view::<(Position, Velocity)>().each(|_entity, position, velocity| {
//!     position.x += velocity.dx;
//!     position.y += velocity.dy;
//! });
//!
//! assert_eq!(&Position { x: 1.0, y: 2.0 }, world.get::<Position>(entity)?);
//! # Ok::<(), warren::EcsError>(())
//! ```
//!
//! Worlds are single-threaded: every structure here is mutated only by the
//! thread that created it, and structural change during view iteration is
//! deferred through a [`CommandBuffer`].

pub mod command;
pub mod entity;
pub mod error;
pub mod storage;
pub mod view;
pub mod world;

pub use crate::command::CommandBuffer;
pub use crate::entity::{Entity, EntityAllocator, INDEX_BITS, MAX_ENTITY_COUNT, VERSION_BITS};
pub use crate::error::EcsError;
pub use crate::storage::{Component, Pool, PAGE_SIZE};
pub use crate::view::{View, Viewable};
pub use crate::world::{EntityMut, World, WorldId};

pub mod prelude {
    pub use crate::command::CommandBuffer;
    pub use crate::entity::Entity;
    pub use crate::error::EcsError;
    pub use crate::storage::Component;
    pub use crate::view::View;
    pub use crate::world::{EntityMut, World};
}
