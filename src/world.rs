use crate::entity::{Entity, EntityAllocator};
use crate::error::EcsError;
use crate::storage::{AnyPool, Component, Pool};
use crate::view::{View, ViewCache, Viewable};
use fxhash::FxHashMap;
use smallvec::SmallVec;
use std::any::TypeId;
use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

static WORLD_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Process-unique identifier of a [`World`], used for log correlation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct WorldId(usize);

impl WorldId {
    fn next() -> Self {
        WorldId(WORLD_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container of entities and their components.
///
/// The world owns the entity allocator and a directory with one [`Pool`] per
/// observed component type, keyed by `TypeId`. Every accessor which hands out
/// component data first validates the entity handle against the allocator, so
/// stale handles from recycled slots are rejected rather than aliasing the
/// slot's new occupant.
///
/// Worlds are independent of one another; handles are only meaningful within
/// the world that issued them.
pub struct World {
    id: WorldId,
    allocator: EntityAllocator,
    pools: Vec<Box<dyn AnyPool>>,
    pool_directory: FxHashMap<TypeId, usize>,
    world_version: u64,
    view_caches: FxHashMap<TypeId, ViewCache>,
}

impl World {
    pub fn new() -> Self {
        let id = WorldId::next();
        debug!(world = %id, "created world");
        World {
            id,
            allocator: EntityAllocator::new(),
            pools: Vec::new(),
            pool_directory: FxHashMap::default(),
            world_version: 0,
            view_caches: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    // -- entity lifecycle ----------------------------------------------------

    /// Allocates a fresh entity with no components.
    pub fn create_entity(&mut self) -> Result<Entity, EcsError> {
        let entity = self.allocator.create()?;
        trace!(world = %self.id, entity = %entity, "created entity");
        Ok(entity)
    }

    /// Destroys a live entity.
    ///
    /// Removal fans out across every registered pool before the allocator
    /// frees the handle, so pools observe a still-live entity, and the world
    /// structural version is bumped in between. Afterwards the handle is dead
    /// and `has` reports `false` for every component type.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::DoubleDestroy(entity));
        }

        let id = self.id;
        for pool in self.pools.iter_mut() {
            if pool.remove_entity(entity) {
                trace!(
                    world = %id,
                    entity = %entity,
                    component = pool.component_name(),
                    "removed component in destroy fanout"
                );
            }
        }
        self.world_version += 1;
        self.allocator.destroy(entity)?;
        trace!(world = %self.id, entity = %entity, "destroyed entity");
        Ok(())
    }

    /// Whether `entity` is alive in this world.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Alias for [`is_alive`](World::is_alive).
    pub fn contains(&self, entity: Entity) -> bool {
        self.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entities_alive(&self) -> usize {
        self.allocator.live_count()
    }

    /// Version counter bumped on every entity destruction.
    ///
    /// Consumers tracking world-wide structural change may snapshot this;
    /// per-pool view caching does not depend on it.
    pub fn structural_version(&self) -> u64 {
        self.world_version
    }

    // -- components ----------------------------------------------------------

    /// Attaches `value` to `entity`, returning the previous component if one
    /// was overwritten in place.
    pub fn attach<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Option<T>, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::NotAlive(entity));
        }
        let replaced = self.pool_mut::<T>().insert(entity, value);
        trace!(
            world = %self.id,
            entity = %entity,
            component = std::any::type_name::<T>(),
            "attached component"
        );
        Ok(replaced)
    }

    /// Removes `entity`'s `T` component, returning it.
    ///
    /// A no-op returning `None` when the component is absent or the handle is
    /// stale; detaching twice is equivalent to detaching once.
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let removed = self.pool_mut::<T>().remove(entity);
        if removed.is_some() {
            trace!(
                world = %self.id,
                entity = %entity,
                component = std::any::type_name::<T>(),
                "detached component"
            );
        }
        removed
    }

    /// Whether the live entity carries a `T` component.
    ///
    /// Returns `false` for dead handles.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
            && self.pool::<T>().map_or(false, |pool| pool.contains(entity))
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::NotAlive(entity));
        }
        self.pool::<T>()
            .and_then(|pool| pool.get(entity))
            .ok_or(EcsError::NotPresent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::NotAlive(entity));
        }
        let type_id = TypeId::of::<T>();
        let slot = match self.pool_directory.get(&type_id) {
            Some(slot) => *slot,
            None => {
                return Err(EcsError::NotPresent {
                    entity,
                    component: std::any::type_name::<T>(),
                })
            }
        };
        self.pools[slot]
            .downcast_mut::<Pool<T>>()
            .and_then(|pool| pool.get_mut(entity))
            .ok_or(EcsError::NotPresent {
                entity,
                component: std::any::type_name::<T>(),
            })
    }

    /// Fetches `entity`'s `T` component, attaching `value` first if absent.
    ///
    /// The returned reference is valid until the next structural mutation of
    /// the `T` pool; the borrow of the world enforces this.
    pub fn get_or_attach<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<&mut T, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::NotAlive(entity));
        }
        let pool = self.pool_mut::<T>();
        if !pool.contains(entity) {
            pool.insert(entity, value);
        }
        pool.get_mut(entity).ok_or(EcsError::NotPresent {
            entity,
            component: std::any::type_name::<T>(),
        })
    }

    // -- singletons ----------------------------------------------------------

    /// The entity owning the world's sole `T` component.
    ///
    /// Fails with [`EcsError::SingletonViolation`], reporting the observed
    /// count, unless the `T` pool holds exactly one component.
    pub fn singleton_entity<T: Component>(&self) -> Result<Entity, EcsError> {
        let pool = self.pool::<T>();
        match pool {
            Some(pool) if pool.len() == 1 => Ok(pool.entity_at(0)),
            _ => Err(EcsError::SingletonViolation {
                component: std::any::type_name::<T>(),
                found: pool.map_or(0, |pool| pool.len()),
            }),
        }
    }

    pub fn singleton<T: Component>(&self) -> Result<&T, EcsError> {
        let entity = self.singleton_entity::<T>()?;
        self.get(entity)
    }

    pub fn singleton_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        let entity = self.singleton_entity::<T>()?;
        self.get_mut(entity)
    }

    // -- pool directory ------------------------------------------------------

    /// Ensures the pool for `T` exists and returns it.
    ///
    /// Idempotent; the pool's identity is stable for the world's lifetime.
    pub fn register<T: Component>(&mut self) -> &Pool<T> {
        let slot = self.ensure_pool::<T>();
        self.pools[slot]
            .downcast_ref::<Pool<T>>()
            .expect("pool directory type mismatch")
    }

    /// The pool for `T`, if any component of that type has been observed.
    pub fn pool<T: Component>(&self) -> Option<&Pool<T>> {
        let slot = *self.pool_directory.get(&TypeId::of::<T>())?;
        self.pools[slot].downcast_ref::<Pool<T>>()
    }

    /// Drops every `T` component in the world.
    pub fn clear_pool<T: Component>(&mut self) {
        if self.pool_directory.contains_key(&TypeId::of::<T>()) {
            self.pool_mut::<T>().clear();
        }
    }

    /// Pre-allocates the allocator and every registered pool for `additional`
    /// more entities.
    pub fn reserve(&mut self, additional: usize) {
        self.allocator.reserve(additional);
        for pool in self.pools.iter_mut() {
            pool.reserve(additional);
        }
    }

    // -- views ---------------------------------------------------------------

    /// Creates a view over the entities carrying every component type in `V`.
    ///
    /// The view's cache is owned by the world and survives between calls, so
    /// repeated iteration over an unchanged set of pools skips the rebuild.
    pub fn view<V: Viewable>(&mut self) -> View<'_, V> {
        View::new(self)
    }

    /// A borrowed wrapper bundling `entity` with this world for chained
    /// component operations.
    pub fn entity_mut(&mut self, entity: Entity) -> Result<EntityMut<'_>, EcsError> {
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::NotAlive(entity));
        }
        Ok(EntityMut {
            world: self,
            entity,
        })
    }

    // -- crate internals -----------------------------------------------------

    pub(crate) fn ensure_pool<T: Component>(&mut self) -> usize {
        let type_id = TypeId::of::<T>();
        if let Some(slot) = self.pool_directory.get(&type_id) {
            return *slot;
        }

        let slot = self.pools.len();
        self.pools.push(Box::new(Pool::<T>::new()));
        self.pool_directory.insert(type_id, slot);
        debug!(
            world = %self.id,
            component = std::any::type_name::<T>(),
            "registered component pool"
        );
        slot
    }

    fn pool_mut<T: Component>(&mut self) -> &mut Pool<T> {
        let slot = self.ensure_pool::<T>();
        self.pools[slot]
            .downcast_mut::<Pool<T>>()
            .expect("pool directory type mismatch")
    }

    pub(crate) fn dyn_pool_at(&self, slot: usize) -> &dyn AnyPool {
        self.pools[slot].as_ref()
    }

    /// Mutably borrows the pools at `slots` simultaneously.
    ///
    /// `slots` must be distinct; the results are returned in `slots` order.
    pub(crate) fn pools_disjoint_mut(
        &mut self,
        slots: &[usize],
    ) -> SmallVec<[&mut dyn AnyPool; 4]> {
        let mut picked: SmallVec<[Option<&mut dyn AnyPool>; 4]> =
            slots.iter().map(|_| None).collect();
        for (index, pool) in self.pools.iter_mut().enumerate() {
            if let Some(position) = slots.iter().position(|slot| *slot == index) {
                picked[position] = Some(pool.as_mut());
            }
        }
        picked
            .into_iter()
            .map(|pool| pool.expect("pool slot out of range"))
            .collect()
    }

    pub(crate) fn take_view_cache(&mut self, key: TypeId) -> ViewCache {
        self.view_caches.remove(&key).unwrap_or_default()
    }

    pub(crate) fn store_view_cache(&mut self, key: TypeId, cache: ViewCache) {
        self.view_caches.insert(key, cache);
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("entities", &self.allocator.live_count())
            .field("pools", &self.pools.len())
            .finish()
    }
}

/// A live entity bundled with a mutable borrow of its world.
///
/// Handles themselves never reference a world; this wrapper exists purely for
/// call chaining and is constructed by [`World::entity_mut`].
#[derive(Debug)]
pub struct EntityMut<'a> {
    world: &'a mut World,
    entity: Entity,
}

impl<'a> EntityMut<'a> {
    /// The plain copyable handle.
    pub fn id(&self) -> Entity {
        self.entity
    }

    pub fn attach<T: Component>(self, value: T) -> Result<Self, EcsError> {
        self.world.attach(self.entity, value)?;
        Ok(self)
    }

    pub fn detach<T: Component>(self) -> Self {
        self.world.detach::<T>(self.entity);
        self
    }

    pub fn get<T: Component>(&self) -> Result<&T, EcsError> {
        self.world.get(self.entity)
    }

    pub fn get_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        self.world.get_mut(self.entity)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world.has::<T>(self.entity)
    }

    /// Destroys the entity, consuming the wrapper.
    pub fn destroy(self) -> Result<(), EcsError> {
        self.world.destroy_entity(self.entity)
    }
}
