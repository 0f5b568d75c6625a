use crate::entity::Entity;
use crate::storage::{Component, Pool};
use crate::world::World;
use derivative::Derivative;
use smallvec::SmallVec;
use std::any::TypeId;
use std::marker::PhantomData;
use std::mem;
use tracing::trace;

/// Cached state of a view, owned by the world between iterations.
#[derive(Debug, Default)]
pub(crate) struct ViewCache {
    entities: Vec<Entity>,
    seen: SmallVec<[u64; 4]>,
    built: bool,
}

/// A one-shot membership predicate added by `with`/`without`.
#[derive(Debug, Clone, Copy)]
struct Filter {
    slot: usize,
    exclude: bool,
}

/// Tuples of component types which a [`View`] can iterate.
///
/// Implemented for tuples of distinct component types up to arity four;
/// single-component views are written `(T,)`.
pub trait Viewable: 'static {
    #[doc(hidden)]
    fn register_pools(world: &mut World) -> SmallVec<[usize; 4]>;
}

/// A cached query over the entities carrying every component type in `V`.
///
/// The view snapshots each driver pool's structural version when it rebuilds
/// its cache; any membership change observed through those versions triggers
/// a rebuild at the top of the next [`each`](View::each). The cache itself is
/// owned by the [`World`] and handed back when the view drops, so a view over
/// unchanged pools iterates without re-intersecting.
///
/// Iteration is a snapshot: the view holds the world exclusively, so entities
/// made eligible during a pass become visible on the next one. Structural
/// changes from inside the callback go through a
/// [`CommandBuffer`](crate::command::CommandBuffer).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct View<'a, V: Viewable> {
    #[derivative(Debug = "ignore")]
    world: &'a mut World,
    cache: ViewCache,
    filters: SmallVec<[Filter; 4]>,
    pool_slots: SmallVec<[usize; 4]>,
    key: TypeId,
    marker: PhantomData<V>,
}

impl<'a, V: Viewable> View<'a, V> {
    pub(crate) fn new(world: &'a mut World) -> Self {
        let pool_slots = V::register_pools(world);
        for i in 0..pool_slots.len() {
            for j in i + 1..pool_slots.len() {
                assert_ne!(
                    pool_slots[i], pool_slots[j],
                    "view component types must be distinct"
                );
            }
        }

        let key = TypeId::of::<V>();
        let cache = world.take_view_cache(key);
        View {
            world,
            cache,
            filters: SmallVec::new(),
            pool_slots,
            key,
            marker: PhantomData,
        }
    }

    /// Restricts iteration to entities which also carry `C`.
    ///
    /// Filters are one-shot: they apply to the next `each` and are cleared
    /// when it finishes. Adding a filter invalidates the cache.
    pub fn with<C: Component>(mut self) -> Self {
        let slot = self.world.ensure_pool::<C>();
        self.filters.push(Filter {
            slot,
            exclude: false,
        });
        self.cache.built = false;
        self
    }

    /// Restricts iteration to entities which do not carry `C`.
    ///
    /// One-shot, like [`with`](View::with).
    pub fn without<C: Component>(mut self) -> Self {
        let slot = self.world.ensure_pool::<C>();
        self.filters.push(Filter {
            slot,
            exclude: true,
        });
        self.cache.built = false;
        self
    }

    /// Grows the cache's capacity for `additional` more entities.
    pub fn reserve(&mut self, additional: usize) {
        self.cache.entities.reserve(additional);
    }

    /// Rebuilds the cache if it was never built or a pool version drifted.
    fn refresh(&mut self) {
        let world = &*self.world;
        let stale = !self.cache.built
            || self.cache.seen.len() != self.pool_slots.len()
            || self
                .pool_slots
                .iter()
                .zip(self.cache.seen.iter())
                .any(|(slot, seen)| world.dyn_pool_at(*slot).structural_version() != *seen);
        if !stale {
            return;
        }

        self.cache.entities.clear();

        // Intersection size is bounded by the smallest pool, so drive the
        // scan from it and probe the others.
        let driver = self
            .pool_slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| world.dyn_pool_at(**slot).len())
            .map(|(i, _)| i)
            .unwrap_or(0);
        let driver_slot = self.pool_slots[driver];

        for &entity in world.dyn_pool_at(driver_slot).dense_entities() {
            let eligible = self
                .pool_slots
                .iter()
                .enumerate()
                .all(|(i, slot)| i == driver || world.dyn_pool_at(*slot).contains_entity(entity));
            if eligible {
                self.cache.entities.push(entity);
            }
        }

        self.cache.seen = self
            .pool_slots
            .iter()
            .map(|slot| world.dyn_pool_at(*slot).structural_version())
            .collect();
        self.cache.built = true;
        trace!(entities = self.cache.entities.len(), "rebuilt view cache");
    }

    fn filters_pass(world: &World, filters: &[Filter], entity: Entity) -> bool {
        filters
            .iter()
            .all(|filter| world.dyn_pool_at(filter.slot).contains_entity(entity) != filter.exclude)
    }
}

impl<'a, V: Viewable> Drop for View<'a, V> {
    fn drop(&mut self) {
        self.world
            .store_view_cache(self.key, mem::take(&mut self.cache));
    }
}

macro_rules! impl_view {
    ( $( $ty:ident => ($pool:ident, $value:ident) ),+ ) => {
        impl<$( $ty: Component ),+> Viewable for ($( $ty, )+) {
            fn register_pools(world: &mut World) -> SmallVec<[usize; 4]> {
                let mut slots = SmallVec::new();
                $( slots.push(world.ensure_pool::<$ty>()); )+
                slots
            }
        }

        impl<'a, $( $ty: Component ),+> View<'a, ($( $ty, )+)> {
            /// Invokes `f` once per cached entity, rebuilding the cache first
            /// if any driver pool changed, and passing mutable references to
            /// each of the entity's components.
            pub fn each<F>(&mut self, mut f: F)
            where
                F: FnMut(Entity, $( &mut $ty ),+),
            {
                self.refresh();

                // Filters are evaluated against the pools before iteration
                // hands out any mutable borrows.
                let selected: Option<Vec<Entity>> = if self.filters.is_empty() {
                    None
                } else {
                    let world = &*self.world;
                    let filters = &self.filters;
                    Some(
                        self.cache
                            .entities
                            .iter()
                            .copied()
                            .filter(|entity| Self::filters_pass(world, filters, *entity))
                            .collect(),
                    )
                };
                let entities: &[Entity] = match &selected {
                    Some(selected) => selected,
                    None => &self.cache.entities,
                };

                let mut pools = self.world.pools_disjoint_mut(&self.pool_slots).into_iter();
                $(
                    let $pool: &mut Pool<$ty> = pools
                        .next()
                        .and_then(|pool| pool.downcast_mut::<Pool<$ty>>())
                        .expect("pool directory type mismatch");
                )+

                for &entity in entities {
                    $(
                        let $value = match $pool.get_mut(entity) {
                            Some(value) => value,
                            None => continue,
                        };
                    )+
                    f(entity, $( $value ),+);
                }

                if !self.filters.is_empty() {
                    self.filters.clear();
                    self.cache.built = false;
                }
            }
        }
    };
}

impl_view!(A => (pool_a, a));
impl_view!(A => (pool_a, a), B => (pool_b, b));
impl_view!(A => (pool_a, a), B => (pool_b, b), C => (pool_c, c));
impl_view!(A => (pool_a, a), B => (pool_b, b), C => (pool_c, c), D => (pool_d, d));
