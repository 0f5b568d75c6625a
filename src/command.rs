use crate::entity::Entity;
use crate::storage::Component;
use crate::world::World;
use derivative::Derivative;
use tracing::trace;

/// Records structural changes for later application to a [`World`].
///
/// A view's `each` holds the world exclusively, so the callback cannot create
/// or destroy entities directly; it records the changes here instead and the
/// caller applies them with [`flush`](CommandBuffer::flush) once the pass has
/// finished. Commands run in recording order. Typed commands targeting an
/// entity which died earlier in the same buffer are skipped.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct CommandBuffer {
    #[derivative(Debug = "ignore")]
    commands: Vec<Box<dyn FnOnce(&mut World)>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        CommandBuffer::default()
    }

    /// Records attaching `value` to `entity`.
    pub fn attach<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands.push(Box::new(move |world| {
            if world.attach(entity, value).is_err() {
                trace!(entity = %entity, "skipped attach to dead entity");
            }
        }));
    }

    /// Records detaching `entity`'s `T` component.
    pub fn detach<T: Component>(&mut self, entity: Entity) {
        self.commands.push(Box::new(move |world| {
            world.detach::<T>(entity);
        }));
    }

    /// Records destroying `entity`.
    pub fn destroy(&mut self, entity: Entity) {
        self.commands.push(Box::new(move |world| {
            if world.destroy_entity(entity).is_err() {
                trace!(entity = %entity, "skipped destroy of dead entity");
            }
        }));
    }

    /// Records an arbitrary world mutation, e.g. spawning a new entity with
    /// its components.
    pub fn exec<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) + 'static,
    {
        self.commands.push(Box::new(f));
    }

    /// Applies every recorded command to `world` in order and empties the
    /// buffer.
    pub fn flush(&mut self, world: &mut World) {
        for command in self.commands.drain(..) {
            command(world);
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
