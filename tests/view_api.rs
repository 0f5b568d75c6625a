use std::collections::HashSet;
use warren::{CommandBuffer, World};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos {
    x: i64,
    y: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel {
    dx: i64,
    dy: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hp(u32);

struct Disabled;

#[test]
fn view_shrinks_on_component_removal() {
    let mut world = World::new();
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    for &e in &[a, b] {
        world.attach(e, Pos { x: 0, y: 0 }).unwrap();
        world.attach(e, Vel { dx: 1, dy: 1 }).unwrap();
    }

    let mut count = 0;
    world.view::<(Pos, Vel)>().each(|_, _, _| count += 1);
    assert_eq!(2, count);

    world.detach::<Vel>(b);

    count = 0;
    world.view::<(Pos, Vel)>().each(|_, _, _| count += 1);
    assert_eq!(1, count);
}

#[test]
fn with_and_without_select_exactly_the_matching_entity() {
    let mut world = World::new();

    let a = world.create_entity().unwrap();
    world.attach(a, Pos { x: 0, y: 0 }).unwrap();
    world.attach(a, Vel { dx: 0, dy: 0 }).unwrap();
    world.attach(a, Hp(1)).unwrap();

    let b = world.create_entity().unwrap();
    world.attach(b, Pos { x: 0, y: 0 }).unwrap();
    world.attach(b, Vel { dx: 0, dy: 0 }).unwrap();
    world.attach(b, Hp(1)).unwrap();
    world.attach(b, Disabled).unwrap();

    let c = world.create_entity().unwrap();
    world.attach(c, Pos { x: 0, y: 0 }).unwrap();
    world.attach(c, Vel { dx: 0, dy: 0 }).unwrap();

    let mut visited = Vec::new();
    world
        .view::<(Pos, Vel)>()
        .with::<Hp>()
        .without::<Disabled>()
        .each(|entity, _, _| visited.push(entity));

    assert_eq!(vec![a], visited);
}

#[test]
fn snapshot_iteration_defers_new_entities_to_the_next_pass() {
    let mut world = World::new();

    let seed = world.create_entity().unwrap();
    world.attach(seed, Pos { x: 0, y: 0 }).unwrap();
    world.attach(seed, Vel { dx: 1, dy: 0 }).unwrap();

    let mut buffer = CommandBuffer::new();
    let mut first_pass = 0;
    world.view::<(Pos, Vel)>().each(|_, _, _| {
        first_pass += 1;
        buffer.exec(|world| {
            let spawned = match world.create_entity() {
                Ok(entity) => entity,
                Err(_) => return,
            };
            let _ = world.attach(spawned, Pos { x: 5, y: 5 });
            let _ = world.attach(spawned, Vel { dx: 0, dy: 1 });
        });
    });
    buffer.flush(&mut world);

    assert_eq!(1, first_pass);

    let mut second_pass = 0;
    world.view::<(Pos, Vel)>().each(|_, _, _| second_pass += 1);
    assert_eq!(2, second_pass);
}

#[test]
fn deferred_destroy_shrinks_the_next_pass() {
    let mut world = World::new();
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    for &e in &[a, b] {
        world.attach(e, Pos { x: 0, y: 0 }).unwrap();
    }

    let mut buffer = CommandBuffer::new();
    let mut first_pass = 0;
    world.view::<(Pos,)>().each(|entity, _| {
        first_pass += 1;
        if entity == a {
            buffer.destroy(entity);
        }
    });
    buffer.flush(&mut world);

    assert_eq!(2, first_pass);
    assert!(!world.is_alive(a));

    let mut visited = Vec::new();
    world.view::<(Pos,)>().each(|entity, _| visited.push(entity));
    assert_eq!(vec![b], visited);
}

#[test]
fn cached_set_matches_membership_exactly() {
    let mut world = World::new();

    let mut entities = Vec::new();
    for i in 0..200u32 {
        let e = world.create_entity().unwrap();
        if i % 2 == 0 {
            world.attach(e, Pos { x: 0, y: 0 }).unwrap();
        }
        if i % 3 == 0 {
            world.attach(e, Vel { dx: 0, dy: 0 }).unwrap();
        }
        if i % 5 == 0 {
            world.attach(e, Hp(i)).unwrap();
        }
        entities.push(e);
    }
    // Churn, so the cache is rebuilt over non-trivial pool states.
    for (i, &e) in entities.iter().enumerate() {
        if i % 7 == 0 {
            world.detach::<Pos>(e);
        }
        if i % 11 == 0 {
            world.destroy_entity(e).unwrap();
        }
    }

    let mut visited = HashSet::new();
    world
        .view::<(Pos, Vel)>()
        .each(|entity, _, _| assert!(visited.insert(entity)));

    let expected: HashSet<_> = entities
        .iter()
        .copied()
        .filter(|&e| world.is_alive(e) && world.has::<Pos>(e) && world.has::<Vel>(e))
        .collect();
    assert_eq!(expected, visited);
}

#[test]
fn three_component_view_mutates_all() {
    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.attach(e, Pos { x: 0, y: 0 }).unwrap();
    world.attach(e, Vel { dx: 2, dy: 3 }).unwrap();
    world.attach(e, Hp(10)).unwrap();

    world.view::<(Pos, Vel, Hp)>().each(|_, pos, vel, hp| {
        pos.x += vel.dx;
        pos.y += vel.dy;
        hp.0 -= 1;
    });

    assert_eq!(&Pos { x: 2, y: 3 }, world.get::<Pos>(e).unwrap());
    assert_eq!(&Hp(9), world.get::<Hp>(e).unwrap());
}

#[test]
fn view_sees_entities_attached_after_a_previous_pass() {
    let mut world = World::new();

    let first = world.create_entity().unwrap();
    world.attach(first, Pos { x: 0, y: 0 }).unwrap();

    let mut count = 0;
    world.view::<(Pos,)>().each(|_, _| count += 1);
    assert_eq!(1, count);

    // Version drift from the attach below forces a rebuild.
    let second = world.create_entity().unwrap();
    world.attach(second, Pos { x: 1, y: 1 }).unwrap();

    count = 0;
    world.view::<(Pos,)>().each(|_, _| count += 1);
    assert_eq!(2, count);
}

#[test]
fn empty_intersection_iterates_nothing() {
    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.attach(e, Pos { x: 0, y: 0 }).unwrap();

    let mut count = 0;
    world.view::<(Pos, Vel)>().each(|_, _, _| count += 1);
    assert_eq!(0, count);
}
