use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid_collide::{
    BoxGeometry, Collider, CollisionFilter, CompoundChild, Material, MotionVelocity, PhysicsWorld,
    RaycastInput, RigidBody, SphereGeometry, Transform, Vec3,
};

fn unit_cube() -> Collider {
    let geometry = BoxGeometry::from_size(Vec3::splat(2.0));
    Collider::create_box(geometry, CollisionFilter::DEFAULT, Material::default()).unwrap()
}

/// Reference slab test against the box [-1, 1]^3, returning the fraction and
/// the outward normal of the entering face (`-normalize(d)` when the start is
/// inside). Returns `None` for rays that graze an edge closely enough to make
/// the comparison ambiguous.
fn slab_hit(start: Vec3, end: Vec3) -> Option<Option<(f32, Vec3)>> {
    let d = end - start;
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    let mut normal = Vec3::ZERO;
    let mut runner_up = f32::NEG_INFINITY;
    for axis in 0..3 {
        let (o, d) = (start[axis], d[axis]);
        if d.abs() < 1e-6 {
            if o.abs() > 1.0 {
                return Some(None);
            }
            continue;
        }
        let (t0, t1) = ((-1.0 - o) / d, (1.0 - o) / d);
        let enter = t0.min(t1);
        if enter > t_min {
            runner_up = t_min;
            t_min = enter;
            let mut n = Vec3::ZERO;
            n[axis] = -d.signum();
            normal = n;
        } else {
            runner_up = runner_up.max(enter);
        }
        t_max = t_max.min(t0.max(t1));
    }

    let margin = 1e-3;
    if (t_max - t_min).abs() < margin
        || (t_min - 1.0).abs() < margin
        || t_min.abs() < margin
        || t_max.abs() < margin
        || (t_min - runner_up).abs() < margin
    {
        return None;
    }
    if t_min > t_max || t_max < 0.0 || t_min > 1.0 {
        return Some(None);
    }
    if t_min < 0.0 {
        return Some(Some((0.0, -d.normalize())));
    }
    Some(Some((t_min, normal)))
}

#[test]
fn random_rays_match_slab_test() {
    let cube = unit_cube();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut checked = 0;
    let mut hits = 0;

    while checked < 200 {
        let start = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
        let end = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
        let Some(expected) = slab_hit(start, end) else {
            continue;
        };
        checked += 1;

        let hit = cube.cast_ray_closest(&RaycastInput::new(start, end));
        match (expected, hit) {
            (Some((fraction, normal)), Some(hit)) => {
                hits += 1;
                assert!(
                    (hit.fraction - fraction).abs() < 1e-5,
                    "ray {start:?} -> {end:?}: expected {fraction}, got {}",
                    hit.fraction
                );
                assert!(
                    (hit.surface_normal - normal).abs().max_element() < 1e-5,
                    "ray {start:?} -> {end:?}: expected normal {normal:?}, got {:?}",
                    hit.surface_normal
                );
            }
            (None, None) => {}
            (expected, hit) => panic!("ray {start:?} -> {end:?}: expected {expected:?}, got {hit:?}"),
        }
    }
    assert!(hits > 0);
}

#[test]
fn ray_hits_unit_sphere_front_face() {
    let sphere =
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 1.0), CollisionFilter::DEFAULT, Material::default())
            .unwrap();
    let hit = sphere
        .cast_ray_closest(&RaycastInput::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)))
        .unwrap();
    assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
    assert_relative_eq!(hit.position.z, -1.0, epsilon = 1e-5);
    assert_relative_eq!(hit.surface_normal.z, -1.0, epsilon = 1e-5);
}

#[test]
fn ray_filter_blocks_disjoint_layers() {
    let filter = CollisionFilter::new(0b01, 0b01);
    let sphere = Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 1.0), filter, Material::default()).unwrap();
    let input = RaycastInput::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0));
    assert!(sphere.cast_ray_any(&input));
    assert!(!sphere.cast_ray_any(&input.with_filter(CollisionFilter::new(0b10, 0b10))));
}

#[test]
fn world_ray_reports_nearest_body_through_compound() {
    let ball =
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 0.5), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
            .into_shared();
    let pair = Collider::create_compound(vec![
        CompoundChild::new(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)), ball.clone()),
        CompoundChild::new(Transform::from_position(Vec3::new(0.0, -1.0, 0.0)), ball),
    ])
    .unwrap()
    .into_shared();

    let mut world = PhysicsWorld::new();
    world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.0, 6.0)), pair.clone()));
    world.add_dynamic_body(
        RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.0, 3.0)), pair),
        MotionVelocity::ZERO,
    );

    let input = RaycastInput::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 10.0));
    let hits = world.cast_ray_all(&input);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].rigid_body_index, Some(0));
    assert_eq!(hits[1].rigid_body_index, Some(1));
    assert_relative_eq!(hits[0].position.z, 2.5, epsilon = 1e-5);
    assert_eq!(hits[0].collider_key, hits[1].collider_key);
    assert!(!hits[0].collider_key.is_empty());
}

#[test]
fn closest_ray_starting_inside_overlapping_bodies_stays_in_world_space() {
    let unit =
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 1.0), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
            .into_shared();
    let mut world = PhysicsWorld::new();
    world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(-0.5, 0.0, 0.0)), unit.clone()));
    world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.5, 0.0, 0.0)), unit));

    let input = RaycastInput::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
    let hit = world.cast_ray_closest(&input).unwrap();
    assert_eq!(hit.fraction, 0.0);
    assert!(hit.rigid_body_index.is_some());
    assert_relative_eq!(hit.position.x, 0.0, epsilon = 1e-6);
    assert_relative_eq!(hit.position.z, 0.0, epsilon = 1e-6);
}

#[test]
fn closest_ray_starting_inside_compound_children_keeps_child_key() {
    let unit =
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 1.0), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
            .into_shared();
    let pair = Collider::create_compound(vec![
        CompoundChild::new(Transform::from_position(Vec3::new(-0.5, 0.0, 0.0)), unit.clone()),
        CompoundChild::new(Transform::from_position(Vec3::new(0.5, 0.0, 0.0)), unit),
    ])
    .unwrap();

    let hit = pair
        .cast_ray_closest(&RaycastInput::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0)))
        .unwrap();
    assert_eq!(hit.fraction, 0.0);
    assert!(!hit.collider_key.is_empty());
    assert_relative_eq!(hit.position.x, 0.0, epsilon = 1e-6);
}
