use approx::assert_relative_eq;
use rigid_collide::{
    BoxGeometry, Collider, ColliderCastInput, ColliderDistanceInput, CollisionFilter, CompoundChild, Material,
    PhysicsWorld, PointDistanceInput, RaycastInput, RigidBody, SphereGeometry, Transform, Vec3,
};

fn flat_terrain() -> Collider {
    Collider::create_terrain(
        [3, 3],
        vec![0.0; 9],
        Vec3::ONE,
        CollisionFilter::DEFAULT,
        Material::default(),
    )
    .unwrap()
}

fn ball(radius: f32) -> Collider {
    Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, radius), CollisionFilter::DEFAULT, Material::default())
        .unwrap()
}

#[test]
fn terrain_answers_ray_and_point_queries() {
    let terrain = flat_terrain();

    let hit = terrain
        .cast_ray_closest(&RaycastInput::new(Vec3::new(0.5, 5.0, 0.5), Vec3::new(0.5, -5.0, 0.5)))
        .unwrap();
    assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-5);
    assert_relative_eq!(hit.surface_normal.y.abs(), 1.0, epsilon = 1e-5);
    assert!(!hit.collider_key.is_empty());

    let outside = RaycastInput::new(Vec3::new(5.0, 5.0, 0.5), Vec3::new(5.0, -5.0, 0.5));
    assert!(!terrain.cast_ray_any(&outside));

    let closest = terrain
        .calculate_distance_point_closest(&PointDistanceInput::new(Vec3::new(0.5, 2.0, 0.5), 5.0))
        .unwrap();
    assert_relative_eq!(closest.distance(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(closest.surface_normal.y, 1.0, epsilon = 1e-4);

    let far = PointDistanceInput::new(Vec3::new(0.5, 2.0, 0.5), 1.0);
    assert!(terrain.calculate_distance_point_closest(&far).is_none());
}

#[test]
fn sphere_cast_stops_at_first_compound_child() {
    let cube = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::default())
        .unwrap()
        .into_shared();
    let compound = Collider::create_compound(vec![
        CompoundChild::new(Transform::from_position(Vec3::new(-2.0, 0.0, 0.0)), cube.clone()),
        CompoundChild::new(Transform::from_position(Vec3::new(2.0, 0.0, 0.0)), cube),
    ])
    .unwrap();

    let sphere = ball(0.5);
    let input = ColliderCastInput::new(&sphere, Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
    let hit = compound.cast_collider_closest(&input).unwrap();
    assert_relative_eq!(hit.fraction, 0.2, epsilon = 1e-3);
    assert_relative_eq!(hit.position.x, -2.5, epsilon = 1e-3);
    assert_relative_eq!(hit.surface_normal.x, -1.0, epsilon = 1e-3);

    let all = compound.cast_collider_all(&input);
    assert_eq!(all.len(), 2);
    assert_ne!(all[0].collider_key, all[1].collider_key);
}

#[test]
fn world_distance_queries_cover_terrain_bodies() {
    let mut world = PhysicsWorld::new();
    world.add_static_body(RigidBody::new(
        Transform::from_position(Vec3::new(10.0, 0.0, 0.0)),
        flat_terrain().into_shared(),
    ));

    let probe = ball(0.5);
    let input = ColliderDistanceInput::new(&probe, Transform::from_position(Vec3::new(10.5, 3.0, 0.5)), 5.0);
    let hit = world.calculate_distance_collider_closest(&input).unwrap();
    assert_eq!(hit.rigid_body_index, Some(0));
    assert_relative_eq!(hit.distance(), 2.5, epsilon = 1e-3);
    assert_relative_eq!(hit.position.y, 0.0, epsilon = 1e-3);

    let point = world
        .calculate_distance_point_closest(&PointDistanceInput::new(Vec3::new(11.0, 1.0, 1.0), 2.0))
        .unwrap();
    assert_relative_eq!(point.distance(), 1.0, epsilon = 1e-4);
}

#[test]
fn mesh_filter_applies_to_every_triangle() {
    let mesh_filter = CollisionFilter::new(0b10, 0b10);
    let mesh = Collider::create_mesh(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::new(1.0, 0.0, 1.0)],
        vec![[0, 2, 1], [1, 2, 3]],
        mesh_filter,
        Material::default(),
    )
    .unwrap();

    for target in [Vec3::new(0.25, 0.0, 0.25), Vec3::new(0.75, 0.0, 0.75)] {
        let start = target + Vec3::Y;
        let end = target - Vec3::Y;

        let blocked = RaycastInput::new(start, end).with_filter(CollisionFilter::new(0b01, 0b01));
        assert!(mesh.cast_ray_closest(&blocked).is_none());

        let accepted = RaycastInput::new(start, end).with_filter(mesh_filter);
        let hit = mesh.cast_ray_closest(&accepted).unwrap();
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-5);
    }
}
