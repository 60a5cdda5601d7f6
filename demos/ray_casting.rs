use rigid_collide::*;

fn main() {
    env_logger::init();

    let ball = Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 1.0), CollisionFilter::DEFAULT, Material::default())
        .unwrap()
        .into_shared();
    let cube = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::default())
        .unwrap()
        .into_shared();

    let mut world = PhysicsWorld::new();
    world.add_static_body(RigidBody::new(Transform::IDENTITY, ball));
    world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.0, 4.0)), cube));

    let ray = RaycastInput::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 10.0));
    for hit in world.cast_ray_all(&ray) {
        println!(
            "body {:?} at {:?} (fraction {:.3}, normal {:?})",
            hit.rigid_body_index, hit.position, hit.fraction, hit.surface_normal
        );
    }
}
