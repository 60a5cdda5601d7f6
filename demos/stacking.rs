use rigid_collide::*;

fn main() {
    env_logger::init();

    let config = StepConfig::default();
    let cube = Collider::create_box(
        BoxGeometry::default(),
        CollisionFilter::DEFAULT,
        Material::default().with_flags(MaterialFlags::ENABLE_COLLISION_EVENTS),
    )
    .unwrap()
    .into_shared();
    let ground = Collider::create_box(
        BoxGeometry::from_size(Vec3::new(20.0, 1.0, 20.0)),
        CollisionFilter::DEFAULT,
        Material::default(),
    )
    .unwrap()
    .into_shared();

    let mut world = PhysicsWorld::new().with_collision_tolerance(config.collision_tolerance);
    world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)), ground));
    let unit_mass = MotionVelocity::from_mass_properties(&cube.mass_properties(), 1.0);
    for i in 0..5 {
        let position = Vec3::new(0.0, i as f32 * 1.05 + 0.6, 0.0);
        world.add_dynamic_body(RigidBody::new(Transform::from_position(position), cube.clone()), unit_mass);
    }

    let mut simulation = Simulation::new(config);
    for frame in 0..120 {
        world.integrate(config.time_step, config.gravity);
        let output = simulation.step(&world);
        if frame % 30 == 0 {
            println!(
                "frame {frame}: {} manifolds, {} collision events",
                output.narrow_phase.contacts.len(),
                output.events.collision_events().len()
            );
        }
    }

    println!("{:#?}", simulation.profiler());
}
