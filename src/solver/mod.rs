//! Runs the fixed-timestep stepper that advances particles, rigid bodies,
//! constraints, joints, and static colliders (spec §4.1, component G).
//!
//! # Steps
//!
//! `step` runs `config.substeps` substeps. Each substep executes, in order:
//!
//! 1. Apply gravity to particles and dynamic bodies.
//! 2. Snapshot `prev_*` positions/angles.
//! 3. Symplectic-Euler integrate positions.
//! 4. Refresh world-space geom positions.
//! 5. Reset XPBD Lagrange multipliers to zero.
//! 6. `xpbd_iterations` passes of `{rods -> angles -> motors -> particle-contacts}`.
//! 7. Build/refresh the rigid-body contact list, warm-start from the cache,
//!    then `xpbd_iterations` passes of `{contact-velocity -> joint-velocity}`.
//! 8. One joint position pass correcting anchor drift and limit violations.
//! 9. Velocity stabilization with a magnitude clamp.
//! 10. Tangential-friction pass on particles.
//! 11. Global linear + angular damping.
//! 12. Store impulses back to the warm-start cache.
//!
//! Ordering of steps 6 and 7 relative to each other is independent within a
//! substep; particles and rigid bodies do not interact (spec §4.1).
//!
//! The stepper is infallible given valid indices; NaN propagation is not
//! scrubbed here, per spec §4.17 — divergence detection is an
//! environment-level concern (see [`crate::environment`]).

pub mod contact;
pub mod friction;
pub mod joints;
pub mod xpbd;

use crate::config::PhysicsConfig;
use crate::world::World;

/// Advances `world` by one frame (`config.dt`, split into `config.substeps`
/// fixed substeps).
pub fn step(world: &mut World, config: &PhysicsConfig) {
    let substep_dt = config.substep_dt();
    for _ in 0..config.substeps {
        substep(world, config, substep_dt);
    }
}

fn substep(world: &mut World, config: &PhysicsConfig, dt: f32) {
    let _span = tracing::trace_span!("substep").entered();

    crate::integrator::apply_gravity(world, config, dt);
    crate::integrator::snapshot_previous(world);
    crate::integrator::integrate_positions(world, dt);
    world.refresh_geom_positions();

    xpbd::reset_lambdas(world);
    {
        let _span = tracing::trace_span!("xpbd").entered();
        for _ in 0..config.xpbd_iterations {
            xpbd::solve_rods(world, config.rod_compliance, dt);
            xpbd::solve_angles(world, config.angle_compliance, dt);
            xpbd::solve_motors(world, config.motor_compliance, dt);
            xpbd::solve_particle_contacts(world, config.contact_compliance, dt);
        }
    }

    {
        let _span = tracing::trace_span!("impulse").entered();
        contact::build_and_warm_start(world, config);
        joints::prepare_joints(world);
        for iteration in 0..config.xpbd_iterations {
            contact::solve_velocity_iteration(world, iteration == 0);
            joints::solve_joints_velocity(world, dt);
        }
        joints::solve_joints_position(world);
    }

    friction::stabilize_velocities(world, dt, config.velocity_stabilization_beta, config.max_velocity);
    friction::apply_particle_friction(world, config.friction_mu);
    friction::apply_damping(world, config, dt);

    world.store_impulse_cache();
}
