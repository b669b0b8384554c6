//! Symplectic-Euler velocity/position integration and previous-position
//! snapshotting (spec §3, §4.1 steps 1-3, component C).

use crate::config::PhysicsConfig;
use crate::math::Vector;
use crate::world::World;

/// Applies the gravity impulse to particles and dynamic bodies
/// (spec §4.1 step 1).
pub fn apply_gravity(world: &mut World, config: &PhysicsConfig, substep_dt: f32) {
    let gravity = Vector::new(config.gravity_x, config.gravity_y);
    let n = world.particles.len();
    for i in 0..n {
        if world.particles.inv_mass[i] == 0.0 {
            continue;
        }
        let v = world.particles.velocity(i) + gravity * substep_dt;
        world.particles.set_velocity(i, v);
    }
    for body in &mut world.bodies {
        if body.is_static() {
            continue;
        }
        body.vel_x += gravity.x * substep_dt;
        body.vel_y += gravity.y * substep_dt;
    }
}

/// Snapshots `prev_*` positions/angles before integration (spec §4.1 step 2).
pub fn snapshot_previous(world: &mut World) {
    let n = world.particles.len();
    for i in 0..n {
        world.particles.prev_pos_x[i] = world.particles.pos_x[i];
        world.particles.prev_pos_y[i] = world.particles.pos_y[i];
    }
    for body in &mut world.bodies {
        body.prev_x = body.x;
        body.prev_y = body.y;
        body.prev_angle = body.angle;
    }
}

/// Symplectic-Euler position integration from the (already updated)
/// velocities (spec §4.1 step 3).
pub fn integrate_positions(world: &mut World, substep_dt: f32) {
    let n = world.particles.len();
    for i in 0..n {
        if world.particles.inv_mass[i] == 0.0 {
            continue;
        }
        let p = world.particles.position(i) + world.particles.velocity(i) * substep_dt;
        world.particles.set_position(i, p);
    }
    for body in &mut world.bodies {
        if body.is_static() {
            continue;
        }
        body.x += body.vel_x * substep_dt;
        body.y += body.vel_y * substep_dt;
        body.angle += body.ang_vel * substep_dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    #[test]
    fn gravity_moves_free_particle_down() {
        let mut world = World::new();
        world.add_particle(Vector::ZERO, 1.0, 0.1);
        let config = PhysicsConfig::default();
        let h = config.substep_dt();
        apply_gravity(&mut world, &config, h);
        snapshot_previous(&mut world);
        integrate_positions(&mut world, h);
        assert!(world.particles.pos_y[0] < 0.0);
    }

    #[test]
    fn pinned_particle_does_not_move() {
        let mut world = World::new();
        world.add_particle(Vector::ZERO, 0.0, 0.1);
        let config = PhysicsConfig::default();
        let h = config.substep_dt();
        apply_gravity(&mut world, &config, h);
        integrate_positions(&mut world, h);
        assert_eq!(world.particles.pos_y[0], 0.0);
    }
}
