//! Friction and stabilization pass: velocity rederivation from position
//! deltas, tangential Coulomb clamp for particles, and global damping
//! (spec §4.1 steps 9-11, §4.4, component F).

use crate::config::PhysicsConfig;
use crate::math::Vector;
use crate::world::World;

/// Velocity stabilization: `v <- beta*(p - p_prev)/dt + (1-beta)*v`, with a
/// magnitude clamp to `max_velocity` (spec §4.1 step 9).
pub fn stabilize_velocities(world: &mut World, substep_dt: f32, beta: f32, max_velocity: f32) {
    let n = world.particles.len();
    for i in 0..n {
        if world.particles.inv_mass[i] == 0.0 {
            continue;
        }
        let derived = (world.particles.position(i) - world.particles.prev_position(i)) / substep_dt;
        let mut v = derived * beta + world.particles.velocity(i) * (1.0 - beta);
        v = clamp_magnitude(v, max_velocity);
        world.particles.set_velocity(i, v);
    }

    for body in &mut world.bodies {
        if body.is_static() {
            continue;
        }
        let derived = Vector::new(
            (body.x - body.prev_x) / substep_dt,
            (body.y - body.prev_y) / substep_dt,
        );
        let mut v = derived * beta + body.velocity() * (1.0 - beta);
        v = clamp_magnitude(v, max_velocity);
        body.set_velocity(v);

        let derived_ang = wrap_delta_angle(body.angle, body.prev_angle) / substep_dt;
        body.ang_vel = derived_ang * beta + body.ang_vel * (1.0 - beta);
    }
}

fn wrap_delta_angle(angle: f32, prev_angle: f32) -> f32 {
    crate::math::wrap_angle(angle - prev_angle)
}

fn clamp_magnitude(v: Vector, max_len: f32) -> Vector {
    let len = v.length();
    if len > max_len && len > 0.0 {
        v * (max_len / len)
    } else {
        v
    }
}

/// Tangential Coulomb-like velocity clamp on particles, using the most-
/// penetrating collider's normal (spec §4.4). Select `v_n n + v_t`; shrink
/// `v_t` by `max(0, 1 - mu*|v_n|/|v_t|)`.
pub fn apply_particle_friction(world: &mut World, mu: f32) {
    let n = world.particles.len();
    for i in 0..n {
        if world.particles.inv_mass[i] == 0.0 {
            continue;
        }
        let radius = world.particles.radius[i];
        let p = world.particles.position(i);

        let mut worst: Option<(f32, Vector)> = None;
        for collider in &world.colliders {
            let result = collider.sdf(p, radius);
            if worst.map_or(true, |(phi, _)| result.phi < phi) {
                worst = Some((result.phi, result.normal));
            }
        }
        let Some((phi, normal)) = worst else { continue };
        if phi >= 0.0 {
            continue;
        }

        let v = world.particles.velocity(i);
        let v_n_scalar = v.dot(normal);
        let v_n = normal * v_n_scalar;
        let v_t = v - v_n;
        let v_t_len = v_t.length();
        if v_t_len <= 1e-8 {
            continue;
        }
        let shrink = (1.0 - mu * v_n_scalar.abs() / v_t_len).max(0.0);
        world.particles.set_velocity(i, v_n + v_t * shrink);
    }
}

/// Global linear + angular damping: `v <- v * max(0, 1 - damping*dt)`
/// (spec §4.1 step 11, §4.4).
pub fn apply_damping(world: &mut World, config: &PhysicsConfig, substep_dt: f32) {
    let linear_factor = (1.0 - config.global_damping * substep_dt).max(0.0);
    let angular_factor = (1.0 - config.angular_damping * substep_dt).max(0.0);

    let n = world.particles.len();
    for i in 0..n {
        if world.particles.inv_mass[i] == 0.0 {
            continue;
        }
        let v = world.particles.velocity(i) * linear_factor;
        world.particles.set_velocity(i, v);
    }

    for body in &mut world.bodies {
        if body.is_static() {
            continue;
        }
        let v = body.velocity() * linear_factor;
        body.set_velocity(v);
        body.ang_vel *= angular_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    #[test]
    fn damping_shrinks_velocity() {
        let mut world = World::new();
        world.add_particle(Vector::ZERO, 1.0, 0.1);
        world.particles.set_velocity(0, Vector::new(10.0, 0.0));
        let mut config = PhysicsConfig::default();
        config.global_damping = 1.0;
        apply_damping(&mut world, &config, 1.0 / 60.0);
        assert!(world.particles.velocity(0).x < 10.0);
    }

    #[test]
    fn max_velocity_clamp_applies() {
        let mut world = World::new();
        world.add_particle(Vector::ZERO, 1.0, 0.1);
        world.particles.set_position(0, Vector::new(100.0, 0.0));
        stabilize_velocities(&mut world, 1.0 / 60.0, 1.0, 5.0);
        assert!(world.particles.velocity(0).length() <= 5.0 + 1e-4);
    }
}
