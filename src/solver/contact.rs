//! Warm-started sequential-impulse contact solver for rigid-body geoms
//! against static colliders (spec §4.3, component E).

use crate::config::PhysicsConfig;
use crate::math::{perp, Scalar, Vector};
use crate::world::{Contact, ContactKey, World};

/// Builds the contact list for this substep from body geoms vs static
/// colliders, applies the previous frame's warm-start impulses once, and
/// clears `world.contacts` of anything stale (spec §4.1 step 7, §4.3 steps 1-5).
pub fn build_and_warm_start(world: &mut World, config: &PhysicsConfig) {
    world.refresh_geom_positions();

    let mut contacts = Vec::new();
    for (geom_idx, geom) in world.geoms.iter().enumerate() {
        let body = world.bodies[geom.body_idx];
        if body.is_static() {
            continue;
        }
        for (collider_idx, collider) in world.colliders.iter().enumerate() {
            let result = collider.sdf(geom.world_pos, geom.radius);
            if result.phi >= 0.0 {
                continue;
            }
            let normal = result.normal;
            let contact_point = geom.world_pos - normal * geom.radius;
            let r = contact_point - body.position();
            let tangent = perp(normal);

            let ang_cross_n = crate::math::cross(r, normal);
            let ang_cross_t = crate::math::cross(r, tangent);
            let normal_denom = body.inv_mass + body.inv_inertia * ang_cross_n * ang_cross_n;
            let tangent_denom = body.inv_mass + body.inv_inertia * ang_cross_t * ang_cross_t;

            let normal_mass = if normal_denom > 0.0 { 1.0 / normal_denom } else { 0.0 };
            let tangent_mass = if tangent_denom > 0.0 { 1.0 / tangent_denom } else { 0.0 };

            let vel_bias = (0.2 / config.dt.max(1e-8)) * (-result.phi - 0.01).max(0.0);

            let rel_vel = body.velocity() + Vector::new(-body.ang_vel * r.y, body.ang_vel * r.x);
            let initial_normal_velocity = rel_vel.dot(normal);

            let key = ContactKey {
                body_idx: geom.body_idx,
                geom_idx,
                collider_idx,
            };
            let (normal_impulse, tangent_impulse) = world.cached_impulse(key).unwrap_or((0.0, 0.0));

            contacts.push(Contact {
                body_idx: geom.body_idx,
                geom_idx,
                collider_idx,
                normal,
                tangent,
                contact_point,
                r_to_body: r,
                separation: result.phi,
                normal_mass,
                tangent_mass,
                vel_bias,
                normal_impulse,
                tangent_impulse,
                friction: config.friction_mu,
                restitution: config.restitution,
                initial_normal_velocity,
            });
        }
    }
    world.contacts = contacts;

    // Apply warm-start impulses once per substep.
    for idx in 0..world.contacts.len() {
        let contact = world.contacts[idx];
        apply_body_impulse(world, contact.body_idx, contact.normal * contact.normal_impulse, contact.r_to_body);
        apply_body_impulse(world, contact.body_idx, contact.tangent * contact.tangent_impulse, contact.r_to_body);
    }
}

fn apply_body_impulse(world: &mut World, body_idx: usize, impulse: Vector, r: Vector) {
    let body = &mut world.bodies[body_idx];
    if body.is_static() {
        return;
    }
    let v = body.velocity() + impulse * body.inv_mass;
    body.set_velocity(v);
    body.ang_vel += body.inv_inertia * crate::math::cross(r, impulse);
}

/// One velocity-iteration pass over all contacts: friction first, then
/// normal (spec §4.3 step "Iteration loop").
pub fn solve_velocity_iteration(world: &mut World, restitution_first_iteration: bool) {
    for idx in 0..world.contacts.len() {
        solve_friction(world, idx);
        solve_normal(world, idx, restitution_first_iteration);
    }
}

fn body_point_velocity(world: &World, body_idx: usize, r: Vector) -> Vector {
    let body = world.bodies[body_idx];
    body.velocity() + Vector::new(-body.ang_vel * r.y, body.ang_vel * r.x)
}

fn solve_friction(world: &mut World, idx: usize) {
    let contact = world.contacts[idx];
    let v = body_point_velocity(world, contact.body_idx, contact.r_to_body);
    let v_t = v.dot(contact.tangent);

    if contact.tangent_mass <= 0.0 {
        return;
    }
    let delta_lambda = -contact.tangent_mass * v_t;
    let max_friction = contact.friction * contact.normal_impulse.max(0.0);
    let new_impulse = (contact.tangent_impulse + delta_lambda).clamp(-max_friction, max_friction);
    let applied = new_impulse - contact.tangent_impulse;
    world.contacts[idx].tangent_impulse = new_impulse;

    apply_body_impulse(world, contact.body_idx, contact.tangent * applied, contact.r_to_body);
}

fn solve_normal(world: &mut World, idx: usize, restitution_first_iteration: bool) {
    let contact = world.contacts[idx];
    let v = body_point_velocity(world, contact.body_idx, contact.r_to_body);
    let v_n = v.dot(contact.normal);

    if contact.normal_mass <= 0.0 {
        return;
    }

    let bias = if restitution_first_iteration && contact.restitution > 0.0 {
        contact.vel_bias.max(-contact.restitution * contact.initial_normal_velocity)
    } else {
        contact.vel_bias
    };

    let delta_lambda = -contact.normal_mass * (v_n - bias);
    let new_impulse = (contact.normal_impulse + delta_lambda).max(0.0);
    let applied = new_impulse - contact.normal_impulse;
    world.contacts[idx].normal_impulse = new_impulse;

    apply_body_impulse(world, contact.body_idx, contact.normal * applied, contact.r_to_body);
}

/// Scalar used by tests and the friction pass to find the most-penetrating
/// collider for a body geom; exposed for the shared friction-stabilization
/// pass (spec §4.4).
#[must_use]
pub fn normal_mass_for(body_inv_mass: Scalar, body_inv_inertia: Scalar, ang_cross: Scalar) -> Scalar {
    let denom = body_inv_mass + body_inv_inertia * ang_cross * ang_cross;
    if denom > 0.0 { 1.0 / denom } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::StaticCollider;
    use crate::world::World;

    fn ground_world() -> World {
        let mut world = World::new();
        world.add_static_collider(StaticCollider::Obb {
            center: Vector::new(0.0, -1.0),
            x_axis: Vector::new(1.0, 0.0),
            half_x: 10.0,
            half_y: 0.5,
        });
        world
    }

    #[test]
    fn contact_at_exact_zero_phi_applies_no_impulse() {
        let mut world = ground_world();
        world.add_rigid_body(
            Vector::new(0.0, -0.5 + 0.1),
            0.0,
            1.0,
            1.0,
            &[(Vector::ZERO, 0.1)],
        );
        let config = PhysicsConfig::default();
        build_and_warm_start(&mut world, &config);
        assert_eq!(world.contacts.len(), 1);
        assert!((world.contacts[0].separation).abs() < 1e-5);
        solve_velocity_iteration(&mut world, true);
        assert_eq!(world.bodies[0].vel_y, 0.0);
    }

    #[test]
    fn penetrating_body_gets_separating_impulse() {
        let mut world = ground_world();
        world.add_rigid_body(
            Vector::new(0.0, -0.55),
            0.0,
            1.0,
            1.0,
            &[(Vector::ZERO, 0.1)],
        );
        world.bodies[0].vel_y = -1.0;
        let config = PhysicsConfig::default();
        build_and_warm_start(&mut world, &config);
        for _ in 0..4 {
            solve_velocity_iteration(&mut world, true);
        }
        assert!(world.bodies[0].vel_y > -1.0);
    }
}
