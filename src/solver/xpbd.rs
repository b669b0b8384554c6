//! XPBD constraint solver: per-iteration position corrections for rods,
//! angles, motors, and particle-collider contacts (spec §4.2, component D).
//!
//! Rod, angle, and motor constraints are modeled as distinct containers
//! rather than a tagged union (spec §9): their solve order is fixed by
//! specification and their hot loops are homogeneous per container.

use crate::math::{cross, perp, wrap_angle, Scalar, Vector, EPSILON};
use crate::world::{AngleConstraint, MotorAngle, Rod, World};

/// A single scalar-constraint XPBD update (spec §4.2's boxed formula).
///
/// `gradients` and `inv_masses` are parallel arrays over the participants;
/// returns the Lagrange multiplier delta `delta_lambda`, or `None` if the
/// generalized mass `w` is degenerate.
fn xpbd_delta_lambda(
    c: Scalar,
    lambda: Scalar,
    gradients: &[Vector],
    inv_masses: &[Scalar],
    compliance: Scalar,
    dt: Scalar,
) -> Option<Scalar> {
    let alpha = compliance / (dt * dt);
    let w: Scalar = gradients
        .iter()
        .zip(inv_masses)
        .map(|(g, &inv_m)| inv_m * g.length_squared())
        .sum();
    let denom = w + alpha;
    if denom <= EPSILON {
        return None;
    }
    Some(-(c + alpha * lambda) / denom)
}

fn effective_compliance(per_constraint: Scalar, global: Scalar) -> Scalar {
    if per_constraint != 0.0 {
        per_constraint
    } else {
        global
    }
}

/// Solves all rod (distance-equality) constraints once (spec §4.2).
pub fn solve_rods(world: &mut World, global_compliance: Scalar, dt: Scalar) {
    for idx in 0..world.rods.len() {
        solve_one_rod(world, idx, global_compliance, dt);
    }
}

fn solve_one_rod(world: &mut World, idx: usize, global_compliance: Scalar, dt: Scalar) {
    let rod: Rod = world.rods[idx];
    let pi = world.particles.position(rod.i);
    let pj = world.particles.position(rod.j);
    let delta = pi - pj;
    let dist = delta.length();
    if dist <= EPSILON {
        return;
    }
    let n = delta / dist;
    let c = dist - rod.rest_length;

    let w_i = world.particles.inv_mass[rod.i];
    let w_j = world.particles.inv_mass[rod.j];
    let compliance = effective_compliance(rod.compliance, global_compliance);

    let Some(delta_lambda) = xpbd_delta_lambda(c, rod.lambda, &[n, -n], &[w_i, w_j], compliance, dt) else {
        return;
    };

    world.rods[idx].lambda += delta_lambda;
    if w_i != 0.0 {
        world.particles.set_position(rod.i, pi + n * (w_i * delta_lambda));
    }
    if w_j != 0.0 {
        world.particles.set_position(rod.j, pj - n * (w_j * delta_lambda));
    }
}

/// Coupled angle-constraint gradient at vertex `j` (spec §4.2).
///
/// Returns `(theta, grad_u, grad_v)` where `grad_u`/`grad_v` are `dtheta/du`
/// and `dtheta/dv` for edges `u = p_i - p_j`, `v = p_k - p_j`. Validated
/// against the symmetric 90-degree scenario (spec §9).
fn angle_gradient(u: Vector, v: Vector) -> (Scalar, Vector, Vector) {
    let c = u.dot(v);
    let s = cross(u, v);
    let theta = wrap_angle(s.atan2(c));
    let den = u.length_squared() * v.length_squared() + EPSILON;
    let grad_u = (perp(v) * c - v * s) / den;
    let grad_v = (perp(u) * c - u * s) / den;
    (theta, grad_u, grad_v)
}

/// Shared solve body for angle/motor constraints: both are `C = theta -
/// target` scalar constraints with the same coupled gradient, differing only
/// in their target and compliance source (spec §4.2).
fn solve_angle_like(
    world: &mut World,
    i: usize,
    j: usize,
    k: usize,
    target: Scalar,
    compliance: Scalar,
    lambda: Scalar,
    dt: Scalar,
    lambda_cap: Option<Scalar>,
) -> Option<Scalar> {
    let pi = world.particles.position(i);
    let pj = world.particles.position(j);
    let pk = world.particles.position(k);
    let u = pi - pj;
    let v = pk - pj;

    let (theta, grad_u, grad_v) = angle_gradient(u, v);
    let c = wrap_angle(theta - target);

    let grad_i = grad_u;
    let grad_k = grad_v;
    let grad_j = -(grad_u + grad_v);

    let w_i = world.particles.inv_mass[i];
    let w_j = world.particles.inv_mass[j];
    let w_k = world.particles.inv_mass[k];

    let mut delta_lambda = xpbd_delta_lambda(
        c,
        lambda,
        &[grad_i, grad_j, grad_k],
        &[w_i, w_j, w_k],
        compliance,
        dt,
    )?;

    if let Some(cap) = lambda_cap {
        delta_lambda = delta_lambda.clamp(-cap, cap);
    }

    if w_i != 0.0 {
        world.particles.set_position(i, pi + grad_i * (w_i * delta_lambda));
    }
    if w_j != 0.0 {
        world.particles.set_position(j, pj + grad_j * (w_j * delta_lambda));
    }
    if w_k != 0.0 {
        world.particles.set_position(k, pk + grad_k * (w_k * delta_lambda));
    }

    Some(delta_lambda)
}

/// Optional `|delta_lambda|` cap improving robustness for large initial angle
/// error (spec §4.2).
const ANGLE_LAMBDA_CAP: Scalar = 10.0;

/// Solves all angle constraints once (spec §4.2).
pub fn solve_angles(world: &mut World, global_compliance: Scalar, dt: Scalar) {
    for idx in 0..world.angles.len() {
        let a: AngleConstraint = world.angles[idx];
        let compliance = effective_compliance(a.compliance, global_compliance);
        if let Some(delta) = solve_angle_like(
            world,
            a.i,
            a.j,
            a.k,
            a.target,
            compliance,
            a.lambda,
            dt,
            Some(ANGLE_LAMBDA_CAP),
        ) {
            world.angles[idx].lambda += delta;
        }
    }
}

/// Solves all motor-angle (servo target) constraints once (spec §4.2).
pub fn solve_motors(world: &mut World, global_compliance: Scalar, dt: Scalar) {
    for idx in 0..world.motors.len() {
        let m: MotorAngle = world.motors[idx];
        let compliance = effective_compliance(m.compliance, global_compliance);
        if let Some(delta) = solve_angle_like(
            world,
            m.i,
            m.j,
            m.k,
            m.target,
            compliance,
            m.lambda,
            dt,
            Some(ANGLE_LAMBDA_CAP),
        ) {
            world.motors[idx].lambda += delta;
        }
    }
}

/// Resets all XPBD Lagrange multipliers at the start of a substep
/// (spec §4.1 step 5).
pub fn reset_lambdas(world: &mut World) {
    for rod in &mut world.rods {
        rod.lambda = 0.0;
    }
    for angle in &mut world.angles {
        angle.lambda = 0.0;
    }
    for motor in &mut world.motors {
        motor.lambda = 0.0;
    }
}

/// Solves particle-vs-static-collider contacts as one-sided XPBD constraints
/// (spec §4.2). Per the spec, particle-particle collisions and dynamic-vs-
/// dynamic collisions are out of scope.
pub fn solve_particle_contacts(world: &mut World, global_compliance: Scalar, dt: Scalar) {
    let n = world.particles.len();
    for i in 0..n {
        let inv_mass = world.particles.inv_mass[i];
        if inv_mass == 0.0 {
            continue;
        }
        let radius = world.particles.radius[i];
        let p = world.particles.position(i);

        // Solve against the most-penetrating collider found this iteration;
        // other constraints and further iterations pick up remaining overlap.
        let mut worst: Option<(Scalar, Vector)> = None;
        for collider in &world.colliders {
            let result = collider.sdf(p, radius);
            if result.phi < 0.0 && worst.map_or(true, |(phi, _)| result.phi < phi) {
                worst = Some((result.phi, result.normal));
            }
        }

        let Some((phi, normal)) = worst else { continue };
        let Some(delta_lambda) =
            xpbd_delta_lambda(phi, 0.0, &[normal], &[inv_mass], global_compliance, dt)
        else {
            continue;
        };
        // One-sided: never pull the particle further in (Lagrange multiplier
        // for a C >= 0 inequality constraint must stay non-negative).
        let delta_lambda = delta_lambda.max(0.0);
        world
            .particles
            .set_position(i, p + normal * (inv_mass * delta_lambda));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use approx::assert_relative_eq;
    use core::f32::consts::FRAC_PI_2;

    #[test]
    fn rod_converges_to_rest_length() {
        let mut world = World::new();
        let i = world.add_particle(Vector::new(0.0, 0.0), 1.0, 0.0);
        let j = world.add_particle(Vector::new(2.0, 0.0), 1.0, 0.0);
        world.add_rod(i, j, 1.0, 0.0).unwrap();
        for _ in 0..50 {
            reset_lambdas(&mut world);
            solve_rods(&mut world, 0.0, 1.0 / 60.0);
        }
        let dist = (world.particles.position(i) - world.particles.position(j)).length();
        assert_relative_eq!(dist, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn angle_gradient_symmetric_at_90_degrees() {
        // u and v perpendicular, equal length: gradients should have equal magnitude.
        let u = Vector::new(1.0, 0.0);
        let v = Vector::new(0.0, 1.0);
        let (theta, grad_u, grad_v) = angle_gradient(u, v);
        assert_relative_eq!(theta, FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(grad_u.length(), grad_v.length(), epsilon = 1e-5);
    }

    #[test]
    fn angle_constraint_reduces_error_towards_target() {
        let mut world = World::new();
        let i = world.add_particle(Vector::new(1.0, 0.2), 1.0, 0.0);
        let j = world.add_particle(Vector::new(0.0, 0.0), 1.0, 0.0);
        let k = world.add_particle(Vector::new(0.0, 1.0), 1.0, 0.0);
        world.add_angle(i, j, k, FRAC_PI_2, 0.0).unwrap();

        let (theta0, _, _) = angle_gradient(
            world.particles.position(i) - world.particles.position(j),
            world.particles.position(k) - world.particles.position(j),
        );
        let err0 = (wrap_angle(theta0 - FRAC_PI_2)).abs();

        for _ in 0..10 {
            reset_lambdas(&mut world);
            solve_angles(&mut world, 0.0001, 1.0 / 60.0);
        }

        let (theta1, _, _) = angle_gradient(
            world.particles.position(i) - world.particles.position(j),
            world.particles.position(k) - world.particles.position(j),
        );
        let err1 = (wrap_angle(theta1 - FRAC_PI_2)).abs();
        assert!(err1 < err0);
    }

    #[test]
    fn particle_contact_resolves_penetration() {
        use crate::math::StaticCollider;
        let mut world = World::new();
        let i = world.add_particle(Vector::new(0.0, -0.5), 1.0, 0.1);
        world.add_static_collider(StaticCollider::Obb {
            center: Vector::new(0.0, -1.0),
            x_axis: Vector::new(1.0, 0.0),
            half_x: 10.0,
            half_y: 0.5,
        });
        for _ in 0..4 {
            solve_particle_contacts(&mut world, 0.0, 1.0 / 60.0);
        }
        let p = world.particles.position(i);
        let collider = world.colliders[0];
        let result = collider.sdf(p, world.particles.radius[i]);
        assert!(result.phi >= -1e-3);
    }
}
