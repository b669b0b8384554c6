//! Sequential-impulse revolute joint solver: limits, motor, and anchor
//! equality, plus a single position-correction pass (spec §4.3, component E).

use crate::math::{rotate, wrap_angle, Scalar, Vector};
use crate::world::{JointSolverState, RevoluteJoint, World};

fn world_anchor(world: &World, body_idx: usize, local_anchor: Vector) -> Vector {
    let body = world.bodies[body_idx];
    body.position() + rotate(local_anchor, body.angle)
}

/// Initializes the 2x2 effective mass and scalar motor/limit masses for every
/// joint ahead of the velocity-iteration loop (spec §4.3).
pub fn prepare_joints(world: &mut World) {
    for idx in 0..world.joints.len() {
        prepare_one(world, idx);
    }
}

fn prepare_one(world: &mut World, idx: usize) {
    let joint: RevoluteJoint = world.joints[idx];
    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];

    let ra = rotate(joint.local_anchor_a, body_a.angle);
    let rb = rotate(joint.local_anchor_b, body_b.angle);

    let inv_mass_sum = body_a.inv_mass + body_b.inv_mass;

    // K = (invMassA + invMassB) * I + invIa * skew(ra) skew(ra)^T + invIb * skew(rb) skew(rb)^T
    let k00 = inv_mass_sum + body_a.inv_inertia * ra.y * ra.y + body_b.inv_inertia * rb.y * rb.y;
    let k01 = -body_a.inv_inertia * ra.x * ra.y - body_b.inv_inertia * rb.x * rb.y;
    let k11 = inv_mass_sum + body_a.inv_inertia * ra.x * ra.x + body_b.inv_inertia * rb.x * rb.x;

    let det = k00 * k11 - k01 * k01;
    let inv_k = if det.abs() > 1e-10 {
        let inv_det = 1.0 / det;
        [k11 * inv_det, -k01 * inv_det, -k01 * inv_det, k00 * inv_det]
    } else {
        [0.0, 0.0, 0.0, 0.0]
    };

    let angular_inv_mass_sum = body_a.inv_inertia + body_b.inv_inertia;
    let limit_mass = if angular_inv_mass_sum > 0.0 { 1.0 / angular_inv_mass_sum } else { 0.0 };
    let motor_mass = limit_mass;

    world.joint_states[idx] = JointSolverState {
        inv_k,
        limit_mass,
        motor_mass,
        accumulated_motor_impulse: 0.0,
        accumulated_limit_impulse: 0.0,
        accumulated_point_impulse: Vector::ZERO,
    };
}

fn apply_angular_impulse(world: &mut World, body_a: usize, body_b: usize, impulse: Scalar) {
    {
        let a = &mut world.bodies[body_a];
        a.ang_vel -= a.inv_inertia * impulse;
    }
    {
        let b = &mut world.bodies[body_b];
        b.ang_vel += b.inv_inertia * impulse;
    }
}

fn apply_linear_impulse(world: &mut World, body_a: usize, body_b: usize, ra: Vector, rb: Vector, impulse: Vector) {
    {
        let a = &mut world.bodies[body_a];
        let v = a.velocity() - impulse * a.inv_mass;
        a.set_velocity(v);
        a.ang_vel -= a.inv_inertia * crate::math::cross(ra, impulse);
    }
    {
        let b = &mut world.bodies[body_b];
        let v = b.velocity() + impulse * b.inv_mass;
        b.set_velocity(v);
        b.ang_vel += b.inv_inertia * crate::math::cross(rb, impulse);
    }
}

/// One velocity-iteration pass over all joints: motor, then angle limit, then
/// anchor equality (spec §4.3 "Velocity pass, in order per iteration").
pub fn solve_joints_velocity(world: &mut World, dt: Scalar) {
    for idx in 0..world.joints.len() {
        solve_motor(world, idx, dt);
        solve_limit(world, idx);
        solve_anchor(world, idx);
    }
}

fn solve_motor(world: &mut World, idx: usize, dt: Scalar) {
    let joint = world.joints[idx];
    if !joint.enable_motor {
        return;
    }
    let state = world.joint_states[idx];
    if state.motor_mass <= 0.0 {
        return;
    }
    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    let c_dot = (body_b.ang_vel - body_a.ang_vel) - joint.motor_speed;
    let delta = -state.motor_mass * c_dot;

    let max_impulse = joint.max_motor_torque * dt;
    let old_impulse = state.accumulated_motor_impulse;
    let new_impulse = (old_impulse + delta).clamp(-max_impulse, max_impulse);
    let applied = new_impulse - old_impulse;
    world.joint_states[idx].accumulated_motor_impulse = new_impulse;

    apply_angular_impulse(world, joint.body_a, joint.body_b, applied);
}

fn relative_angle(world: &World, joint: &RevoluteJoint) -> Scalar {
    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    wrap_angle(body_b.angle - body_a.angle - joint.reference_angle)
}

fn solve_limit(world: &mut World, idx: usize) {
    let joint = world.joints[idx];
    if !joint.enable_limits {
        return;
    }
    let state = world.joint_states[idx];
    if state.limit_mass <= 0.0 {
        return;
    }
    let theta = relative_angle(world, &joint);

    let (c, sign): (Scalar, Scalar) = if theta < joint.lower_angle {
        (joint.lower_angle - theta, -1.0)
    } else if theta > joint.upper_angle {
        (theta - joint.upper_angle, 1.0)
    } else {
        return;
    };

    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    let c_dot = (body_b.ang_vel - body_a.ang_vel) * sign;
    let bias = (c.max(0.0)) * 0.2;
    let delta = -state.limit_mass * (c_dot + bias) * sign;

    let old_impulse = state.accumulated_limit_impulse;
    let new_impulse = if theta < joint.lower_angle {
        (old_impulse + delta).max(0.0)
    } else {
        (old_impulse + delta).min(0.0)
    };
    let applied = new_impulse - old_impulse;
    world.joint_states[idx].accumulated_limit_impulse = new_impulse;

    apply_angular_impulse(world, joint.body_a, joint.body_b, applied);
}

fn solve_anchor(world: &mut World, idx: usize) {
    let joint = world.joints[idx];
    let state = world.joint_states[idx];

    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    let ra = rotate(joint.local_anchor_a, body_a.angle);
    let rb = rotate(joint.local_anchor_b, body_b.angle);

    let va = body_a.velocity() + Vector::new(-body_a.ang_vel * ra.y, body_a.ang_vel * ra.x);
    let vb = body_b.velocity() + Vector::new(-body_b.ang_vel * rb.y, body_b.ang_vel * rb.x);
    let v_rel = vb - va;

    let delta = Vector::new(
        -(state.inv_k[0] * v_rel.x + state.inv_k[1] * v_rel.y),
        -(state.inv_k[2] * v_rel.x + state.inv_k[3] * v_rel.y),
    );

    world.joint_states[idx].accumulated_point_impulse += delta;
    apply_linear_impulse(world, joint.body_a, joint.body_b, ra, rb, delta);
}

/// Single post-velocity position-correction pass: corrects anchor drift
/// (clamped to 0.2m) and limit violations beyond a 2-degree slop
/// (spec §4.3 "A single position pass").
pub fn solve_joints_position(world: &mut World) {
    for idx in 0..world.joints.len() {
        correct_anchor_position(world, idx);
        correct_limit_position(world, idx);
    }
}

const MAX_ANCHOR_CORRECTION: Scalar = 0.2;
const LIMIT_SLOP: Scalar = 2.0_f32.to_radians();

fn correct_anchor_position(world: &mut World, idx: usize) {
    let joint = world.joints[idx];
    let anchor_a = world_anchor(world, joint.body_a, joint.local_anchor_a);
    let anchor_b = world_anchor(world, joint.body_b, joint.local_anchor_b);
    let c = anchor_b - anchor_a;
    if c.length_squared() < 1e-12 {
        return;
    }
    let clamped = if c.length() > MAX_ANCHOR_CORRECTION {
        c.normalize() * MAX_ANCHOR_CORRECTION
    } else {
        c
    };

    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    let ra = rotate(joint.local_anchor_a, body_a.angle);
    let rb = rotate(joint.local_anchor_b, body_b.angle);

    let k00 = body_a.inv_mass + body_b.inv_mass + body_a.inv_inertia * ra.y * ra.y + body_b.inv_inertia * rb.y * rb.y;
    let k01 = -body_a.inv_inertia * ra.x * ra.y - body_b.inv_inertia * rb.x * rb.y;
    let k11 = body_a.inv_mass + body_b.inv_mass + body_a.inv_inertia * ra.x * ra.x + body_b.inv_inertia * rb.x * rb.x;
    let det = k00 * k11 - k01 * k01;
    if det.abs() < 1e-10 {
        return;
    }
    let inv_det = 1.0 / det;
    let impulse = Vector::new(
        inv_det * (k11 * clamped.x - k01 * clamped.y),
        inv_det * (k00 * clamped.y - k01 * clamped.x),
    );

    {
        let a = &mut world.bodies[joint.body_a];
        let p = a.position() - impulse * a.inv_mass;
        a.set_position(p);
        a.angle -= a.inv_inertia * crate::math::cross(ra, impulse);
    }
    {
        let b = &mut world.bodies[joint.body_b];
        let p = b.position() + impulse * b.inv_mass;
        b.set_position(p);
        b.angle += b.inv_inertia * crate::math::cross(rb, impulse);
    }
}

fn correct_limit_position(world: &mut World, idx: usize) {
    let joint = world.joints[idx];
    if !joint.enable_limits {
        return;
    }
    let theta = relative_angle(world, &joint);
    let violation = if theta < joint.lower_angle - LIMIT_SLOP {
        theta - (joint.lower_angle - LIMIT_SLOP)
    } else if theta > joint.upper_angle + LIMIT_SLOP {
        theta - (joint.upper_angle + LIMIT_SLOP)
    } else {
        return;
    };

    let body_a = world.bodies[joint.body_a];
    let body_b = world.bodies[joint.body_b];
    let angular_inv_mass_sum = body_a.inv_inertia + body_b.inv_inertia;
    if angular_inv_mass_sum <= 0.0 {
        return;
    }
    let correction = -violation / angular_inv_mass_sum;

    let a = &mut world.bodies[joint.body_a];
    a.angle -= a.inv_inertia * correction;
    let b = &mut world.bodies[joint.body_b];
    b.angle += b.inv_inertia * correction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;
    use approx::assert_relative_eq;

    fn two_body_world() -> World {
        let mut world = World::new();
        world.add_rigid_body(Vector::ZERO, 0.0, 0.0, 0.0, &[]);
        world.add_rigid_body(Vector::new(1.0, 0.0), 0.0, 1.0, 1.0, &[]);
        world
            .add_revolute_joint(RevoluteJoint {
                body_a: 0,
                body_b: 1,
                local_anchor_a: Vector::ZERO,
                local_anchor_b: Vector::new(-1.0, 0.0),
                reference_angle: 0.0,
                enable_limits: false,
                lower_angle: 0.0,
                upper_angle: 0.0,
                enable_motor: false,
                motor_speed: 0.0,
                max_motor_torque: 0.0,
            })
            .unwrap();
        world
    }

    #[test]
    fn anchor_equality_pulls_bodies_together_under_drift() {
        let mut world = two_body_world();
        world.bodies[1].y = 0.3; // introduce drift
        prepare_joints(&mut world);
        for _ in 0..4 {
            solve_joints_velocity(&mut world, 1.0 / 60.0);
        }
        solve_joints_position(&mut world);
        let anchor_a = world_anchor(&world, 0, Vector::ZERO);
        let anchor_b = world_anchor(&world, 1, Vector::new(-1.0, 0.0));
        assert!((anchor_b - anchor_a).length() < 0.3);
    }

    #[test]
    fn motor_drives_relative_angular_velocity_towards_target() {
        let mut world = two_body_world();
        let mut joint = world.joints[0];
        joint.enable_motor = true;
        joint.motor_speed = 1.0;
        joint.max_motor_torque = 1000.0;
        world.joints[0] = joint;
        prepare_joints(&mut world);
        for _ in 0..20 {
            solve_joints_velocity(&mut world, 1.0 / 60.0);
        }
        assert_relative_eq!(world.bodies[1].ang_vel, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn angle_limit_pulls_relative_angle_back_within_bounds() {
        let mut world = two_body_world();
        let mut joint = world.joints[0];
        joint.enable_limits = true;
        joint.lower_angle = -0.2;
        joint.upper_angle = 0.2;
        world.joints[0] = joint;
        world.bodies[1].angle = 0.6; // start past the upper limit

        for _ in 0..30 {
            prepare_joints(&mut world);
            for _ in 0..4 {
                solve_joints_velocity(&mut world, 1.0 / 60.0);
            }
            solve_joints_position(&mut world);
        }

        let theta = relative_angle(&world, &joint);
        assert!(
            theta <= joint.upper_angle + LIMIT_SLOP + 1e-3,
            "expected relative angle to settle back within the limit, got {theta}"
        );
    }
}
