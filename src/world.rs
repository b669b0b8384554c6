//! World state: particle SoA arrays, rigid bodies, constraint/joint/collider
//! lists, and the cross-frame contact cache (spec §3, component B).
//!
//! The teacher returns mutable views into preallocated typed arrays behind an
//! ECS query; there is no ECS here, so the equivalent shape is a plain owning
//! container handing out contiguous slices. No pointer-based per-particle
//! records are introduced in the hot loops (spec §9).

use std::collections::HashMap;

use crate::error::EvolvatronError;
use crate::math::{Scalar, StaticCollider, Vector};

/// Structure-of-arrays storage for all particles in a world (spec §3).
///
/// `inv_mass == 0.0` marks a pinned particle. A particle index, once
/// assigned, is stable until [`ParticleSet::clear`] is called.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    pub pos_x: Vec<Scalar>,
    pub pos_y: Vec<Scalar>,
    pub vel_x: Vec<Scalar>,
    pub vel_y: Vec<Scalar>,
    pub inv_mass: Vec<Scalar>,
    pub radius: Vec<Scalar>,
    pub force_x: Vec<Scalar>,
    pub force_y: Vec<Scalar>,
    pub prev_pos_x: Vec<Scalar>,
    pub prev_pos_y: Vec<Scalar>,
}

impl ParticleSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pos_x.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos_x.is_empty()
    }

    /// Appends a new particle, returning its stable index.
    pub fn push(&mut self, pos: Vector, mass: Scalar, radius: Scalar) -> usize {
        let idx = self.len();
        self.pos_x.push(pos.x);
        self.pos_y.push(pos.y);
        self.vel_x.push(0.0);
        self.vel_y.push(0.0);
        self.inv_mass.push(if mass > 0.0 { 1.0 / mass } else { 0.0 });
        self.radius.push(radius);
        self.force_x.push(0.0);
        self.force_y.push(0.0);
        self.prev_pos_x.push(pos.x);
        self.prev_pos_y.push(pos.y);
        idx
    }

    #[must_use]
    pub fn position(&self, i: usize) -> Vector {
        Vector::new(self.pos_x[i], self.pos_y[i])
    }

    pub fn set_position(&mut self, i: usize, p: Vector) {
        self.pos_x[i] = p.x;
        self.pos_y[i] = p.y;
    }

    #[must_use]
    pub fn prev_position(&self, i: usize) -> Vector {
        Vector::new(self.prev_pos_x[i], self.prev_pos_y[i])
    }

    #[must_use]
    pub fn velocity(&self, i: usize) -> Vector {
        Vector::new(self.vel_x[i], self.vel_y[i])
    }

    pub fn set_velocity(&mut self, i: usize, v: Vector) {
        self.vel_x[i] = v.x;
        self.vel_y[i] = v.y;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A local-space collision circle attached to a rigid body (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geom {
    pub local_x: Scalar,
    pub local_y: Scalar,
    pub radius: Scalar,
    pub body_idx: usize,
    /// Cached world-space position, refreshed once per substep.
    pub world_pos: Vector,
}

impl Geom {
    #[must_use]
    pub fn local(&self) -> Vector {
        Vector::new(self.local_x, self.local_y)
    }
}

/// A rigid body (spec §3). `inv_mass == 0.0` marks a static body.
#[derive(Debug, Clone, Copy)]
pub struct RigidBody {
    pub x: Scalar,
    pub y: Scalar,
    pub angle: Scalar,
    pub vel_x: Scalar,
    pub vel_y: Scalar,
    pub ang_vel: Scalar,
    pub prev_x: Scalar,
    pub prev_y: Scalar,
    pub prev_angle: Scalar,
    pub inv_mass: Scalar,
    pub inv_inertia: Scalar,
    pub geom_start: usize,
    pub geom_count: usize,
}

impl RigidBody {
    #[must_use]
    pub fn position(&self) -> Vector {
        Vector::new(self.x, self.y)
    }

    pub fn set_position(&mut self, p: Vector) {
        self.x = p.x;
        self.y = p.y;
    }

    #[must_use]
    pub fn velocity(&self) -> Vector {
        Vector::new(self.vel_x, self.vel_y)
    }

    pub fn set_velocity(&mut self, v: Vector) {
        self.vel_x = v.x;
        self.vel_y = v.y;
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }
}

/// A distance-equality constraint between two particles (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct Rod {
    pub i: usize,
    pub j: usize,
    pub rest_length: Scalar,
    pub compliance: Scalar,
    pub lambda: Scalar,
}

/// A signed interior-angle constraint at vertex `j` (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct AngleConstraint {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub target: Scalar,
    pub compliance: Scalar,
    pub lambda: Scalar,
}

/// A servo-target angle constraint whose target may change each step (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct MotorAngle {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub target: Scalar,
    pub compliance: Scalar,
    pub lambda: Scalar,
}

/// A revolute joint between two rigid bodies (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct RevoluteJoint {
    pub body_a: usize,
    pub body_b: usize,
    pub local_anchor_a: Vector,
    pub local_anchor_b: Vector,
    pub reference_angle: Scalar,
    pub enable_limits: bool,
    pub lower_angle: Scalar,
    pub upper_angle: Scalar,
    pub enable_motor: bool,
    pub motor_speed: Scalar,
    pub max_motor_torque: Scalar,
}

/// Derived per-frame solver state for a [`RevoluteJoint`] (spec §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct JointSolverState {
    /// Inverted 2x2 effective mass for the anchor-equality constraint, stored
    /// row-major: `[m00, m01, m10, m11]`.
    pub inv_k: [Scalar; 4],
    pub limit_mass: Scalar,
    pub motor_mass: Scalar,
    pub accumulated_motor_impulse: Scalar,
    pub accumulated_limit_impulse: Scalar,
    pub accumulated_point_impulse: Vector,
}

/// Key identifying a specific (body, geom, collider) pair for warm-start
/// impulse caching across frames (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactKey {
    pub body_idx: usize,
    pub geom_idx: usize,
    pub collider_idx: usize,
}

/// A single frame's contact between a body geom and a static collider
/// (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub body_idx: usize,
    pub geom_idx: usize,
    pub collider_idx: usize,
    pub normal: Vector,
    pub tangent: Vector,
    pub contact_point: Vector,
    pub r_to_body: Vector,
    pub separation: Scalar,
    pub normal_mass: Scalar,
    pub tangent_mass: Scalar,
    pub vel_bias: Scalar,
    pub normal_impulse: Scalar,
    pub tangent_impulse: Scalar,
    pub friction: Scalar,
    pub restitution: Scalar,
    /// `v_n` measured before any impulse is applied this frame, used to seed
    /// the restitution bias on the first iteration (spec §4.3).
    pub initial_normal_velocity: Scalar,
}

impl Contact {
    fn key(&self) -> ContactKey {
        ContactKey {
            body_idx: self.body_idx,
            geom_idx: self.geom_idx,
            collider_idx: self.collider_idx,
        }
    }
}

/// The owning container for one simulation's state (spec §3, component B).
#[derive(Debug, Clone, Default)]
pub struct World {
    pub particles: ParticleSet,
    pub bodies: Vec<RigidBody>,
    pub geoms: Vec<Geom>,
    pub colliders: Vec<StaticCollider>,
    pub rods: Vec<Rod>,
    pub angles: Vec<AngleConstraint>,
    pub motors: Vec<MotorAngle>,
    pub joints: Vec<RevoluteJoint>,
    pub joint_states: Vec<JointSolverState>,
    pub contacts: Vec<Contact>,
    impulse_cache: HashMap<ContactKey, (Scalar, Scalar)>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_particle(&mut self, pos: Vector, mass: Scalar, radius: Scalar) -> usize {
        self.particles.push(pos, mass, radius)
    }

    pub fn add_static_collider(&mut self, collider: StaticCollider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    /// Adds a rigid body with the given geoms (local circles), validating
    /// that the body index space stays consistent. Returns the body index.
    pub fn add_rigid_body(
        &mut self,
        pos: Vector,
        angle: Scalar,
        mass: Scalar,
        inertia: Scalar,
        local_geoms: &[(Vector, Scalar)],
    ) -> usize {
        let geom_start = self.geoms.len();
        let body_idx = self.bodies.len();
        for &(local, radius) in local_geoms {
            self.geoms.push(Geom {
                local_x: local.x,
                local_y: local.y,
                radius,
                body_idx,
                world_pos: pos + local,
            });
        }
        self.bodies.push(RigidBody {
            x: pos.x,
            y: pos.y,
            angle,
            vel_x: 0.0,
            vel_y: 0.0,
            ang_vel: 0.0,
            prev_x: pos.x,
            prev_y: pos.y,
            prev_angle: angle,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            inv_inertia: if inertia > 0.0 { 1.0 / inertia } else { 0.0 },
            geom_start,
            geom_count: local_geoms.len(),
        });
        body_idx
    }

    pub fn add_rod(&mut self, i: usize, j: usize, rest_length: Scalar, compliance: Scalar) -> Result<(), EvolvatronError> {
        self.check_particle(i)?;
        self.check_particle(j)?;
        self.rods.push(Rod {
            i,
            j,
            rest_length,
            compliance,
            lambda: 0.0,
        });
        Ok(())
    }

    pub fn add_angle(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        target: Scalar,
        compliance: Scalar,
    ) -> Result<(), EvolvatronError> {
        self.check_particle(i)?;
        self.check_particle(j)?;
        self.check_particle(k)?;
        self.angles.push(AngleConstraint {
            i,
            j,
            k,
            target,
            compliance,
            lambda: 0.0,
        });
        Ok(())
    }

    pub fn add_motor(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        target: Scalar,
        compliance: Scalar,
    ) -> Result<(), EvolvatronError> {
        self.check_particle(i)?;
        self.check_particle(j)?;
        self.check_particle(k)?;
        self.motors.push(MotorAngle {
            i,
            j,
            k,
            target,
            compliance,
            lambda: 0.0,
        });
        Ok(())
    }

    pub fn add_revolute_joint(&mut self, joint: RevoluteJoint) -> Result<(), EvolvatronError> {
        self.check_body(joint.body_a)?;
        self.check_body(joint.body_b)?;
        self.joints.push(joint);
        self.joint_states.push(JointSolverState::default());
        Ok(())
    }

    fn check_particle(&self, i: usize) -> Result<(), EvolvatronError> {
        if i >= self.particles.len() {
            return Err(EvolvatronError::InvalidIndex(format!(
                "particle index {i} out of bounds (len {})",
                self.particles.len()
            )));
        }
        Ok(())
    }

    fn check_body(&self, i: usize) -> Result<(), EvolvatronError> {
        if i >= self.bodies.len() {
            return Err(EvolvatronError::InvalidIndex(format!(
                "body index {i} out of bounds (len {})",
                self.bodies.len()
            )));
        }
        Ok(())
    }

    /// Refreshes cached world-space geom positions from body transforms
    /// (spec §4.1 step 4).
    pub fn refresh_geom_positions(&mut self) {
        for geom in &mut self.geoms {
            let body = &self.bodies[geom.body_idx];
            let rotation = crate::math::Rotation::from_radians(body.angle);
            geom.world_pos = body.position() + rotation.rotate(geom.local());
        }
    }

    /// Looks up a warm-start impulse pair `(normal, tangent)` for a contact
    /// key, if one survived from the previous frame.
    #[must_use]
    pub fn cached_impulse(&self, key: ContactKey) -> Option<(Scalar, Scalar)> {
        self.impulse_cache.get(&key).copied()
    }

    /// Replaces the warm-start cache with the impulses accumulated this
    /// frame. Entries not re-matched this frame are dropped (spec §4.15).
    pub fn store_impulse_cache(&mut self) {
        self.impulse_cache.clear();
        for contact in &self.contacts {
            self.impulse_cache
                .insert(contact.key(), (contact.normal_impulse, contact.tangent_impulse));
        }
    }
}
