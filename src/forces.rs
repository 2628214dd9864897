//! Force model: everything that writes into the acceleration accumulator.
//!
//! Each term is a small pure function so it can be checked on its own.
//! [`accumulate`] runs them for every particle in a fixed order:
//!
//! | # | Term | Applies when |
//! |---|------|--------------|
//! | 1 | Linear friction `-v * friction / dt` | always |
//! | 2 | Angular damping (slerp toward identity) | always |
//! | 3 | Gravity | always |
//! | 4 | Buoyancy, proportional to depth | `y < 0` |
//! | 5 | Tide pull near the tide centre | `y < 0` |
//! | 6 | Boundary plane push | sphere crosses a plane |
//! | 7 | Pairwise repulsion | centres closer than `2 * radius` |
//!
//! Addition is commutative, the order only pins down floating-point rounding.
//! Pairwise terms also write into the other particle's slot, so this pass
//! must run single-threaded.

use crate::buffers::ParticleBuffers;
use crate::config::{ContactConfig, SwarmConfig, TideConfig, WallConfig};
use crate::grid::{NeighborScratch, SpatialGrid};
use crate::plane::CollisionPlane;
use crate::{Quat, Vec3};

/// Read-only environment of one force pass.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    pub config: &'a SwarmConfig,
    pub planes: &'a [CollisionPlane],
    pub grid: &'a SpatialGrid,
    /// Tide centre X for this step (already advanced).
    pub tide_x: f32,
    pub dt: f32,
}

// ========== Single-body terms ==========

/// Velocity-proportional drag.
///
/// Dividing by `dt` turns this into a fixed fractional velocity loss per
/// step, so the damping strength depends on the frame rate.
#[inline]
pub fn friction(velocity: Vec3, coefficient: f32, dt: f32) -> Vec3 {
    -velocity * coefficient / dt
}

/// Pull an angular velocity toward rest by a fixed slerp factor.
#[inline]
pub fn damp_spin(spin: Quat, factor: f32) -> Quat {
    spin.slerp(Quat::IDENTITY, factor).normalize()
}

/// Constant downward pull.
#[inline]
pub fn gravity(strength: f32) -> Vec3 {
    Vec3::new(0.0, -strength, 0.0)
}

/// Upward acceleration for a particle at height `y`. Zero above water.
#[inline]
pub fn buoyancy(y: f32, coefficient: f32) -> f32 {
    if y < 0.0 {
        -y * coefficient
    } else {
        0.0
    }
}

/// Downward acceleration from the tide for an underwater particle at `x`.
///
/// Falls off quadratically with horizontal distance from the tide centre
/// and is zero from `reach` onward.
#[inline]
pub fn tide_pull(x: f32, tide_x: f32, tide: &TideConfig) -> f32 {
    let d = (tide_x - x).abs().min(tide.reach);
    let f = ((d - tide.reach) / tide.reach).powi(2);
    f * tide.strength
}

/// Move the tide centre forward by `dt` and wrap it into
/// `[-half_extent * range, half_extent * range)`.
#[inline]
pub fn advance_tide(tide_x: f32, dt: f32, half_extent: f32, tide: &TideConfig) -> f32 {
    let span = half_extent * tide.range;
    (tide_x + dt * tide.speed + span).rem_euclid(span * 2.0) - span
}

/// Push from a boundary plane on a sphere, `None` if it does not touch.
///
/// The magnitude ramps quadratically with penetration and saturates at
/// `cap_depth`, so a tunnelling particle never gets more than `stiffness`.
#[inline]
pub fn plane_push(plane: &CollisionPlane, center: Vec3, radius: f32, wall: &WallConfig) -> Option<Vec3> {
    let d = plane.penetration(center, radius);
    if d < 0.0 {
        let depth = (-d).min(wall.cap_depth) / wall.cap_depth;
        Some(plane.normal * (wall.stiffness * depth * depth))
    } else {
        None
    }
}

// ========== Pairwise term ==========

/// Result of resolving one overlapping pair `(a, b)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Force on `a`. `b` receives the negation.
    pub push: Vec3,
    /// Extra upward acceleration for the higher particle of the pair.
    pub lift: f32,
    /// Whether `a` is the one receiving the lift.
    pub lifts_a: bool,
}

/// Soft repulsion between spheres of equal radius centred at `a` and `b`.
///
/// The magnitude is `stiffness * min(max_ratio, diameter / d - 1)`: zero at
/// first contact, growing as the spheres overlap, bounded as `d -> 0`.
/// Coincident centres push along `+Y`.
pub fn contact_force(a: Vec3, b: Vec3, diameter: f32, contact: &ContactConfig) -> Option<Contact> {
    let d2 = a.distance_squared(b);
    if d2 >= diameter * diameter {
        return None;
    }

    let d = d2.sqrt();
    let (direction, ratio) = if d > contact.degenerate_distance {
        ((a - b) / d, (diameter / d - 1.0).min(contact.max_ratio))
    } else {
        (Vec3::Y, contact.max_ratio)
    };

    let f = contact.stiffness * ratio;
    Some(Contact {
        push: direction * f,
        lift: contact.lift * f,
        lifts_a: a.y > b.y,
    })
}

// ========== Accumulation pass ==========

/// Terms 1 to 6 for particle `i`.
fn apply_body_forces(ctx: &StepContext, particles: &mut ParticleBuffers, i: usize) {
    let forces = &ctx.config.forces;
    let p = particles.positions[i];
    let mut a = particles.accelerations[i];

    a += friction(particles.velocities[i], forces.friction, ctx.dt);

    particles.angular_velocities[i] = damp_spin(particles.angular_velocities[i], forces.angular_damping);

    a += gravity(forces.gravity);

    if p.y < 0.0 {
        a.y += buoyancy(p.y, forces.buoyancy);
        a.y -= tide_pull(p.x, ctx.tide_x, &forces.tide);
    }

    for plane in ctx.planes {
        if let Some(push) = plane_push(plane, p, ctx.config.radius, &forces.wall) {
            a += push;
        }
    }

    particles.accelerations[i] = a;
}

/// Term 7 for particle `i` against every lower-indexed neighbour.
fn apply_contacts(
    ctx: &StepContext,
    particles: &mut ParticleBuffers,
    seen: &mut NeighborScratch,
    i: usize,
) {
    let p = particles.positions[i];
    let diameter = ctx.config.diameter();
    let contact = &ctx.config.forces.contact;
    let cells = ctx.grid.cells_at(p);

    seen.begin();
    for &cell in &cells {
        for &j in ctx.grid.members(cell) {
            // Members are sorted: everything from here on is >= i.
            if j as usize >= i {
                break;
            }
            if !seen.visit(j) {
                continue;
            }

            let j = j as usize;
            let Some(c) = contact_force(p, particles.positions[j], diameter, contact) else {
                continue;
            };

            particles.accelerations[i] += c.push;
            particles.accelerations[j] -= c.push;

            if c.lifts_a {
                particles.accelerations[i].y += c.lift;
            } else {
                particles.accelerations[j].y += c.lift;
            }
        }
    }
}

/// Run every force term for every particle, in ascending index order.
///
/// Accelerations must have been cleared beforehand. Angular velocities are
/// damped in place.
pub fn accumulate(ctx: &StepContext, particles: &mut ParticleBuffers, seen: &mut NeighborScratch) {
    for i in 0..particles.len() {
        apply_body_forces(ctx, particles, i);
        apply_contacts(ctx, particles, seen, i);
    }
}
