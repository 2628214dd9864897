//! Semi-implicit (symplectic) Euler integration.
//!
//! Velocity is updated first and the new velocity moves the position.
//! Orientation is advanced by composing the angular velocity, which is a
//! per-step delta rotation rather than a rate, so `dt` does not scale it.

use crate::buffers::ParticleBuffers;
use crate::{Quat, Vec3};

/// `v += dt * a`, then `p += dt * v`.
#[inline]
pub fn integrate_linear(position: Vec3, velocity: Vec3, acceleration: Vec3, dt: f32) -> (Vec3, Vec3) {
    let velocity = velocity + acceleration * dt;
    (position + velocity * dt, velocity)
}

/// `rotation * angular_velocity`, renormalized against drift.
#[inline]
pub fn integrate_rotation(rotation: Quat, angular_velocity: Quat) -> Quat {
    (rotation * angular_velocity).normalize()
}

/// Outcome of integrating one particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Integration {
    Advanced,
    /// The new state was not finite. The particle kept its previous
    /// position and orientation and was brought to rest.
    Recovered,
}

/// Advance particle `i` by `dt` using its accumulated acceleration.
pub fn integrate_particle(particles: &mut ParticleBuffers, i: usize, dt: f32) -> Integration {
    let (position, velocity) = integrate_linear(
        particles.positions[i],
        particles.velocities[i],
        particles.accelerations[i],
        dt,
    );
    let rotation = integrate_rotation(particles.rotations[i], particles.angular_velocities[i]);

    if !(position.is_finite() && velocity.is_finite() && rotation.is_finite()) {
        particles.velocities[i] = Vec3::ZERO;
        particles.angular_velocities[i] = Quat::IDENTITY;
        return Integration::Recovered;
    }

    particles.positions[i] = position;
    particles.velocities[i] = velocity;
    particles.rotations[i] = rotation;
    Integration::Advanced
}
