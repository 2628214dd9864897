//! Spawn context for one-time particle initialization.
//!
//! This is the only place randomness enters a swarm. Every particle gets its
//! own RNG seeded from the swarm seed and its index, so a given seed always
//! produces the same initial state regardless of spawn order.

use crate::{Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Largest per-axis angle of the default initial spin.
pub const DEFAULT_SPIN_ANGLE: f32 = 0.1;

/// Initial state of one particle, returned by spawner functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleInit {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    /// Per-step delta rotation. `None` draws the default small random spin.
    pub spin: Option<Quat>,
}

impl ParticleInit {
    /// A particle at rest at `position` with identity orientation.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            spin: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_spin(mut self, spin: Quat) -> Self {
        self.spin = Some(spin);
        self
    }
}

/// Context provided to spawner functions with helpers for common layouts.
///
/// ```ignore
/// Swarm::builder()
///     .with_particle_count(500)
///     .with_spawner(|ctx| {
///         ParticleInit::at(ctx.random_in_box(ctx.half_extent * 0.9, 0.0..2.0))
///             .with_rotation(ctx.random_rotation())
///     })
///     .build()?;
/// ```
pub struct SpawnContext {
    /// Index of the particle being spawned (0 to count-1).
    pub index: u32,
    /// Total number of particles being spawned.
    pub count: u32,
    /// Box half-extent in X and Z.
    pub half_extent: f32,
    rng: SmallRng,
}

impl SpawnContext {
    /// Create the context for particle `index` of a swarm seeded with `seed`.
    pub fn new(index: u32, count: u32, half_extent: f32, seed: u64) -> Self {
        // Mix the index in so neighbouring particles get unrelated streams.
        let stream = seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            index,
            count,
            half_extent,
            rng: SmallRng::seed_from_u64(stream),
        }
    }

    /// Normalized progress through the spawn (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f32 {
        self.index as f32 / self.count.max(1) as f32
    }

    // ========== Random primitives ==========

    /// Random f32 between 0.0 and 1.0.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in `min..max`.
    ///
    /// # Panics
    ///
    /// Panics if `min >= max` or either bound is not finite.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        self.rng.gen_range(min..max)
    }

    // ========== Position helpers ==========

    /// Random point with X and Z in `-half..half` and Y in `y`.
    ///
    /// # Panics
    ///
    /// Panics if `half` is not strictly positive or `y` is empty, like
    /// [`random_range`](Self::random_range).
    pub fn random_in_box(&mut self, half: f32, y: std::ops::Range<f32>) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-half..half),
            self.rng.gen_range(y),
            self.rng.gen_range(-half..half),
        )
    }

    /// Position on a regular XZ lattice covering the box at height `y`.
    ///
    /// Indices beyond `cols * rows` stack into further layers one unit up.
    pub fn grid_position_xz(&self, cols: u32, rows: u32, y: f32) -> Vec3 {
        let (cols, rows) = (cols.max(1), rows.max(1));
        let per_layer = cols * rows;
        let idx = self.index % per_layer;
        let layer = self.index / per_layer;

        let fx = (idx % cols) as f32 / (cols - 1).max(1) as f32 * 2.0 - 1.0;
        let fz = (idx / cols) as f32 / (rows - 1).max(1) as f32 * 2.0 - 1.0;

        Vec3::new(fx * self.half_extent, y + layer as f32, fz * self.half_extent)
    }

    // ========== Orientation helpers ==========

    /// Uniformly random orientation.
    pub fn random_rotation(&mut self) -> Quat {
        // Shoemake's method
        let u1: f32 = self.rng.gen();
        let u2 = self.rng.gen_range(0.0..TAU);
        let u3 = self.rng.gen_range(0.0..TAU);
        let a = (1.0 - u1).sqrt();
        let b = u1.sqrt();
        Quat::from_xyzw(a * u2.sin(), a * u2.cos(), b * u3.sin(), b * u3.cos()).normalize()
    }

    /// Small random per-step rotation: up to `max_angle` about X, then up to
    /// `max_angle` about Y.
    pub fn random_spin(&mut self, max_angle: f32) -> Quat {
        let ax = self.rng.gen::<f32>() * max_angle;
        let ay = self.rng.gen::<f32>() * max_angle;
        (Quat::from_rotation_x(ax) * Quat::from_rotation_y(ay)).normalize()
    }
}

/// Seed derived from the wall clock, used when no explicit seed is given.
pub(crate) fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_context_progress() {
        let ctx = SpawnContext::new(50, 100, 1.0, 7);
        assert!((ctx.progress() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SpawnContext::new(3, 10, 1.0, 99);
        let mut b = SpawnContext::new(3, 10, 1.0, 99);
        assert_eq!(a.random(), b.random());
        assert_eq!(a.random_spin(0.1), b.random_spin(0.1));
    }

    #[test]
    fn test_random_in_box_bounds() {
        let mut ctx = SpawnContext::new(0, 1, 2.0, 1);
        for _ in 0..100 {
            let p = ctx.random_in_box(1.5, 0.0..1.0);
            assert!(p.x.abs() <= 1.5 && p.z.abs() <= 1.5);
            assert!((0.0..1.0).contains(&p.y));
        }
    }

    #[test]
    fn test_grid_position_xz_corners() {
        let ctx = SpawnContext::new(0, 9, 2.0, 0);
        let p = ctx.grid_position_xz(3, 3, 0.5);
        assert!((p - Vec3::new(-2.0, 0.5, -2.0)).length() < 1e-6);

        let last = SpawnContext::new(8, 9, 2.0, 0).grid_position_xz(3, 3, 0.5);
        assert!((last - Vec3::new(2.0, 0.5, 2.0)).length() < 1e-6);

        let stacked = SpawnContext::new(9, 18, 2.0, 0).grid_position_xz(3, 3, 0.5);
        assert!((stacked.y - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_random_spin_is_small_unit_rotation() {
        let mut ctx = SpawnContext::new(0, 1, 1.0, 5);
        for _ in 0..50 {
            let q = ctx.random_spin(DEFAULT_SPIN_ANGLE);
            assert!((q.length() - 1.0).abs() < 1e-5);
            assert!(q.to_axis_angle().1 <= DEFAULT_SPIN_ANGLE * 2.0);
        }
    }

    #[test]
    #[should_panic]
    fn test_random_range_empty_panics() {
        SpawnContext::new(0, 1, 1.0, 2).random_range(1.0, 1.0);
    }

    #[test]
    #[should_panic]
    fn test_random_in_box_zero_half_panics() {
        SpawnContext::new(0, 1, 1.0, 2).random_in_box(0.0, 0.0..1.0);
    }

    #[test]
    fn test_random_rotation_is_unit() {
        let mut ctx = SpawnContext::new(0, 1, 1.0, 11);
        for _ in 0..50 {
            assert!((ctx.random_rotation().length() - 1.0).abs() < 1e-5);
        }
    }
}
