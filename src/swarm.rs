//! Swarm builder, simulation context and step orchestrator.

use crate::buffers::{self, InstanceTransform, ParticleBuffers};
use crate::config::SwarmConfig;
use crate::error::SwarmError;
use crate::forces::{self, StepContext};
use crate::grid::{NeighborScratch, SpatialGrid};
use crate::integrator::{self, Integration};
use crate::plane::{box_planes, CollisionPlane};
use crate::spawn::{self, ParticleInit, SpawnContext, DEFAULT_SPIN_ANGLE};
use crate::{Quat, Vec3};

type Spawner = Box<dyn Fn(&mut SpawnContext) -> ParticleInit>;

enum InitialState {
    Spawner(Spawner),
    Typed(Vec<Vec3>, Vec<Quat>),
    Flat(Vec<f32>, Vec<f32>),
}

/// A swarm builder.
///
/// Use method chaining to configure, then call `.build()`.
///
/// ```ignore
/// let mut swarm = Swarm::builder()
///     .with_particle_count(400)
///     .with_half_extent(3.0)
///     .with_seed(7)
///     .with_spawner(|ctx| ParticleInit::at(ctx.random_in_box(2.5, -1.0..3.0)))
///     .build()?;
///
/// swarm.step(1.0 / 60.0);
/// ```
pub struct SwarmBuilder {
    config: SwarmConfig,
    seed: Option<u64>,
    initial: Option<InitialState>,
}

impl SwarmBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: SwarmConfig::default(),
            seed: None,
            initial: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: SwarmConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of particles produced by the spawner.
    ///
    /// Ignored when an explicit initial state is given.
    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.config.particle_count = count;
        self
    }

    /// Set the box half-size (walls at `±half_extent` in X and Z).
    pub fn with_half_extent(mut self, half_extent: f32) -> Self {
        self.config.half_extent = half_extent;
        self
    }

    /// Set the radius shared by all particles.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.config.radius = radius;
        self
    }

    /// Seed for initial randomness. Without one, the wall clock is used.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the particle spawner function, called once per particle.
    pub fn with_spawner<F>(mut self, spawner: F) -> Self
    where
        F: Fn(&mut SpawnContext) -> ParticleInit + 'static,
    {
        self.initial = Some(InitialState::Spawner(Box::new(spawner)));
        self
    }

    /// Use externally generated positions and rotations.
    pub fn with_initial_state(mut self, positions: Vec<Vec3>, rotations: Vec<Quat>) -> Self {
        self.initial = Some(InitialState::Typed(positions, rotations));
        self
    }

    /// Use externally generated flat buffers (stride 3 and stride 4).
    pub fn with_flat_state(mut self, positions: &[f32], rotations: &[f32]) -> Self {
        self.initial = Some(InitialState::Flat(positions.to_vec(), rotations.to_vec()));
        self
    }

    /// Validate the configuration and create the swarm.
    pub fn build(self) -> Result<Swarm, SwarmError> {
        let SwarmBuilder { mut config, seed, initial } = self;
        config.validate()?;
        let seed = seed.unwrap_or_else(spawn::clock_seed);

        let inits: Vec<ParticleInit> = match initial.ok_or(SwarmError::NoSpawner)? {
            InitialState::Spawner(spawner) => (0..config.particle_count)
                .map(|i| {
                    let mut ctx = SpawnContext::new(i, config.particle_count, config.half_extent, seed);
                    let mut init = spawner(&mut ctx);
                    if init.spin.is_none() {
                        init.spin = Some(ctx.random_spin(DEFAULT_SPIN_ANGLE));
                    }
                    init
                })
                .collect(),
            InitialState::Typed(positions, rotations) => {
                zip_state(&config, seed, positions, rotations)?
            }
            InitialState::Flat(positions, rotations) => {
                let positions = buffers::vec3s_from_flat(&positions)?;
                let rotations = buffers::quats_from_flat(&rotations)?;
                zip_state(&config, seed, positions, rotations)?
            }
        };

        config.particle_count = inits.len() as u32;
        Swarm::from_inits(config, &inits)
    }
}

impl Default for SwarmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pair up externally supplied positions and rotations with default spins.
fn zip_state(
    config: &SwarmConfig,
    seed: u64,
    positions: Vec<Vec3>,
    rotations: Vec<Quat>,
) -> Result<Vec<ParticleInit>, SwarmError> {
    if positions.len() != rotations.len() {
        return Err(SwarmError::CountMismatch {
            positions: positions.len(),
            rotations: rotations.len(),
        });
    }
    let count = positions.len() as u32;
    Ok(positions
        .into_iter()
        .zip(rotations)
        .enumerate()
        .map(|(i, (position, rotation))| {
            let mut ctx = SpawnContext::new(i as u32, count, config.half_extent, seed);
            ParticleInit::at(position)
                .with_rotation(rotation)
                .with_spin(ctx.random_spin(DEFAULT_SPIN_ANGLE))
        })
        .collect())
}

/// A running particle swarm.
///
/// Owns every buffer the physics step touches: particle state, the spatial
/// grid, the boundary planes and the tide. Call [`Swarm::step`] once per
/// frame, then read positions and rotations until the next step.
pub struct Swarm {
    config: SwarmConfig,
    particles: ParticleBuffers,
    planes: [CollisionPlane; 4],
    grid: SpatialGrid,
    scratch: NeighborScratch,
    tide_x: f32,
    frame: u64,
}

impl Swarm {
    /// Start configuring a new swarm.
    pub fn builder() -> SwarmBuilder {
        SwarmBuilder::new()
    }

    /// Create a swarm from explicit initial positions and rotations.
    ///
    /// Particles start at rest with identity angular velocity. The particle
    /// count in `config` is replaced by the number of positions.
    pub fn new(mut config: SwarmConfig, positions: Vec<Vec3>, rotations: Vec<Quat>) -> Result<Self, SwarmError> {
        config.validate()?;
        if positions.len() != rotations.len() {
            return Err(SwarmError::CountMismatch {
                positions: positions.len(),
                rotations: rotations.len(),
            });
        }
        let inits: Vec<ParticleInit> = positions
            .into_iter()
            .zip(rotations)
            .map(|(p, r)| ParticleInit::at(p).with_rotation(r).with_spin(Quat::IDENTITY))
            .collect();
        config.particle_count = inits.len() as u32;
        Self::from_inits(config, &inits)
    }

    fn from_inits(config: SwarmConfig, inits: &[ParticleInit]) -> Result<Self, SwarmError> {
        let rotations = buffers::normalize_quats(inits.iter().map(|p| p.rotation), "rotation")?;
        let spins = buffers::normalize_quats(
            inits.iter().map(|p| p.spin.unwrap_or(Quat::IDENTITY)),
            "angular velocity",
        )?;
        let mut particles =
            ParticleBuffers::new(inits.iter().map(|p| p.position).collect(), rotations, spins);
        for (v, init) in particles.velocities.iter_mut().zip(inits) {
            *v = init.velocity;
        }

        let mut grid = SpatialGrid::new(config.half_extent, config.grid)?;
        grid.rebuild(&particles.positions);

        log::debug!(
            "Swarm created: {} particles, grid {}x{} (cell {}), box ±{}",
            particles.len(),
            grid.width(),
            grid.width(),
            grid.cell_size(),
            config.half_extent
        );

        Ok(Self {
            planes: box_planes(config.half_extent),
            scratch: NeighborScratch::new(particles.len()),
            particles,
            grid,
            tide_x: 0.0,
            frame: 0,
            config,
        })
    }

    // ========== Stepping ==========

    /// Advance the simulation by `dt` seconds.
    ///
    /// Runs the four phases in order: clear accelerations, advance the tide,
    /// accumulate forces, integrate and update grid membership.
    ///
    /// `dt` is not clamped and may be negative. A zero or non-finite `dt`
    /// leaves the swarm untouched, since friction divides by it.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt != 0.0) {
            log::warn!("Skipping step with invalid dt {}", dt);
            return;
        }

        self.clear_accelerations();
        self.advance_tide(dt);
        self.accumulate_forces(dt);
        self.integrate(dt);
        self.frame += 1;
    }

    /// Phase 1: zero every acceleration.
    pub fn clear_accelerations(&mut self) {
        self.particles.accelerations.fill(Vec3::ZERO);
    }

    /// Phase 2: move the tide centre.
    pub fn advance_tide(&mut self, dt: f32) {
        self.tide_x = forces::advance_tide(self.tide_x, dt, self.config.half_extent, &self.config.forces.tide);
    }

    /// Phase 3: run every force term for every particle.
    ///
    /// Adds into the accumulator, so call [`Swarm::clear_accelerations`]
    /// first unless you mean to stack passes.
    pub fn accumulate_forces(&mut self, dt: f32) {
        let ctx = StepContext {
            config: &self.config,
            planes: &self.planes,
            grid: &self.grid,
            tide_x: self.tide_x,
            dt,
        };
        forces::accumulate(&ctx, &mut self.particles, &mut self.scratch);
    }

    /// Phase 4: integrate every particle and reconcile grid membership.
    ///
    /// Returns the number of particles whose cell list changed.
    pub fn integrate(&mut self, dt: f32) -> usize {
        let mut migrated = 0;
        for i in (0..self.particles.len()).rev() {
            let before = self.grid.cells_at(self.particles.positions[i]);

            if integrator::integrate_particle(&mut self.particles, i, dt) == Integration::Recovered {
                log::debug!("Particle {} produced a non-finite state, brought to rest", i);
            }

            let after = self.grid.cells_at(self.particles.positions[i]);
            if self.grid.relocate(i as u32, &before, &after) {
                migrated += 1;
            }
        }
        log::trace!("Frame {}: {} particles changed cells", self.frame, migrated);
        migrated
    }

    // ========== Mutation between steps ==========

    /// Overwrite the velocity of particle `i`.
    pub fn set_velocity(&mut self, i: usize, velocity: Vec3) {
        self.particles.velocities[i] = velocity;
    }

    /// Overwrite the per-step delta rotation of particle `i`.
    ///
    /// A quaternion that cannot be normalized stops the spin (identity).
    pub fn set_angular_velocity(&mut self, i: usize, angular_velocity: Quat) {
        self.particles.angular_velocities[i] =
            buffers::try_normalize_quat(angular_velocity).unwrap_or(Quat::IDENTITY);
    }

    /// Move particle `i` to `position`, keeping grid membership in sync.
    pub fn teleport(&mut self, i: usize, position: Vec3) {
        let before = self.grid.cells_at(self.particles.positions[i]);
        self.particles.positions[i] = position;
        let after = self.grid.cells_at(position);
        self.grid.relocate(i as u32, &before, &after);
    }

    // ========== Read access ==========

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        &self.particles.positions
    }

    #[inline]
    pub fn rotations(&self) -> &[Quat] {
        &self.particles.rotations
    }

    #[inline]
    pub fn velocities(&self) -> &[Vec3] {
        &self.particles.velocities
    }

    #[inline]
    pub fn angular_velocities(&self) -> &[Quat] {
        &self.particles.angular_velocities
    }

    /// Accumulated accelerations of the current or last step.
    #[inline]
    pub fn accelerations(&self) -> &[Vec3] {
        &self.particles.accelerations
    }

    /// The four boundary walls.
    #[inline]
    pub fn planes(&self) -> &[CollisionPlane; 4] {
        &self.planes
    }

    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Current X coordinate of the tide centre.
    #[inline]
    pub fn tide_x(&self) -> f32 {
        self.tide_x
    }

    /// Number of completed steps.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ========== Renderer views ==========

    /// Positions as a flat stride-3 `f32` slice.
    pub fn positions_flat(&self) -> &[f32] {
        buffers::flatten_vec3s(&self.particles.positions)
    }

    /// Rotations as a flat stride-4 `f32` slice (`x, y, z, w`).
    pub fn rotations_flat(&self) -> &[f32] {
        buffers::flatten_quats(&self.particles.rotations)
    }

    /// Copy positions into an external stride-3 store.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `3 * len()`.
    pub fn copy_positions_into(&self, out: &mut [f32]) {
        let src = self.positions_flat();
        out[..src.len()].copy_from_slice(src);
    }

    /// Copy rotations into an external stride-4 store.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `4 * len()`.
    pub fn copy_rotations_into(&self, out: &mut [f32]) {
        let src = self.rotations_flat();
        out[..src.len()].copy_from_slice(src);
    }

    /// Fill `out` with one model matrix per particle.
    ///
    /// Writes `min(out.len(), len())` entries.
    pub fn write_instance_transforms(&self, out: &mut [InstanceTransform]) {
        for ((slot, &rotation), &position) in out
            .iter_mut()
            .zip(&self.particles.rotations)
            .zip(&self.particles.positions)
        {
            *slot = InstanceTransform::new(rotation, position);
        }
    }

    /// One model matrix per particle.
    pub fn instance_transforms(&self) -> Vec<InstanceTransform> {
        let mut out = vec![InstanceTransform::default(); self.len()];
        self.write_instance_transforms(&mut out);
        out
    }
}
