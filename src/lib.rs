//! # Shoal - soft-body particle swarm physics
//!
//! A fixed-size swarm of equal spheres bobbing in a walled pool: gravity,
//! buoyancy below the water line, a travelling tide, wall repulsion and soft
//! pairwise repulsion. The crate only does the physics step. Positions and
//! rotations are exposed as plain buffers for whatever renders them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shoal::prelude::*;
//!
//! fn main() -> Result<(), SwarmError> {
//!     let mut swarm = Swarm::builder()
//!         .with_particle_count(300)
//!         .with_half_extent(3.0)
//!         .with_radius(0.25)
//!         .with_spawner(|ctx| {
//!             ParticleInit::at(ctx.random_in_box(2.5, 0.0..3.0))
//!                 .with_rotation(ctx.random_rotation())
//!         })
//!         .build()?;
//!
//!     loop {
//!         swarm.step(1.0 / 60.0);
//!         upload(swarm.positions_flat(), swarm.rotations_flat());
//!     }
//! }
//! ```
//!
//! ## The step
//!
//! [`Swarm::step`] runs four phases:
//!
//! 1. clear the acceleration accumulator
//! 2. advance the tide centre
//! 3. accumulate forces (see [`forces`]) using the [`grid`] for neighbours
//! 4. integrate with semi-implicit Euler and update grid membership
//!
//! The grid is only read in phase 3 and only written in phase 4.
//!
//! ## Spatial Grid
//!
//! Pairwise repulsion uses a uniform grid over the XZ plane. A particle near
//! the far edges of its cell is also registered in the neighbouring cells,
//! so touching particles always share a cell and each particle only scans
//! the cells it belongs to. Configure with [`GridConfig`]:
//!
//! - `overlap` must be at least the particle diameter
//! - `cell_size` must be at least `overlap`
//!
//! Particles that leave the grid extent stop colliding with each other but
//! keep falling, floating and bouncing off the walls.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade. Install any logger to see them.

pub mod buffers;
pub mod config;
mod error;
pub mod forces;
pub mod grid;
pub mod integrator;
pub mod plane;
pub mod spawn;
mod swarm;

pub use bytemuck;
pub use buffers::InstanceTransform;
pub use config::{ContactConfig, ForceConfig, GridConfig, SwarmConfig, TideConfig, WallConfig};
pub use error::SwarmError;
pub use glam::{Mat4, Quat, Vec3};
pub use grid::{CellList, SpatialGrid};
pub use plane::CollisionPlane;
pub use spawn::{ParticleInit, SpawnContext};
pub use swarm::{Swarm, SwarmBuilder};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use shoal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::buffers::InstanceTransform;
    pub use crate::config::{ForceConfig, GridConfig, SwarmConfig};
    pub use crate::error::SwarmError;
    pub use crate::plane::CollisionPlane;
    pub use crate::spawn::{ParticleInit, SpawnContext};
    pub use crate::swarm::{Swarm, SwarmBuilder};
    pub use crate::{Quat, Vec3};
}
