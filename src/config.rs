//! Configuration types for swarm simulations.
//!
//! Every tunable constant of the physics step lives here. All types
//! serialize to JSON; missing fields fall back to their defaults so a
//! document only needs to mention what it changes:
//!
//! ```ignore
//! let config = SwarmConfig::from_json(r#"{ "particle_count": 400, "forces": { "gravity": 9.8 } }"#)?;
//! ```

use crate::error::SwarmError;
use crate::grid::grid_width;
use serde::{Deserialize, Serialize};

/// Complete swarm configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of particles. Fixed for the lifetime of the swarm.
    pub particle_count: u32,
    /// Half-size of the box in X and Z (walls at `±half_extent`).
    pub half_extent: f32,
    /// Radius shared by every particle.
    pub radius: f32,
    pub grid: GridConfig,
    pub forces: ForceConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            particle_count: 300,
            half_extent: 3.0,
            radius: 0.25,
            grid: GridConfig::default(),
            forces: ForceConfig::default(),
        }
    }
}

impl SwarmConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// The parsed configuration is validated before being returned.
    pub fn from_json(json: &str) -> Result<Self, SwarmError> {
        let config: SwarmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SwarmError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Interaction diameter (`2 * radius`).
    #[inline]
    pub fn diameter(&self) -> f32 {
        self.radius * 2.0
    }

    /// Check every constraint the step relies on.
    ///
    /// - radius and half-extent must be finite and positive
    /// - cell size and overlap must be finite and positive
    /// - the overlap margin must cover the interaction diameter
    /// - a cell must be at least as large as the overlap margin
    /// - the grid must fit in [`MAX_GRID_WIDTH`](crate::grid::MAX_GRID_WIDTH) cells per axis
    /// - force coefficients must be finite, lengths strictly positive
    pub fn validate(&self) -> Result<(), SwarmError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SwarmError::InvalidRadius(self.radius));
        }
        if !(self.half_extent.is_finite() && self.half_extent > 0.0) {
            return Err(SwarmError::InvalidHalfExtent(self.half_extent));
        }

        let GridConfig { cell_size, overlap } = self.grid;
        if !(is_positive(cell_size) && is_positive(overlap)) {
            return Err(SwarmError::InvalidGrid { cell_size, overlap });
        }
        if !(overlap >= self.diameter()) {
            return Err(SwarmError::GridTooCoarse {
                overlap,
                diameter: self.diameter(),
            });
        }
        if !(cell_size >= overlap) {
            return Err(SwarmError::GridTooFine { cell_size, overlap });
        }
        grid_width(self.half_extent, &self.grid)?;

        self.forces.validate()?;
        let span = self.half_extent * self.forces.tide.range;
        if !span.is_finite() {
            return Err(SwarmError::InvalidForce {
                name: "tide.range",
                value: self.forces.tide.range,
            });
        }
        Ok(())
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn check_finite(name: &'static str, value: f32) -> Result<(), SwarmError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SwarmError::InvalidForce { name, value })
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), SwarmError> {
    if is_positive(value) {
        Ok(())
    } else {
        Err(SwarmError::InvalidForce { name, value })
    }
}

/// Broad-phase grid layout over the XZ plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Size of each square cell in world units.
    pub cell_size: f32,
    /// Distance from a cell's far edges within which a particle is also
    /// registered in the neighbouring cells.
    pub overlap: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.2,
            overlap: 0.6,
        }
    }
}

/// Coefficients for every force term of the step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    /// Fraction of velocity removed per step (applied as `-v * friction / dt`).
    pub friction: f32,
    /// Slerp factor pulling angular velocity toward identity each step.
    pub angular_damping: f32,
    /// Downward acceleration.
    pub gravity: f32,
    /// Upward acceleration per unit of depth below `y = 0`.
    pub buoyancy: f32,
    pub tide: TideConfig,
    pub wall: WallConfig,
    pub contact: ContactConfig,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            friction: 0.03,
            angular_damping: 0.006,
            gravity: 6.0,
            buoyancy: 30.0,
            tide: TideConfig::default(),
            wall: WallConfig::default(),
            contact: ContactConfig::default(),
        }
    }
}

impl ForceConfig {
    /// Reject coefficients that would turn the step into NaN.
    ///
    /// Lengths used as divisors (`tide.reach`, `tide.range`,
    /// `wall.cap_depth`, `contact.degenerate_distance`) must be strictly
    /// positive. Everything else only has to be finite.
    pub fn validate(&self) -> Result<(), SwarmError> {
        check_finite("friction", self.friction)?;
        check_finite("angular_damping", self.angular_damping)?;
        check_finite("gravity", self.gravity)?;
        check_finite("buoyancy", self.buoyancy)?;

        check_finite("tide.speed", self.tide.speed)?;
        check_positive("tide.range", self.tide.range)?;
        check_positive("tide.reach", self.tide.reach)?;
        check_finite("tide.strength", self.tide.strength)?;

        check_finite("wall.stiffness", self.wall.stiffness)?;
        check_positive("wall.cap_depth", self.wall.cap_depth)?;

        check_finite("contact.stiffness", self.contact.stiffness)?;
        check_finite("contact.max_ratio", self.contact.max_ratio)?;
        check_finite("contact.lift", self.contact.lift)?;
        check_positive("contact.degenerate_distance", self.contact.degenerate_distance)?;
        Ok(())
    }
}

/// The travelling tide line.
///
/// The tide centre sweeps along X at `speed` and wraps within
/// `±half_extent * range`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TideConfig {
    pub speed: f32,
    /// Sweep range as a multiple of the box half-extent.
    pub range: f32,
    /// Horizontal distance beyond which the tide has no effect.
    pub reach: f32,
    /// Downward acceleration directly under the tide centre.
    pub strength: f32,
}

impl Default for TideConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            range: 1.6,
            reach: 4.0,
            strength: 20.0,
        }
    }
}

/// Boundary plane repulsion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Push at or beyond `cap_depth` penetration.
    pub stiffness: f32,
    /// Penetration depth at which the push saturates.
    pub cap_depth: f32,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            stiffness: 20.0,
            cap_depth: 0.16,
        }
    }
}

/// Pairwise soft-body repulsion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub stiffness: f32,
    /// Upper bound on `diameter / distance - 1`, keeps the push finite as
    /// the distance goes to zero.
    pub max_ratio: f32,
    /// Share of the push added upward to the higher particle of a pair.
    pub lift: f32,
    /// Distances at or below this use the fallback `+Y` direction.
    pub degenerate_distance: f32,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            stiffness: 60.0,
            max_ratio: 0.25,
            lift: 0.7,
            degenerate_distance: 1e-4,
        }
    }
}
