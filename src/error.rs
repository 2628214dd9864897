//! Error types for Shoal.
//!
//! Only swarm construction and configuration loading can fail. Stepping a
//! built swarm is infallible.

use std::fmt;

/// Errors that can occur while building a [`Swarm`](crate::Swarm) or loading
/// a [`SwarmConfig`](crate::SwarmConfig).
#[derive(Debug)]
pub enum SwarmError {
    /// No spawner or initial state was provided to the builder.
    NoSpawner,
    /// Position and rotation buffers describe a different number of particles.
    CountMismatch {
        positions: usize,
        rotations: usize,
    },
    /// A flat buffer length is not a multiple of its stride.
    StrideMismatch {
        buffer: &'static str,
        len: usize,
        stride: usize,
    },
    /// Particle radius must be finite and strictly positive.
    InvalidRadius(f32),
    /// Box half-extent must be finite and strictly positive.
    InvalidHalfExtent(f32),
    /// Cell size or overlap margin is not finite and strictly positive.
    InvalidGrid { cell_size: f32, overlap: f32 },
    /// Overlap margin is smaller than the interaction diameter, so touching
    /// particles could end up without a shared cell.
    GridTooCoarse { overlap: f32, diameter: f32 },
    /// Cell size is smaller than the overlap margin.
    GridTooFine { cell_size: f32, overlap: f32 },
    /// The box needs more cells per axis than the grid supports.
    GridTooLarge { width: f32, max: u32 },
    /// A force coefficient is out of range.
    InvalidForce { name: &'static str, value: f32 },
    /// A rotation or spin quaternion has zero or non-finite length.
    DegenerateQuaternion { buffer: &'static str, index: usize },
    /// Failed to parse or serialize a configuration document.
    Config(serde_json::Error),
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmError::NoSpawner => write!(
                f,
                "No spawner or initial state provided. Use .with_spawner() or .with_initial_state()."
            ),
            SwarmError::CountMismatch { positions, rotations } => write!(
                f,
                "Particle count mismatch: {} positions but {} rotations",
                positions, rotations
            ),
            SwarmError::StrideMismatch { buffer, len, stride } => write!(
                f,
                "Flat {} buffer has length {} which is not a multiple of {}",
                buffer, len, stride
            ),
            SwarmError::InvalidRadius(r) => write!(f, "Particle radius must be positive, got {}", r),
            SwarmError::InvalidHalfExtent(s) => {
                write!(f, "Box half-extent must be positive, got {}", s)
            }
            SwarmError::GridTooCoarse { overlap, diameter } => write!(
                f,
                "Grid overlap {} is smaller than the particle diameter {}",
                overlap, diameter
            ),
            SwarmError::GridTooFine { cell_size, overlap } => write!(
                f,
                "Grid cell size {} is smaller than the overlap margin {}",
                cell_size, overlap
            ),
            SwarmError::InvalidGrid { cell_size, overlap } => write!(
                f,
                "Grid cell size and overlap must be finite and positive, got {} and {}",
                cell_size, overlap
            ),
            SwarmError::GridTooLarge { width, max } => write!(
                f,
                "Grid would need {} cells per axis, at most {} are supported",
                width, max
            ),
            SwarmError::InvalidForce { name, value } => {
                write!(f, "Force parameter {} is out of range: {}", name, value)
            }
            SwarmError::DegenerateQuaternion { buffer, index } => write!(
                f,
                "{} {} cannot be normalized (zero or non-finite length)",
                buffer, index
            ),
            SwarmError::Config(e) => write!(f, "Invalid swarm configuration: {}", e),
        }
    }
}

impl std::error::Error for SwarmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SwarmError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SwarmError {
    fn from(e: serde_json::Error) -> Self {
        SwarmError::Config(e)
    }
}
