//! Particle storage and fixed-stride views for external consumers.
//!
//! Particle state lives in flat homogeneous buffers indexed by particle id.
//! A renderer typically wants the same data as plain `f32` arrays with a
//! stride of 3 (positions) or 4 (rotations), or as per-instance model
//! matrices. Both views are provided here without copying where possible.

use crate::error::SwarmError;
use crate::{Mat4, Quat, Vec3};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;

/// Floats per position in a flat buffer.
pub const POSITION_STRIDE: usize = 3;
/// Floats per rotation in a flat buffer (`x, y, z, w`).
pub const ROTATION_STRIDE: usize = 4;

/// Per-particle state buffers. All vectors have the same length.
#[derive(Clone, Debug, Default)]
pub struct ParticleBuffers {
    /// World-space centres.
    pub positions: Vec<Vec3>,
    /// Orientations (unit quaternions).
    pub rotations: Vec<Quat>,
    pub velocities: Vec<Vec3>,
    /// Rotation composed onto the orientation once per step.
    pub angular_velocities: Vec<Quat>,
    /// Per-step force accumulator. Only meaningful between the force and
    /// integration phases of a step.
    pub accelerations: Vec<Vec3>,
}

impl ParticleBuffers {
    /// Buffers for particles at rest.
    ///
    /// `positions`, `rotations` and `angular_velocities` must have the same
    /// length.
    pub fn new(positions: Vec<Vec3>, rotations: Vec<Quat>, angular_velocities: Vec<Quat>) -> Self {
        debug_assert_eq!(positions.len(), rotations.len());
        debug_assert_eq!(positions.len(), angular_velocities.len());
        let n = positions.len();
        Self {
            positions,
            rotations,
            velocities: vec![Vec3::ZERO; n],
            angular_velocities,
            accelerations: vec![Vec3::ZERO; n],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// ========== Flat f32 views ==========

/// Positions as a flat `[x, y, z, x, y, z, ...]` slice.
#[inline]
pub fn flatten_vec3s(values: &[Vec3]) -> &[f32] {
    bytemuck::cast_slice(values)
}

/// Rotations as a flat `[x, y, z, w, ...]` slice.
#[inline]
pub fn flatten_quats(values: &[Quat]) -> &[f32] {
    bytemuck::cast_slice(values)
}

/// Read the `index`-th vector of a stride-3 buffer.
#[inline]
pub fn read_vec3(buffer: &[f32], index: usize) -> Vec3 {
    let i = index * POSITION_STRIDE;
    Vec3::new(buffer[i], buffer[i + 1], buffer[i + 2])
}

/// Write the `index`-th vector of a stride-3 buffer.
#[inline]
pub fn write_vec3(buffer: &mut [f32], index: usize, value: Vec3) {
    let i = index * POSITION_STRIDE;
    buffer[i..i + POSITION_STRIDE].copy_from_slice(&value.to_array());
}

/// Read the `index`-th quaternion of a stride-4 buffer.
#[inline]
pub fn read_quat(buffer: &[f32], index: usize) -> Quat {
    let i = index * ROTATION_STRIDE;
    Quat::from_xyzw(buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3])
}

/// Write the `index`-th quaternion of a stride-4 buffer.
#[inline]
pub fn write_quat(buffer: &mut [f32], index: usize, value: Quat) {
    let i = index * ROTATION_STRIDE;
    buffer[i..i + ROTATION_STRIDE].copy_from_slice(&value.to_array());
}

/// Parse a stride-3 buffer into vectors.
pub fn vec3s_from_flat(buffer: &[f32]) -> Result<Vec<Vec3>, SwarmError> {
    if buffer.len() % POSITION_STRIDE != 0 {
        return Err(SwarmError::StrideMismatch {
            buffer: "position",
            len: buffer.len(),
            stride: POSITION_STRIDE,
        });
    }
    Ok(buffer
        .chunks_exact(POSITION_STRIDE)
        .map(Vec3::from_slice)
        .collect())
}

/// Scale `q` to unit length, `None` if its length is zero or not finite.
#[inline]
pub fn try_normalize_quat(q: Quat) -> Option<Quat> {
    Vec4::from(q).try_normalize().map(Quat::from_vec4)
}

/// Normalize every quaternion of `quats`, naming the first one that cannot
/// be normalized.
pub fn normalize_quats(
    quats: impl IntoIterator<Item = Quat>,
    buffer: &'static str,
) -> Result<Vec<Quat>, SwarmError> {
    quats
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            try_normalize_quat(q).ok_or(SwarmError::DegenerateQuaternion { buffer, index })
        })
        .collect()
}

/// Parse a stride-4 buffer into quaternions.
///
/// Each quaternion is normalized on the way in. A zero or non-finite
/// quaternion is rejected with [`SwarmError::DegenerateQuaternion`].
pub fn quats_from_flat(buffer: &[f32]) -> Result<Vec<Quat>, SwarmError> {
    if buffer.len() % ROTATION_STRIDE != 0 {
        return Err(SwarmError::StrideMismatch {
            buffer: "rotation",
            len: buffer.len(),
            stride: ROTATION_STRIDE,
        });
    }
    normalize_quats(
        buffer.chunks_exact(ROTATION_STRIDE).map(Quat::from_slice),
        "rotation",
    )
}

// ========== Instance transforms ==========

/// Per-instance model matrix, laid out for direct upload as a vertex buffer.
///
/// Column-major, four `vec4` attributes per instance.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub model: [[f32; 4]; 4],
}

impl InstanceTransform {
    /// Byte size of one instance.
    pub const SIZE: usize = std::mem::size_of::<InstanceTransform>();

    /// Rotation followed by translation.
    pub fn new(rotation: Quat, position: Vec3) -> Self {
        Self {
            model: Mat4::from_rotation_translation(rotation, position).to_cols_array_2d(),
        }
    }

    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}
