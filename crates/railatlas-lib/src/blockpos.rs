//! Packed voxel-coordinate codec.
//!
//! A rail node lives at an integer block position. The position is packed
//! into a single signed 64-bit value (bits [63:38] = x, [37:12] = z,
//! [11:0] = y, each field sign-extended on unpack) which doubles as the
//! canonical graph node identifier: compact, hashable, and stable.

use serde::{Deserialize, Serialize};

/// Packed block position used as a graph node identifier.
pub type NodeId = i64;

const X_BITS: u32 = 26;
const Z_BITS: u32 = 26;
const Y_BITS: u32 = 12;

const X_SHIFT: u32 = Z_BITS + Y_BITS;
const Z_SHIFT: u32 = Y_BITS;

const X_MASK: i64 = (1 << X_BITS) - 1;
const Z_MASK: i64 = (1 << Z_BITS) - 1;
const Y_MASK: i64 = (1 << Y_BITS) - 1;

/// A 3D integer block position.
///
/// Horizontal coordinates fit in 26 bits (±2^25), elevation in 12 bits
/// (±2^11). Positions are immutable once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Pack into the canonical 64-bit node identifier.
    pub fn pack(&self) -> NodeId {
        ((self.x as i64 & X_MASK) << X_SHIFT)
            | ((self.z as i64 & Z_MASK) << Z_SHIFT)
            | (self.y as i64 & Y_MASK)
    }

    /// Unpack a node identifier, sign-extending each field.
    pub fn unpack(packed: NodeId) -> Self {
        let x = (packed >> X_SHIFT) as i32;
        let z = ((packed << X_BITS) >> (X_BITS + Z_SHIFT)) as i32;
        let y = ((packed << (X_BITS + Z_BITS)) >> (X_BITS + Z_BITS)) as i32;
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal (x, z) coordinates as floats, for 2D rendering.
    pub fn horizontal(&self) -> (f64, f64) {
        (self.x as f64, self.z as f64)
    }
}
