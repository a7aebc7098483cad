//! Six-node triangular shell element.
//!
//! Node order is corner A, corner B, corner C, then the mid-edge nodes
//! AB, BC and CA. The nine tangent DOFs are stored in the fixed order
//! `[t12, t13, t21, t23, t31, t32, tab, tbc, tca]`: `tij` is the tangent
//! at corner `i` pointing along the edge towards corner `j`, and `tab`,
//! `tbc`, `tca` are cross-edge tangents at the mid-edge nodes.

use serde::{Deserialize, Serialize};

/// Position of a tangent within [`Element::tangents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TangentSlot {
    T12 = 0,
    T13 = 1,
    T21 = 2,
    T23 = 3,
    T31 = 4,
    T32 = 5,
    Tab = 6,
    Tbc = 7,
    Tca = 8,
}

impl TangentSlot {
    pub const ALL: [TangentSlot; 9] = [
        TangentSlot::T12,
        TangentSlot::T13,
        TangentSlot::T21,
        TangentSlot::T23,
        TangentSlot::T31,
        TangentSlot::T32,
        TangentSlot::Tab,
        TangentSlot::Tbc,
        TangentSlot::Tca,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A tangent DOF as seen by one element.
///
/// Neighbouring elements share tangent DOFs along common edges; the sign
/// records whether this element sees the shared vector as-is (`+1`) or
/// flipped (`-1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignedTangent {
    /// Index into the tangent arrays (not offset by the node count).
    pub index: u32,
    /// `1.0` or `-1.0`.
    pub sign: f32,
}

impl Default for SignedTangent {
    fn default() -> Self {
        Self { index: 0, sign: 1.0 }
    }
}

/// A 6-node quadratic triangle with its signed tangents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    /// `[A, B, C, AB, BC, CA]` node indices.
    pub nodes: [u32; 6],
    /// Signed tangents in [`TangentSlot`] order.
    pub tangents: [SignedTangent; 9],
}

impl Element {
    /// Creates an element with no tangents assigned yet.
    pub fn new(nodes: [u32; 6]) -> Self {
        Self {
            nodes,
            tangents: [SignedTangent::default(); 9],
        }
    }

    #[inline]
    pub fn tangent(&self, slot: TangentSlot) -> SignedTangent {
        self.tangents[slot.index()]
    }

    #[inline]
    pub fn tangent_mut(&mut self, slot: TangentSlot) -> &mut SignedTangent {
        &mut self.tangents[slot.index()]
    }

    /// Corner node indices `[A, B, C]`.
    #[inline]
    pub fn corners(&self) -> [u32; 3] {
        [self.nodes[0], self.nodes[1], self.nodes[2]]
    }
}
