//! Square grid of 6-node elements with shared, signed tangents.
//!
//! An N×N node grid (N = 2·v + 1 for `v` visual subdivisions) is split
//! into v² quads of 3×3 nodes. Each quad holds a "top" and a "bottom"
//! element. Quads are visited column by column (x outer, y inner), so the
//! elements of quad `(qx, qy)` sit at `2·(qx·v + qy)` and the next index.
//!
//! Every quad needs 15 tangents. The first quad generates all of them;
//! later quads reuse those already generated along the edges they share
//! with their left, upper and upper-left neighbours. The reuse table and
//! the per-element signs keep shared tangents consistent between
//! neighbours.

use glam::{Mat4, Vec2, Vec3};
use tracing::debug;
use weft_types::{WeftError, WeftResult};

use crate::element::{Element, TangentSlot};
use crate::generator::Generator;
use crate::output::{GeneratorOutput, NodeDescriptor};

use TangentSlot::*;

/// Which element of a quad.
#[derive(Clone, Copy)]
enum Half {
    Top,
    Bottom,
}

/// Where quad-local tangent `k` comes from.
#[derive(Clone, Copy)]
enum Source {
    /// Generate `v[a] − v[b]` from the element's nodes (1-based `v1..v6`).
    New(Half, usize, usize),
    /// Reuse a tangent of the quad to the left.
    Left(Half, TangentSlot),
    /// Reuse a tangent of the quad above.
    Up(Half, TangentSlot),
    /// Reuse a tangent of the quad above-left.
    UpLeft(Half, TangentSlot),
}

use Half::{Bottom, Top};
use Source::{Left, New, Up, UpLeft};

const FIRST_QUAD: [Source; 15] = [
    New(Top, 3, 1),
    New(Top, 2, 6),
    New(Top, 1, 3),
    New(Bottom, 2, 1),
    New(Bottom, 3, 4),
    New(Bottom, 1, 2),
    New(Top, 2, 1),
    New(Top, 3, 4),
    New(Top, 1, 2),
    New(Bottom, 3, 2),
    New(Bottom, 1, 5),
    New(Bottom, 2, 3),
    New(Top, 2, 3),
    New(Top, 1, 5),
    New(Top, 3, 2),
];

const FIRST_ROW: [Source; 15] = [
    Left(Top, T31),
    New(Top, 2, 6),
    New(Top, 1, 3),
    Left(Top, T32),
    Left(Top, Tbc),
    Left(Top, T23),
    New(Top, 2, 1),
    New(Top, 3, 4),
    New(Top, 1, 2),
    Left(Bottom, T32),
    New(Bottom, 1, 5),
    New(Bottom, 2, 3),
    New(Top, 2, 3),
    New(Top, 1, 5),
    New(Top, 3, 2),
];

const FIRST_COLUMN: [Source; 15] = [
    Up(Bottom, T23),
    Up(Bottom, Tbc),
    Up(Bottom, T32),
    Up(Bottom, T21),
    New(Bottom, 3, 4),
    New(Bottom, 1, 2),
    New(Top, 2, 1),
    New(Top, 3, 4),
    New(Top, 1, 2),
    New(Bottom, 3, 2),
    New(Bottom, 1, 5),
    New(Bottom, 2, 3),
    Up(Top, T23),
    New(Top, 1, 5),
    New(Top, 3, 2),
];

const INTERIOR: [Source; 15] = [
    Up(Bottom, T23),
    Up(Bottom, Tbc),
    Up(Bottom, T32),
    Up(Bottom, T21),
    Left(Top, Tbc),
    Left(Top, T23),
    UpLeft(Top, T21),
    New(Top, 3, 4),
    New(Top, 1, 2),
    Left(Bottom, T32),
    New(Bottom, 1, 5),
    New(Bottom, 2, 3),
    Up(Top, T23),
    New(Top, 1, 5),
    New(Top, 3, 2),
];

/// Quad-local tangent feeding each slot (in [`TangentSlot`] order).
const TOP_SLOTS: [usize; 9] = [6, 0, 8, 14, 2, 12, 7, 13, 1];
const BOTTOM_SLOTS: [usize; 9] = [3, 6, 5, 9, 8, 11, 4, 10, 7];

/// Flat N×N grid in the XY plane, centred on the origin, unit size.
#[derive(Debug, Clone)]
pub struct SquareGrid {
    /// Nodes per side (N).
    subdivisions: u32,
    transform: Mat4,
}

impl Default for SquareGrid {
    fn default() -> Self {
        Self {
            subdivisions: 3,
            transform: Mat4::IDENTITY,
        }
    }
}

impl SquareGrid {
    /// Grid with `visual_subdivisions` quads per side.
    pub fn new(visual_subdivisions: u32) -> Self {
        let mut grid = Self::default();
        grid.set_visual_subdivisions(visual_subdivisions);
        grid
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_visual_subdivisions(&mut self, visual_subdivisions: u32) {
        self.subdivisions = visual_subdivisions * 2 + 1;
    }

    pub fn visual_subdivisions(&self) -> u32 {
        (self.subdivisions - 1) / 2
    }

    /// Nodes per side.
    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    /// Node index of grid coordinate `(ix, iy)`.
    #[inline]
    pub fn vert_idx(&self, ix: u32, iy: u32) -> u32 {
        self.subdivisions * iy + ix
    }

    pub fn node_count(&self) -> usize {
        (self.subdivisions * self.subdivisions) as usize
    }

    pub fn element_count(&self) -> usize {
        let v = self.visual_subdivisions() as usize;
        2 * v * v
    }

    /// Tangents generated: 15 for the first quad, 10 for every other quad
    /// on the first row or column, 6 for interior quads.
    pub fn tangent_count(&self) -> usize {
        let v = self.visual_subdivisions() as usize;
        if v == 0 {
            return 0;
        }
        15 + 20 * (v - 1) + 6 * (v - 1) * (v - 1)
    }

    fn generate_nodes(&self) -> (Vec<NodeDescriptor>, Vec<Vec3>, Vec<Vec3>) {
        let n = self.subdivisions;
        let count = self.node_count();
        let scale = 1.0 / (n - 1) as f32;

        let mut descriptors = Vec::with_capacity(count);
        let mut positions = Vec::with_capacity(count);
        let mut rest = Vec::with_capacity(count);

        for iy in 0..n {
            for ix in 0..n {
                let u = ix as f32 * scale;
                let v = iy as f32 * scale;
                let p = Vec3::new(u - 0.5, -(v - 0.5), 0.0);

                descriptors.push(NodeDescriptor {
                    is_static: false,
                    tex_coord: Vec2::new(u, v),
                });
                positions.push(self.transform.transform_point3(p));
                rest.push(p);
            }
        }
        (descriptors, positions, rest)
    }

    fn generate_elements(&self) -> Vec<Element> {
        let n = self.subdivisions;
        let mut elements = Vec::with_capacity(self.element_count());

        for x in (2..n).step_by(2) {
            for y in (2..n).step_by(2) {
                let a = n * (y - 2) + x - 2;
                let b = n * (y - 2) + x;
                let c = n * y + x;
                let d = n * y + x - 2;
                let ab = n * (y - 2) + x - 1;
                let dc = n * y + x - 1;
                let ad = n * (y - 1) + x - 2;
                let bc = n * (y - 1) + x;
                let mid = n * (y - 1) + x - 1;

                elements.push(Element::new([a, c, b, mid, bc, ab]));
                elements.push(Element::new([a, d, c, ad, dc, mid]));
            }
        }
        elements
    }

    /// Fills in the signed tangents of every element and returns the
    /// generated (current, rest) tangent vectors.
    fn generate_tangents(
        &self,
        elements: &mut [Element],
        positions: &[Vec3],
        rest: &[Vec3],
    ) -> (Vec<Vec3>, Vec<Vec3>) {
        let vs = self.visual_subdivisions() as usize;
        let mut current = Vec::with_capacity(self.tangent_count());
        let mut initial = Vec::with_capacity(self.tangent_count());

        for qx in 0..vs {
            for qy in 0..vs {
                let quad = qx * vs + qy;
                let (top, bottom) = (2 * quad, 2 * quad + 1);

                let mut top_sign = [1.0f32; 9];
                let mut bottom_sign = [1.0f32; 9];
                top_sign[T31.index()] = -1.0;
                top_sign[T32.index()] = -1.0;
                bottom_sign[T31.index()] = -1.0;
                bottom_sign[T32.index()] = -1.0;
                bottom_sign[Tca.index()] = -1.0;

                let table = match (qx, qy) {
                    (0, 0) => &FIRST_QUAD,
                    (_, 0) => {
                        top_sign[T13.index()] = -1.0;
                        bottom_sign[T23.index()] = -1.0;
                        bottom_sign[Tab.index()] = -1.0;
                        &FIRST_ROW
                    }
                    (x, _) => {
                        top_sign[T32.index()] = 1.0;
                        top_sign[Tca.index()] = -1.0;
                        bottom_sign[T12.index()] = -1.0;
                        if x == 0 {
                            &FIRST_COLUMN
                        } else {
                            bottom_sign[T23.index()] = -1.0;
                            bottom_sign[Tab.index()] = -1.0;
                            bottom_sign[T13.index()] = -1.0;
                            top_sign[T12.index()] = -1.0;
                            top_sign[T13.index()] = -1.0;
                            &INTERIOR
                        }
                    }
                };

                let element_of = |half: Half, q: usize| match half {
                    Top => 2 * q,
                    Bottom => 2 * q + 1,
                };

                let mut tans = [0u32; 15];
                for (k, source) in table.iter().enumerate() {
                    tans[k] = match *source {
                        New(half, va, vb) => {
                            let nodes = elements[element_of(half, quad)].nodes;
                            let (a, b) = (nodes[va - 1] as usize, nodes[vb - 1] as usize);
                            current.push(positions[a] - positions[b]);
                            initial.push(rest[a] - rest[b]);
                            (current.len() - 1) as u32
                        }
                        Left(half, slot) => elements[element_of(half, quad - vs)].tangent(slot).index,
                        Up(half, slot) => elements[element_of(half, quad - 1)].tangent(slot).index,
                        UpLeft(half, slot) => {
                            elements[element_of(half, quad - vs - 1)].tangent(slot).index
                        }
                    };
                }

                for slot in TangentSlot::ALL {
                    let i = slot.index();
                    let t = elements[top].tangent_mut(slot);
                    t.index = tans[TOP_SLOTS[i]];
                    t.sign = top_sign[i];
                    let b = elements[bottom].tangent_mut(slot);
                    b.index = tans[BOTTOM_SLOTS[i]];
                    b.sign = bottom_sign[i];
                }
            }
        }

        (current, initial)
    }
}

impl Generator for SquareGrid {
    fn generate(&self) -> WeftResult<GeneratorOutput> {
        if self.subdivisions < 3 || self.subdivisions % 2 == 0 {
            return Err(WeftError::InvalidConfig(format!(
                "Grid needs an odd node count per side ≥ 3, got {}",
                self.subdivisions
            )));
        }

        let (descriptors, mut positions, mut rest) = self.generate_nodes();
        let mut elements = self.generate_elements();
        let (tangents, rest_tangents) = self.generate_tangents(&mut elements, &positions, &rest);

        let node_count = descriptors.len();
        let tangent_count = tangents.len();
        positions.extend(tangents);
        rest.extend(rest_tangents);

        debug!(
            nodes = node_count,
            tangents = tangent_count,
            elements = elements.len(),
            "Generated square grid"
        );

        Ok(GeneratorOutput {
            node_count,
            tangent_count,
            elements,
            descriptors,
            positions,
            rest_positions: rest,
            actuators: Vec::new(),
        })
    }

    fn transform(&self) -> Mat4 {
        self.transform
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    fn name(&self) -> &str {
        "square_grid"
    }
}
