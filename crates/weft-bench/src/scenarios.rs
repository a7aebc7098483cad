//! Benchmark scenarios: scene + simulation variant + integration scheme.
//!
//! Two canonical scenes:
//! 1. **Flat drop**: a horizontal sheet pinned at two adjacent corners
//!    swinging down under gravity
//! 2. **Bend test**: a vertical sheet with pinned corners whose centre is
//!    driven out of plane

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use weft_mesh::{BendTest, Generator, SquareGrid};
use weft_sim::{IntegrationType, SimConfig, SimType};
use weft_types::{WeftError, WeftResult};

/// Which scene to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Horizontal sheet pinned at two corners, falling under gravity.
    FlatDrop,
    /// Corner-pinned sheet with an actuated centre node.
    BendTest,
}

impl ScenarioKind {
    pub fn all() -> &'static [ScenarioKind] {
        &[ScenarioKind::FlatDrop, ScenarioKind::BendTest]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::FlatDrop => "flat_drop",
            ScenarioKind::BendTest => "bend_test",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "flat_drop" => Ok(ScenarioKind::FlatDrop),
            "bend_test" => Ok(ScenarioKind::BendTest),
            other => Err(WeftError::InvalidConfig(format!("Unknown scenario '{other}'"))),
        }
    }
}

/// A fully specified benchmark run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub sim_type: SimType,
    /// Quads per side of the grid.
    pub visual_subdivisions: u32,
    /// Frames to simulate.
    pub frames: u32,
    /// Wall time handed to each `update` (seconds).
    pub frame_dt: f32,
    /// Nodes pinned after generation, on top of the generator's own.
    pub pinned: Vec<u32>,
    pub config: SimConfig,
}

impl Scenario {
    /// A 4×4-quad sheet in the XZ plane, one metre up, pinned at the two
    /// corners of its first row; 60 frames at 60 fps.
    pub fn flat_drop() -> Self {
        let visual_subdivisions = 4;
        let grid = SquareGrid::new(visual_subdivisions);
        let last = grid.subdivisions() - 1;
        Self {
            kind: ScenarioKind::FlatDrop,
            sim_type: SimType::default(),
            visual_subdivisions,
            frames: 60,
            frame_dt: 1.0 / 60.0,
            pinned: vec![grid.vert_idx(0, 0), grid.vert_idx(last, 0)],
            config: SimConfig::default(),
        }
    }

    /// The bend test on a 4×4-quad sheet; 60 frames at 60 fps.
    pub fn bend_test() -> Self {
        Self {
            kind: ScenarioKind::BendTest,
            sim_type: SimType::default(),
            visual_subdivisions: 4,
            frames: 60,
            frame_dt: 1.0 / 60.0,
            pinned: Vec::new(),
            config: SimConfig::default(),
        }
    }

    pub fn from_kind(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::FlatDrop => Self::flat_drop(),
            ScenarioKind::BendTest => Self::bend_test(),
        }
    }

    pub fn with_sim_type(mut self, sim_type: SimType) -> Self {
        self.sim_type = sim_type;
        self
    }

    pub fn with_integrator(mut self, kind: IntegrationType) -> Self {
        self.config.integrator.kind = kind;
        self
    }

    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    /// `scene/variant/scheme`, e.g. `flat_drop/fe_c1/rk2`.
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.kind, self.sim_type, self.config.integrator.kind
        )
    }

    /// The generator of this scene.
    pub fn generator(&self) -> WeftResult<Box<dyn Generator>> {
        if self.visual_subdivisions == 0 {
            return Err(WeftError::InvalidConfig(
                "visual_subdivisions must be at least 1".into(),
            ));
        }
        Ok(match self.kind {
            ScenarioKind::FlatDrop => {
                let transform = Mat4::from_translation(Vec3::Y)
                    * Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2);
                Box::new(SquareGrid::new(self.visual_subdivisions).with_transform(transform))
            }
            ScenarioKind::BendTest => Box::new(BendTest::new(self.visual_subdivisions)),
        })
    }
}
