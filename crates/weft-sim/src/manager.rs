//! Simulation manager: owns the generator, the active variant and the
//! integrator, and keeps them consistent across hot swaps.
//!
//! External collaborators (viewers, exporters, the benchmark runner) query
//! state through [`Manager::integrator`] and [`Manager::simulation`].

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use weft_mesh::{Generator, GeneratorOutput, SquareGrid};
use weft_telemetry::{EventBus, EventKind, SimulationEvent};
use weft_types::{WeftError, WeftResult};

use crate::config::SimConfig;
use crate::fe::{FeC0, FeC1, FeC1Alt};
use crate::integrator::{FrameSolveSummary, Integrator};
use crate::pbd::Pbd;
use crate::simulation::Simulation;

/// Which simulation variant the manager runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimType {
    FeC0,
    #[default]
    FeC1,
    FeC1Alt,
    Pbd,
    /// No simulation; updates are no-ops.
    None,
}

impl SimType {
    /// Every runnable variant.
    pub const ALL: [SimType; 4] = [SimType::FeC0, SimType::FeC1, SimType::FeC1Alt, SimType::Pbd];

    pub fn name(self) -> &'static str {
        match self {
            SimType::FeC0 => "fe_c0",
            SimType::FeC1 => "fe_c1",
            SimType::FeC1Alt => "fe_c1_alt",
            SimType::Pbd => "pbd",
            SimType::None => "none",
        }
    }

    /// A fresh, uninitialized instance of the variant.
    pub fn build(self, config: &SimConfig) -> Option<Box<dyn Simulation>> {
        match self {
            SimType::FeC0 => Some(Box::new(FeC0::new(config.clone()))),
            SimType::FeC1 => Some(Box::new(FeC1::new(config.clone()))),
            SimType::FeC1Alt => Some(Box::new(FeC1Alt::new(config.clone()))),
            SimType::Pbd => Some(Box::new(Pbd::new(config.pbd))),
            SimType::None => None,
        }
    }
}

impl fmt::Display for SimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimType {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fe_c0" | "c0" => Ok(SimType::FeC0),
            "fe_c1" | "c1" => Ok(SimType::FeC1),
            "fe_c1_alt" | "c1_alt" => Ok(SimType::FeC1Alt),
            "pbd" => Ok(SimType::Pbd),
            "none" => Ok(SimType::None),
            other => Err(WeftError::InvalidConfig(format!(
                "Unknown simulation type '{other}'"
            ))),
        }
    }
}

/// What one [`Manager::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameReport {
    pub frame: u32,
    pub sub_steps: u32,
    /// Simulation time after the update.
    pub sim_time: f64,
    pub wall_time_ms: f64,
    /// Linear-solve statistics, for variants with a solver.
    pub solve: Option<FrameSolveSummary>,
}

/// Owns a generator, its output, the active simulation and the integrator.
pub struct Manager {
    config: SimConfig,
    generator: Box<dyn Generator>,
    base: GeneratorOutput,
    sim_type: SimType,
    integrator: Integrator,
    events: EventBus,
    frame: u32,
}

impl Manager {
    /// A manager running FE C1 on the default square grid.
    pub fn new(config: SimConfig) -> WeftResult<Self> {
        Self::with_generator(config, Box::new(SquareGrid::default()), SimType::default())
    }

    pub fn with_generator(
        config: SimConfig,
        generator: Box<dyn Generator>,
        sim_type: SimType,
    ) -> WeftResult<Self> {
        config.validate()?;
        let integrator = Integrator::from_config(&config.integrator)?;
        let base = generator.generate()?;
        let mut manager = Self {
            config,
            generator,
            base,
            sim_type,
            integrator,
            events: EventBus::new(),
            frame: 0,
        };
        manager.reset()?;
        Ok(manager)
    }

    /// Replaces the variant and resets.
    pub fn set_sim_type(&mut self, sim_type: SimType) -> WeftResult<()> {
        debug!(from = %self.sim_type, to = %sim_type, "Switching simulation type");
        self.sim_type = sim_type;
        self.reset()
    }

    /// Replaces the generator and regenerates.
    pub fn set_generator(&mut self, generator: Box<dyn Generator>) -> WeftResult<()> {
        self.generator = generator;
        self.generate()
    }

    /// Releases the base output, regenerates it and resets.
    pub fn generate(&mut self) -> WeftResult<()> {
        self.base.release();
        self.base = self.generator.generate()?;
        debug!(
            generator = self.generator.name(),
            nodes = self.base.node_count,
            tangents = self.base.tangent_count,
            elements = self.base.elements.len(),
            "Generated"
        );
        self.reset()
    }

    /// Re-initializes the variant from the base output, then the
    /// integrator, then fires the integrator callback.
    pub fn reset(&mut self) -> WeftResult<()> {
        self.frame = 0;
        match self.sim_type.build(&self.config) {
            Some(mut simulation) => {
                simulation.initialize(&self.base)?;
                self.integrator.initialize(simulation, &self.base)?;
            }
            None => {
                self.integrator.take_simulation();
            }
        }

        self.events.emit(SimulationEvent::new(
            self.frame,
            EventKind::Reset {
                simulation: self.sim_type.name().to_string(),
                nodes: self.base.node_count as u32,
                tangents: self.base.tangent_count as u32,
                elements: self.base.elements.len() as u32,
            },
        ));
        self.events.flush();
        info!(simulation = %self.sim_type, nodes = self.base.node_count, "Simulation reset");

        self.integrator.notify();
        Ok(())
    }

    /// Regenerates under a new transform. Static flags survive when the
    /// node count is unchanged.
    pub fn set_transform(&mut self, transform: Mat4) -> WeftResult<()> {
        let statics: Vec<bool> = self.base.descriptors.iter().map(|d| d.is_static).collect();
        self.generator.set_transform(transform);

        self.base.release();
        self.base = self.generator.generate()?;
        if self.base.descriptors.len() == statics.len() {
            for (d, s) in self.base.descriptors.iter_mut().zip(statics) {
                d.is_static = s;
            }
        }
        self.reset()
    }

    /// Pins or frees node `idx` in both the base output and the running
    /// simulation.
    pub fn set_is_static(&mut self, idx: usize, is_static: bool) -> WeftResult<()> {
        let descriptor = self.base.descriptors.get_mut(idx).ok_or_else(|| {
            WeftError::InvariantViolation(format!(
                "Node {idx} out of range ({} nodes)",
                self.base.node_count
            ))
        })?;
        descriptor.is_static = is_static;
        if let Some(simulation) = self.integrator.simulation_mut() {
            simulation.set_static(idx, is_static)?;
        }
        Ok(())
    }

    /// Replaces the configuration and resets.
    pub fn set_config(&mut self, config: SimConfig) -> WeftResult<()> {
        config.validate()?;
        self.integrator.set_integration_type(config.integrator.kind);
        self.integrator.set_sub_timestep(config.integrator.sub_timestep)?;
        self.integrator.set_gravity(config.integrator.gravity());
        self.config = config;
        self.reset()
    }

    /// Advances the simulation by `real_dt` seconds and publishes the
    /// frame's telemetry.
    pub fn update(&mut self, real_dt: f32) -> WeftResult<FrameReport> {
        if self.sim_type == SimType::None {
            return Ok(FrameReport {
                frame: self.frame,
                ..FrameReport::default()
            });
        }

        let start = Instant::now();
        let result = self.integrator.update_simulation(real_dt);
        let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let sub_steps = match result {
            Ok(n) => n,
            Err(e) => {
                error!(frame = self.frame, error = %e, "Step failed");
                if let WeftError::DegenerateElement {
                    element,
                    gauss_point,
                    area,
                } = e
                {
                    self.events.emit(SimulationEvent::new(
                        self.frame,
                        EventKind::DegenerateElement {
                            element,
                            gauss_point,
                            area,
                        },
                    ));
                }
                self.events.emit(SimulationEvent::new(
                    self.frame,
                    EventKind::StepFailed {
                        message: e.to_string(),
                    },
                ));
                self.events.flush();
                return Err(e);
            }
        };

        let summary = self.integrator.frame_summary();
        let solve = (summary.solves > 0).then_some(summary);
        let report = FrameReport {
            frame: self.frame,
            sub_steps,
            sim_time: self.integrator.elapsed(),
            wall_time_ms,
            solve,
        };

        self.events.emit(SimulationEvent::new(
            self.frame,
            EventKind::FrameCompleted {
                sub_steps,
                sim_time: report.sim_time,
                wall_time_ms,
            },
        ));
        if let Some(s) = solve {
            self.events.emit(SimulationEvent::new(
                self.frame,
                EventKind::Convergence {
                    iterations: s.max_iterations,
                    final_residual: s.worst_residual,
                    converged: s.converged,
                },
            ));
        }
        self.events.flush();

        self.frame += 1;
        Ok(report)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn sim_type(&self) -> SimType {
        self.sim_type
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// The output the simulation was last initialized from.
    pub fn base(&self) -> &GeneratorOutput {
        &self.base
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    pub fn integrator_mut(&mut self) -> &mut Integrator {
        &mut self.integrator
    }

    /// The running variant, or `None` for [`SimType::None`].
    pub fn simulation(&self) -> Option<&dyn Simulation> {
        self.integrator.simulation()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Frames completed since the last reset.
    pub fn frame(&self) -> u32 {
        self.frame
    }
}
