/// Simulation clock for timestep management.
pub mod clock;
pub mod engine;
/// Scenario runs and run manifests.
pub mod scenario;
pub mod sensor;

pub use engine::{SimulationEngine, SimulationSummary, simulate};
pub use scenario::{RerunPolicy, RunManifests, ScenarioRun};
