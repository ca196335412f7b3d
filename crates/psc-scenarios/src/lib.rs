//! # PSC Scenarios
//!
//! Layout, mobility and traffic generation for public-safety network
//! scenarios.
//!
//! ## Features
//!
//! - Seeded random stream shared by every generator
//! - Constrained site placement around obstacles and exclusion zones
//! - Random building layouts and deterministic room grids
//! - Corridor routes with relays that hold line of sight to a donor
//! - Port-allocated traffic flows with start jitter
//! - QoS bearer mapping onto LTE or mmWave forwarding
//! - Three scenario programs: MVA, SWAT and chemical plant

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod bearer;
pub mod engine;
pub mod geometry;
pub mod grid;
pub mod mobility;
pub mod obstacles;
pub mod output;
pub mod placement;
pub mod plan;
pub mod radio;
pub mod rng;
pub mod scenarios;
pub mod traffic;

pub use bearer::BearerQosMapper;
pub use engine::{RecordingEngine, SimulationEngine};
pub use grid::GridLayoutGenerator;
pub use mobility::MobilityPathGenerator;
pub use obstacles::ObstacleLayoutGenerator;
pub use placement::ConstrainedPlacementSampler;
pub use plan::{ScenarioPlan, deploy};
pub use rng::RandomNumberStream;
pub use scenarios::{ChemicalPlantParams, MvaParams, ScenarioProgram, SwatParams, generate};
pub use traffic::TrafficFlowScheduler;
