//! # mgopt-algo: Receding-Horizon Microgrid Dispatch
//!
//! Builds and solves, once per horizon, a mixed-integer second-order cone
//! program that commits and dispatches every unit of a multi-energy microgrid
//! (electricity, heat, cooling) at least cost, then rolls the horizon forward
//! by one step.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | per-unit scaling, curve fitting | [`preprocess`] | [`PreparedPlant`] |
//! | node/line indexing, admittance | [`topology`] | [`Topology`] |
//! | demand, solar, prices | [`forecast`] | [`HorizonInputs`] |
//! | variables and constraints | [`model`], [`assemble`] | [`HorizonModel`] |
//! | MISOCP solve | [`solver`] | [`Solution`] |
//! | voltage fixed point, roll-forward | [`state`], [`driver`] | [`RunReport`] |
//!
//! ### Voltage Fixed Point
//!
//! The product of two node voltages is not convex. Each horizon therefore
//! replaces `v_n·v_m` with `ṽ_n·v_m`, where `ṽ` is the previous iterate, and
//! re-solves until the squared voltages stop moving. See [`state`].
//!
//! ### Integer Variables
//!
//! Clarabel solves the continuous relaxations; [`solver::ClarabelBackend`]
//! wraps it in a depth-first branch-and-bound over the commitment binaries.
//!
//! ## Example
//!
//! ```ignore
//! use mgopt_algo::{ClarabelBackend, MemorySink, PreparedPlant, RecedingHorizon, Topology};
//!
//! let prepared = PreparedPlant::prepare(&plant, &config)?;
//! let topology = Topology::build(&plant, &prepared, &config)?;
//! let backend = ClarabelBackend::new(config.solver.clone());
//! let mut sink = MemorySink::new();
//! let mut driver = RecedingHorizon::new(&prepared, &topology, &config, &forecast, &backend, start);
//! let run = driver.run(config.horizon.horizons, &mut sink)?;
//! println!("cost: ${:.2}", run.total_cost());
//! ```

pub mod assemble;
pub mod driver;
pub mod error;
pub mod forecast;
pub mod model;
pub mod preprocess;
pub mod solver;
pub mod state;
pub mod topology;

pub use assemble::{HorizonContext, HorizonModel};
pub use driver::{HorizonReport, MemorySink, RecedingHorizon, ResultSink, RunReport};
pub use error::{DispatchError, DispatchResult};
pub use forecast::{Forecast, HorizonInputs, TableForecast};
pub use model::{BoundPolicy, LinExpr, Problem, VarId, VariableCollection};
pub use preprocess::PreparedPlant;
pub use solver::{ClarabelBackend, SolveStatus, Solution, SolverBackend};
pub use state::{HorizonState, VoltageEstimate};
pub use topology::Topology;
