//! Power-flow and dynamic simulation core: the numerical driver layer,
//! independent of whatever concrete component library supplies residual,
//! Jacobian, and root models for a given network.

pub mod config;
pub mod contingency;
pub mod diagnostics;
pub mod dynamic_driver;
pub mod error;
pub mod event_queue;
pub mod logging;
pub mod offset_table;
pub mod power_flow_driver;
pub mod recovery;
pub mod simulation_model;
pub mod solver_backend;
pub mod state;
pub mod time;
pub mod work_queue;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use event_queue::{EventQueue, SimEvent};
pub use offset_table::OffsetTable;
pub use simulation_model::SimulationModel;
pub use solver_backend::SolverBackend;
pub use state::{ChangeCode, ControlFlags, OpFlags, ProcessState, SolverMode, SolverModeKind, StatusCode};
pub use time::Time;
