pub mod core;
pub mod coupling;
pub mod io;
pub mod prelude {
    pub use crate::core::{
        CoreConfig, CoreError, CoreResult, EventQueue, OffsetTable, SimEvent, SimulationModel, SolverBackend, Time,
    };
    pub use crate::coupling::{CouplingManager, CurrentMessage, DistributionTask, ThreePhaseValue, VoltageMessage};
    pub use crate::io::contingency_report;
}
