//! `SimulationModel`: the polymorphic view of the network the driver calls
//! into — sizes, residual/derivative/Jacobian callbacks, root test/check/
//! trigger, converge, network check, and power-flow adjust. Implemented by
//! whatever concrete component library models buses, generators, loads, and
//! relays; the driver only ever talks to this trait.

use super::state::{ChangeCode, SolverMode, StatusCode};
use super::time::Time;

/// Depth of a post-fault state reset, consulted by `FaultResetRecovery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLevel {
    Minimal,
    Full,
    LowVoltageDyn0,
    LowVoltageDyn1,
    LowVoltageDyn2,
}

/// Shared state passed by reference into residual/derivative/Jacobian calls.
pub struct StateData<'a> {
    pub t: Time,
    pub state: &'a [f64],
    pub deriv: &'a [f64],
    pub seq_id: u64,
    /// DAE scalar multiplier for derivative-dependent Jacobian entries.
    pub cj: f64,
}

/// Depth of network/root check to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCheckLevel {
    LowVoltageCheck,
    ReversableOnly,
    CompleteStateCheck,
    FullCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCheckLevel {
    Simplified,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeMode {
    SingleIteration,
    BlockIteration,
    VoltageOnly,
}

/// An opaque sink a model populates with sparse-Jacobian triplets; kept
/// trait-generic so the driver need not depend on a specific sparse-matrix
/// crate at this boundary.
pub trait JacobianSink {
    fn add_triplet(&mut self, row: usize, col: usize, value: f64);
}

/// A branch's solved MVA/current flow alongside its own rating tiers, used
/// by contingency scoring (`ViolationCode::MvaExceedRatingA/B/Emergency`,
/// `MaxCurrentExceeded`). Ratings travel with the flow rather than through
/// `ExtraContingencyInfo` since they are per-branch component data, not a
/// contingency-run parameter.
#[derive(Debug, Clone)]
pub struct BranchFlow {
    pub name: String,
    pub mva: f64,
    pub rating_a: f64,
    pub rating_b: f64,
    pub rating_emergency: f64,
    pub current: f64,
    pub current_limit: f64,
}

/// The contract the driver calls into. The concrete per-component
/// residual/Jacobian library (buses, generators, loads, relays) is an
/// external collaborator; only this polymorphic surface lives here.
/// Exercised in-crate by small test models (see
/// `crate::core::dynamic_driver`, `crate::core::power_flow_driver` tests).
pub trait SimulationModel {
    fn state_size(&self, mode: SolverMode) -> usize;
    fn root_size(&self, mode: SolverMode) -> usize;
    fn jac_size(&self, mode: SolverMode) -> usize;

    fn guess_state(&mut self, t: Time, state_out: &mut [f64], deriv_out: &mut [f64], mode: SolverMode);

    fn set_state(&mut self, t: Time, state_in: &[f64], deriv_in: &[f64], mode: SolverMode);

    /// Returns nonzero (by convention, `Err`) on detecting non-finite state.
    fn residual(&self, sd: &StateData, resid_out: &mut [f64], mode: SolverMode) -> Result<(), &'static str>;

    fn derivative(&self, sd: &StateData, deriv_out: &mut [f64], mode: SolverMode) -> Result<(), &'static str>;

    fn jacobian_elements(&self, sd: &StateData, sink: &mut dyn JacobianSink, mode: SolverMode);

    fn algebraic_update(&mut self, sd: &StateData, update_out: &mut [f64], mode: SolverMode, alpha: f64);

    fn root_test(&self, sd: &StateData, roots_out: &mut [f64], mode: SolverMode);

    fn root_check(&mut self, sd: &StateData, mode: SolverMode, level: RootCheckLevel) -> ChangeCode;

    fn root_trigger(&mut self, t: Time, roots_found: &[i32], mode: SolverMode);

    fn converge(
        &mut self,
        t: Time,
        state: &mut [f64],
        deriv: Option<&mut [f64]>,
        mode: SolverMode,
        converge_mode: ConvergeMode,
        tolerance: f64,
    );

    fn check_network(&mut self, level: NetworkCheckLevel);

    /// Evaluate PV->PQ conversions and limit enforcement.
    fn power_flow_adjust(&mut self, reversable_only: bool, level: RootCheckLevel) -> ChangeCode;

    /// Reconcile topology/Jacobian/root structure after events.
    fn dynamic_check_and_reset(&mut self, mode: SolverMode, change: Option<ChangeCode>) -> bool;

    /// Voltage magnitudes for every bus, in per-unit, used by the recovery
    /// ladders' low-voltage checks.
    fn get_voltage(&self) -> Vec<f64>;

    /// Voltage angles for every bus, in radians, in the same order as
    /// `get_voltage`. Defaults to empty for models (e.g. pure algebraic test
    /// fixtures) with no angle state; contingency scoring skips the
    /// min/max-angle checks when this is empty.
    fn get_bus_angles(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Solved MVA/current flow and rating tiers for every branch, used by
    /// contingency scoring. Defaults to empty for models with no branch
    /// concept; contingency scoring skips the MVA/current checks when this
    /// is empty.
    fn get_branch_flows(&self) -> Vec<BranchFlow> {
        Vec::new()
    }

    /// Mark every component of `kind` with `parameter = value`, e.g.
    /// (`"load"`, `"pqlowvlimit"`, `1.0`) or (`"bus"`, `"lowvdisconnect"`, `0.03`).
    fn set_all(&mut self, kind: &str, parameter: &str, value: f64);

    fn update_local_cache(&mut self) {}

    /// Re-derive a subset of the state vector after a fault clears, at the
    /// given depth.
    fn reset_level(&mut self, _level: ResetLevel) {}

    /// React to a topology/connectivity change that may require
    /// reallocation before the backend can be re-probed. `HandlerNoReturn`
    /// (the default) means "nothing to report, keep going".
    fn handle_state_change(&mut self, _mode: SolverMode) -> StatusCode {
        StatusCode::HandlerNoReturn
    }

    /// A per-state-index mask: `true` where the backend's state vector entry
    /// at that index is a bus voltage-magnitude state.
    fn voltage_state_mask(&self, mode: SolverMode) -> Vec<bool> {
        vec![false; self.state_size(mode)]
    }

    /// Re-synchronize the backend's root-finding vector after `root_check`
    /// reports a change.
    fn handle_root_change(&mut self, _mode: SolverMode) {}

    /// Redistribute surplus/deficit real power across participating buses
    /// proportional to their `participation` factor, respecting each bus's
    /// adjustable capacity up/down. Returns the total residual `|ΔP|`
    /// remaining after the redistribution; defaults to reporting a balanced
    /// system (`0.0`) for models (e.g. pure algebraic test fixtures) with no
    /// generation-participation concept.
    fn load_balance(&mut self) -> f64 {
        0.0
    }
}
