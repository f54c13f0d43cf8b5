//! `PowerFlowRecovery`, grounded on `powerFlowErrorRecovery.{h,cpp}`: five
//! escalating fixes tried in order after a Newton power-flow solve fails,
//! plus a sixth side-entry (`low_voltage_fix`) used when the failure code is
//! `SolverInvalidStateError` and the driver is past `Initialized`.

use crate::core::simulation_model::{ConvergeMode, NetworkCheckLevel, RootCheckLevel, SimulationModel};
use crate::core::solver_backend::{SolverBackend, SparseReInit};
use crate::core::state::{ChangeCode, ProcessState, StatusCode};
use crate::core::time::Time;

use super::RecoveryOutcome;

pub struct PowerFlowRecovery {
    attempt_number: u32,
}

impl PowerFlowRecovery {
    pub fn new() -> Self {
        PowerFlowRecovery { attempt_number: 0 }
    }

    pub fn reset(&mut self) {
        self.attempt_number = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt_number
    }

    /// Attempts the next stage of the ladder. `error_code` defaults to
    /// `StatusCode::FunctionExecutionSuccess` for a plain escalation call
    /// with no associated solver error.
    pub fn attempt_fix(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        t: Time,
        process_state: ProcessState,
        error_code: StatusCode,
    ) -> RecoveryOutcome {
        if error_code == StatusCode::SolverInvalidStateError {
            if process_state != ProcessState::Initialized {
                self.reinit_pflow(model, solver, ChangeCode::StateCountChange);
                return if self.attempt_number > 3 {
                    RecoveryOutcome::OutOfOptions
                } else {
                    RecoveryOutcome::MoreOptions
                };
            }
            self.low_voltage_fix(model, solver);
        }

        loop {
            self.attempt_number += 1;
            match self.attempt_number {
                1 => {
                    if self.power_flow_fix1(model, solver) {
                        return RecoveryOutcome::MoreOptions;
                    }
                }
                2 => {
                    self.power_flow_fix2(model, solver, t);
                    return RecoveryOutcome::MoreOptions;
                }
                3 => {
                    if self.power_flow_fix3(model, solver, t) {
                        return RecoveryOutcome::MoreOptions;
                    }
                }
                4 => {
                    if self.power_flow_fix4(model, solver) {
                        return RecoveryOutcome::MoreOptions;
                    }
                }
                5 => {
                    self.power_flow_fix5();
                    return RecoveryOutcome::MoreOptions;
                }
                _ => return RecoveryOutcome::OutOfOptions,
            }
        }
    }

    fn reinit_pflow(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, change: ChangeCode) {
        model.dynamic_check_and_reset(solver.solver_mode(), Some(change));
        if change >= ChangeCode::JacobianChange {
            let _ = solver.sparse_re_init(SparseReInit::Resize);
        }
    }

    /// Try any non-reversible power-flow adjustments available.
    fn power_flow_fix1(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend) -> bool {
        model.update_local_cache();
        let eval = model.power_flow_adjust(false, RootCheckLevel::FullCheck);
        if eval > ChangeCode::NonStateChange {
            model.check_network(NetworkCheckLevel::Simplified);
            self.reinit_pflow(model, solver, eval);
            true
        } else {
            false
        }
    }

    /// A few rounds of block (Gauss-Seidel-like) convergence.
    fn power_flow_fix2(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) {
        let mode = solver.solver_mode();
        guess_and_set(model, solver, t, mode);
        {
            let state = solver.state_data_mut();
            model.converge(t, state, None, mode, ConvergeMode::BlockIteration, 0.1);
        }
        write_back(model, solver, t, mode);
        model.update_local_cache();
        let eval = model.power_flow_adjust(true, RootCheckLevel::ReversableOnly);
        self.reinit_pflow(model, solver, eval);
    }

    /// Low-voltage load handling: switch loads to constant-current/PQ limits,
    /// then iterate block convergence until adjustments stop firing.
    fn power_flow_fix3(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> bool {
        if !model.get_voltage().iter().any(|&v| v < 0.7) {
            return false;
        }
        let mode = solver.solver_mode();
        guess_and_set(model, solver, t, mode);
        {
            let state = solver.state_data_mut();
            model.converge(t, state, None, mode, ConvergeMode::SingleIteration, 0.0);
        }
        write_back(model, solver, t, mode);

        model.set_all("load", "pqlowvlimit", 1.0);
        model.update_local_cache();
        model.power_flow_adjust(true, RootCheckLevel::ReversableOnly);
        self.reinit_pflow(model, solver, ChangeCode::StateCountChange);

        guess_and_set(model, solver, t, mode);
        {
            let state = solver.state_data_mut();
            model.converge(t, state, None, mode, ConvergeMode::BlockIteration, 0.1);
        }
        write_back(model, solver, t, mode);
        model.update_local_cache();

        let mut eval = model.power_flow_adjust(true, RootCheckLevel::ReversableOnly);
        while eval > ChangeCode::NoChange {
            self.reinit_pflow(model, solver, eval);
            guess_and_set(model, solver, t, mode);
            {
                let state = solver.state_data_mut();
                model.converge(t, state, None, mode, ConvergeMode::SingleIteration, 0.0);
            }
            write_back(model, solver, t, mode);
            model.update_local_cache();
            eval = model.power_flow_adjust(true, RootCheckLevel::ReversableOnly);
        }
        true
    }

    /// Disconnect buses that have collapsed below 0.1 p.u.
    fn power_flow_fix4(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend) -> bool {
        if !model.get_voltage().iter().any(|&v| v < 0.1) {
            return false;
        }
        model.set_all("bus", "lowvdisconnect", 0.03);
        self.reinit_pflow(model, solver, ChangeCode::NoChange);
        true
    }

    /// Reserved: no further strategy is known.
    fn power_flow_fix5(&self) {}

    fn low_voltage_fix(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend) -> bool {
        let eval = model.power_flow_adjust(false, RootCheckLevel::LowVoltageCheck);
        if eval > ChangeCode::NoChange {
            model.check_network(NetworkCheckLevel::Simplified);
            self.reinit_pflow(model, solver, eval);
            true
        } else {
            false
        }
    }
}

impl Default for PowerFlowRecovery {
    fn default() -> Self {
        Self::new()
    }
}

fn guess_and_set(model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, mode: crate::core::state::SolverMode) {
    let size = solver.size();
    let mut deriv_buf = vec![0.0; size];
    {
        let state = solver.state_data_mut();
        model.guess_state(t, state, &mut deriv_buf, mode);
    }
}

fn write_back(model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, mode: crate::core::state::SolverMode) {
    let state = solver.state_data().to_vec();
    model.set_state(t, &state, &[], mode);
}
