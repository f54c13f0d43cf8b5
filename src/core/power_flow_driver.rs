//! `PowerFlowDriver`: the outer slack-balance loop, middle PV/Q-limit
//! adjustment loop, and inner Newton solve, the latter consulting
//! `PowerFlowRecovery` on failure.

use tracing::warn;

use crate::core::config::CoreConfig;
use crate::core::recovery::{PowerFlowRecovery, RecoveryOutcome};
use crate::core::simulation_model::{NetworkCheckLevel, RootCheckLevel, SimulationModel};
use crate::core::solver_backend::{SolverBackend, SparseReInit, StepMode};
use crate::core::state::{ChangeCode, ControlFlags, OpFlags, ProcessState, StatusCode};
use crate::core::time::Time;

/// Runs `powerflow()` to completion (or exhaustion of recovery), returning
/// the final process state and the last solver status observed.
pub fn run_power_flow(
    model: &mut dyn SimulationModel,
    solver: &mut dyn SolverBackend,
    config: &CoreConfig,
    t: Time,
    op_flags: &mut OpFlags,
    control_flags: &mut ControlFlags,
) -> (ProcessState, StatusCode) {
    let mode = solver.solver_mode();
    let mut recovery = PowerFlowRecovery::new();

    let mut padjust_iteration = 0u32;
    loop {
        let (vstatus, last_status) = run_voltage_adjust_loop(model, solver, config, t, op_flags, &mut recovery);
        if vstatus.is_failure() {
            return (ProcessState::Initialized, vstatus);
        }

        if !control_flags.contains(ControlFlags::POWER_ADJUST_ENABLED) {
            return (ProcessState::PowerflowComplete, last_status);
        }

        let residual = model.load_balance();
        if residual.abs() < config.power_adjust_threshold {
            return (ProcessState::PowerflowComplete, last_status);
        }

        padjust_iteration += 1;
        if padjust_iteration > config.max_padjust_iterations {
            warn!(residual, "power-flow outer loop exceeded max_padjust_iterations");
            return (ProcessState::PowerflowComplete, last_status);
        }
        let _ = mode;
    }
}

/// The middle loop: repeated Newton solves with PV/Q-limit adjustment
/// between them, until no further reversible change fires.
fn run_voltage_adjust_loop(
    model: &mut dyn SimulationModel,
    solver: &mut dyn SolverBackend,
    config: &CoreConfig,
    t: Time,
    op_flags: &mut OpFlags,
    recovery: &mut PowerFlowRecovery,
) -> (StatusCode, StatusCode) {
    let mode = solver.solver_mode();
    let mut vadjust_iteration = 0u32;
    let mut last_status = StatusCode::FunctionExecutionSuccess;

    loop {
        let status = run_inner_newton(model, solver, config, t, recovery);
        if status.is_failure() {
            return (status, status);
        }
        last_status = status;

        {
            let state = solver.state_data().to_vec();
            model.set_state(t, &state, &[], mode);
        }
        model.update_local_cache();
        vadjust_iteration += 1;
        if vadjust_iteration > config.max_vadjust_iterations {
            warn!(vadjust_iteration, "power-flow middle loop exceeded max_Vadjust_iterations");
            return (StatusCode::FunctionExecutionSuccess, last_status);
        }

        let reversible = model.power_flow_adjust(true, RootCheckLevel::ReversableOnly);
        if reversible > ChangeCode::NoChange {
            op_flags.insert(OpFlags::STATE_CHANGE);
            model.dynamic_check_and_reset(mode, Some(reversible));
            continue;
        }

        let irreversible = model.power_flow_adjust(false, RootCheckLevel::FullCheck);
        if irreversible > ChangeCode::NoChange {
            model.check_network(NetworkCheckLevel::Simplified);
            model.dynamic_check_and_reset(mode, Some(irreversible));
            if irreversible >= ChangeCode::JacobianChange {
                let _ = solver.sparse_re_init(SparseReInit::Resize);
            }
            continue;
        }

        return (StatusCode::FunctionExecutionSuccess, last_status);
    }
}

/// One Newton solve attempt, with `PowerFlowRecovery` consulted on failure
/// or on a non-finite result.
fn run_inner_newton(model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, config: &CoreConfig, t: Time, recovery: &mut PowerFlowRecovery) -> StatusCode {
    let mode = solver.solver_mode();
    loop {
        let size = solver.size();
        let mut deriv_buf = vec![0.0; size];
        {
            let state = solver.state_data_mut();
            model.guess_state(t, state, &mut deriv_buf, mode);
        }
        let (status, _reached) = solver.solve(t, StepMode::Normal);

        let non_finite = solver.state_data().iter().any(|v| !v.is_finite());
        let effective_status = if non_finite { StatusCode::Custom(-30) } else { status };

        if !effective_status.is_failure() {
            return effective_status;
        }
        if !config.no_powerflow_error_recovery {
            match recovery.attempt_fix(model, solver, t, ProcessState::PowerflowComplete, effective_status) {
                RecoveryOutcome::MoreOptions => continue,
                RecoveryOutcome::OutOfOptions => return effective_status,
            }
        } else {
            return effective_status;
        }
    }
}
