//! `DynamicDriver`: the DAE/partitioned time-stepping loop, with the
//! `dynamic_check_and_reset`/`handle_root_change`/`check_algebraic_roots`
//! dispatch pattern shared with the recovery ladders.

use tracing::{debug, warn};

use crate::core::config::CoreConfig;
use crate::core::event_queue::EventQueue;
use crate::core::recovery::{DynamicIcRecovery, FaultResetRecovery};
use crate::core::simulation_model::{NetworkCheckLevel, RootCheckLevel, SimulationModel};
use crate::core::solver_backend::{SolverBackend, SparseReInit, StepMode};
use crate::core::state::{ChangeCode, ControlFlags, OpFlags, ProcessState, StatusCode};
use crate::core::time::Time;

/// Small positive duration the stagnation/small-step guards compare against,
/// fixed to ten probe steps.
pub fn default_time_tol() -> Time {
    Time::from_ticks(Time::probe_step().ticks() * 10)
}

pub struct DynamicDriver {
    pub time_tol: Time,
    pub tiny_step_count: u32,
    pub small_step_count: u32,
    pub halt_count: u32,
    ic_recovery: DynamicIcRecovery,
}

impl DynamicDriver {
    pub fn new() -> Self {
        DynamicDriver {
            time_tol: default_time_tol(),
            tiny_step_count: 0,
            small_step_count: 0,
            halt_count: 0,
            ic_recovery: DynamicIcRecovery::new(),
        }
    }

    /// Pre-rolls events, runs the events scheduled exactly at `t_start`, and
    /// reports the process state to transition to. Offset-table population
    /// and backend allocation are the caller's responsibility via
    /// `solver.allocate`/`model` state sizing before this call; this
    /// function covers the event-queue and flag bookkeeping steps only.
    pub fn dyn_initialize(
        &mut self,
        model: &mut dyn SimulationModel,
        events: &mut EventQueue,
        config: &CoreConfig,
        t_start: Time,
    ) -> ProcessState {
        events.execute_events(t_start - Time::probe_step());
        if config.state_record_period > 0.0 {
            events.null_event_time(t_start, Time::from_seconds(config.state_record_period));
        }
        events.execute_events(t_start);
        ProcessState::DynamicInitialized
    }

    /// Runs the DAE main loop from `t_current` to `t_stop`, returning the
    /// final process state, last solver status, and the last time the
    /// state was successfully committed (`t_stop` on a clean finish, or the
    /// last successful step time on a halt).
    pub fn run_dynamic_dae(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        events: &mut EventQueue,
        config: &CoreConfig,
        mut t_current: Time,
        t_stop: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> (ProcessState, StatusCode, Time) {
        let mut last_status = StatusCode::FunctionExecutionSuccess;

        while t_current < t_stop {
            let next_stop = t_stop.min(events.next_time());
            let mut time_return;

            if (next_stop - t_current) < self.time_tol {
                time_return = next_stop;
            } else {
                let (status, reached) = solver.solve(next_stop, StepMode::Normal);
                last_status = self.handle_early_return(model, solver, status, reached, op_flags, control_flags);
                time_return = reached;
            }

            while time_return + self.time_tol < next_stop {
                let last_stop = t_current;
                model.dynamic_check_and_reset(solver.solver_mode(), None);
                if self.generate_dae_ic(model, solver, time_return, op_flags, control_flags).is_failure() {
                    return (ProcessState::DynamicPartial, StatusCode::Custom(-1), t_current);
                }

                let (status, reached) = solver.solve(next_stop, StepMode::Normal);
                last_status = self.handle_early_return(model, solver, status, reached, op_flags, control_flags);
                time_return = reached;

                if last_status != StatusCode::SolverRootFound {
                    if time_return < last_stop + self.time_tol {
                        self.tiny_step_count += 1;
                        if self.tiny_step_count > 1 {
                            warn!("dynamic driver unable to converge: repeated tiny steps");
                            return (ProcessState::DynamicPartial, StatusCode::Custom(-1), t_current);
                        }
                        t_current += self.time_tol;
                    } else if time_return < last_stop + Time::from_seconds(1e-4) {
                        self.small_step_count += 1;
                        if self.small_step_count > 10 {
                            warn!("dynamic driver halted: too many small steps");
                            return (ProcessState::DynamicPartial, StatusCode::Custom(-1), t_current);
                        }
                    } else {
                        self.tiny_step_count = 0;
                        self.small_step_count = 0;
                    }
                }
            }

            t_current = next_stop;
            {
                let (state, deriv) = solver.state_and_deriv_mut();
                let state = state.to_vec();
                let deriv = deriv.to_vec();
                model.set_state(t_current, &state, &deriv, solver.solver_mode());
            }
            model.update_local_cache();

            let change = events.execute_events(t_current);
            if change > ChangeCode::NonStateChange {
                model.dynamic_check_and_reset(solver.solver_mode(), Some(change));
                if self.generate_dae_ic(model, solver, t_current, op_flags, control_flags).is_failure() {
                    return (ProcessState::DynamicPartial, StatusCode::Custom(-1), t_current);
                }
            }
        }

        (ProcessState::DynamicComplete, last_status, t_current)
    }

    /// Partitioned loop: as the DAE loop, but each differential step is
    /// preceded by an algebraic sub-solve. The algebraic phase here reuses
    /// the same `SolverBackend` at `StepMode::SingleStep` (the partitioned
    /// backend's algebraic half); a convergence failure there runs the same
    /// diagnostics path the DAE loop uses on `SolverInvalidStateError`.
    pub fn run_dynamic_partitioned(
        &mut self,
        model: &mut dyn SimulationModel,
        alg_solver: &mut dyn SolverBackend,
        diff_solver: &mut dyn SolverBackend,
        events: &mut EventQueue,
        config: &CoreConfig,
        t_current: Time,
        t_step: Time,
        t_stop: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> (ProcessState, StatusCode, Time) {
        let mut t = t_current;
        let mut last_status = StatusCode::FunctionExecutionSuccess;
        while t < t_stop {
            let (alg_status, _) = alg_solver.solve(t + t_step, StepMode::SingleStep);
            if alg_status.is_failure() {
                debug!(?alg_status, "partitioned algebraic sub-solve failed, running diagnostics");
                self.generate_dae_ic(model, alg_solver, t, op_flags, control_flags);
            }
            let next = t_step.min(t_stop - t);
            let (state, status, reached) = self.run_dynamic_dae(model, diff_solver, events, config, t, t + next, op_flags, control_flags);
            last_status = status;
            if state == ProcessState::DynamicPartial || state == ProcessState::GdError {
                return (state, status, reached);
            }
            t += next;
        }
        (ProcessState::DynamicComplete, last_status, t)
    }

    /// Single-event-boundary step for embedded use. Mirrors the main loop
    /// but returns as soon as `t_next` is reached or progress halts.
    pub fn step(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        events: &mut EventQueue,
        config: &CoreConfig,
        t_current: Time,
        t_next: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> (StatusCode, Time) {
        let (state, status, reached) = self.run_dynamic_dae(model, solver, events, config, t_current, t_next, op_flags, control_flags);
        match state {
            ProcessState::DynamicComplete => (status, t_next),
            _ => (StatusCode::Custom(1), reached),
        }
    }

    /// Quasi-static loop: advance a fixed `t_step` at a time, solving a full
    /// power flow at each tick (or on any event, if `force_power_flow`).
    pub fn event_driven_power_flow(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        events: &mut EventQueue,
        config: &CoreConfig,
        t_start: Time,
        t_end: Time,
        t_step: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> StatusCode {
        events.null_event_time(t_start, t_step);
        let mut t = t_start;
        let mut last_status = StatusCode::FunctionExecutionSuccess;
        while t < t_end {
            let next = (t + t_step).min(t_end);
            let change = events.execute_events(next);
            if change > ChangeCode::NonStateChange || config.force_power_flow {
                let (_state, status) = crate::core::power_flow_driver::run_power_flow(model, solver, config, next, op_flags, control_flags);
                last_status = status;
                if last_status.is_failure() {
                    return last_status;
                }
            }
            t = next;
        }
        last_status
    }

    /// Reacts to a `solve` call that returned before reaching `t_stop`
    /// (a root crossing or a recoverable failure).
    fn handle_early_return(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        status: StatusCode,
        _reached: Time,
        op_flags: &mut OpFlags,
        _control_flags: &mut ControlFlags,
    ) -> StatusCode {
        match status {
            StatusCode::SolverRootFound => {
                let roots = solver.roots_found().to_vec();
                if !roots.is_empty() {
                    let (state, deriv) = solver.state_and_deriv_mut();
                    let state = state.to_vec();
                    let deriv = deriv.to_vec();
                    model.set_state(_reached, &state, &deriv, solver.solver_mode());
                    model.root_trigger(_reached, &roots, solver.solver_mode());
                }
                status
            }
            StatusCode::SolverInvalidStateError => {
                let mode = solver.solver_mode();
                let sd = crate::core::simulation_model::StateData {
                    t: _reached,
                    state: solver.state_data(),
                    deriv: solver.deriv_data(),
                    seq_id: 0,
                    cj: 0.0,
                };
                model.root_check(&sd, mode, RootCheckLevel::LowVoltageCheck);
                op_flags.remove(OpFlags::LOW_BUS_VOLTAGE);
                status
            }
            other => {
                self.halt_count += 1;
                other
            }
        }
    }

    /// Central post-perturbation dispatcher, driven by the `ChangeCode` a
    /// caller already computed. Returns whether a reset was performed.
    pub fn dynamic_check_and_reset(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, events: &mut EventQueue, t: Time, change: ChangeCode) -> bool {
        let mode = solver.solver_mode();
        match change {
            ChangeCode::NoChange => false,
            ChangeCode::NonStateChange => {
                model.check_network(NetworkCheckLevel::Simplified);
                true
            }
            ChangeCode::ParameterChange | ChangeCode::StateCountChange => {
                let replay_change = events.execute_events(t + Time::probe_step());
                if replay_change <= ChangeCode::NonStateChange {
                    return true;
                }
                model.dynamic_check_and_reset(mode, Some(change))
            }
            ChangeCode::ObjectChange => model.dynamic_check_and_reset(mode, Some(change)),
            ChangeCode::JacobianChange => {
                model.handle_root_change(mode);
                let nnz = model.jac_size(mode);
                solver.set_max_non_zeros(nnz);
                let _ = solver.sparse_re_init(SparseReInit::Resize);
                true
            }
        }
    }

    /// After a dynamic IC generation, if algebraic roots are present, probe
    /// one step forward and re-check.
    fn check_algebraic_roots(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, op_flags: OpFlags) -> bool {
        if !op_flags.contains(OpFlags::HAS_ALG_ROOTS) {
            return false;
        }
        let mode = solver.solver_mode();
        let probed = t + Time::probe_step();
        let sd = crate::core::simulation_model::StateData {
            t: probed,
            state: solver.state_data(),
            deriv: solver.deriv_data(),
            seq_id: 0,
            cj: 0.0,
        };
        model.root_check(&sd, mode, RootCheckLevel::FullCheck) > ChangeCode::NonStateChange
    }

    /// Runs `DynamicIcRecovery` until `calc_ic` succeeds or the ladder is
    /// exhausted. If `DynamicIcRecovery` exhausts without success — the
    /// common case right after a fault clears, where the discrete state
    /// change left no nearby consistent IC — falls back to
    /// `FaultResetRecovery`'s deeper state-reset ladder before giving up.
    /// Re-runs IC once more if `check_algebraic_roots` flags a
    /// late-discovered root crossing.
    fn generate_dae_ic(&mut self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, op_flags: &mut OpFlags, control_flags: &mut ControlFlags) -> StatusCode {
        self.ic_recovery.reset();
        let mut status = solver.calc_ic(t, Time::probe_step(), crate::core::solver_backend::IcMode::FixedDiff, true);
        while status.is_failure() && self.ic_recovery.has_more_fixes() {
            status = self.ic_recovery.attempt_fix(model, solver, t, op_flags, control_flags);
        }
        if status.is_failure() {
            let mut fault_recovery = FaultResetRecovery::new(model);
            while status.is_failure() && fault_recovery.has_more_fixes() {
                status = fault_recovery.attempt_fix(model, solver, t);
            }
        }
        if status.is_success() && self.check_algebraic_roots(model, solver, t, *op_flags) {
            status = solver.calc_ic(t, Time::probe_step(), crate::core::solver_backend::IcMode::FixedDiff, true);
        }
        status
    }
}

impl Default for DynamicDriver {
    fn default() -> Self {
        Self::new()
    }
}
