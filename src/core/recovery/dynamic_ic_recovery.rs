//! `DynamicIcRecovery` recovers a consistent initial condition for the
//! dynamic (DAE) driver after `calc_ic` fails, escalating through five
//! fixes. A
//! `SolverInvalidStateError` result at any stage triggers a low-voltage root
//! check before the next stage is attempted.

use crate::core::simulation_model::{ConvergeMode, NetworkCheckLevel, RootCheckLevel, SimulationModel, StateData};
use crate::core::solver_backend::{IcMode, SolverBackend};
use crate::core::state::{ChangeCode, ControlFlags, OpFlags, StatusCode};
use crate::core::time::Time;

pub struct DynamicIcRecovery {
    attempt_number: u32,
}

impl DynamicIcRecovery {
    pub fn new() -> Self {
        DynamicIcRecovery { attempt_number: 0 }
    }

    pub fn reset(&mut self) {
        self.attempt_number = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt_number
    }

    pub fn has_more_fixes(&self) -> bool {
        self.attempt_number < 6
    }

    pub fn attempt_fix(
        &mut self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        t: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> StatusCode {
        let mut retval = StatusCode::Custom(-101);
        while self.attempt_number < 6 {
            self.attempt_number += 1;
            retval = match self.attempt_number {
                1 => self.dynamic_fix1(model, solver, t),
                2 => self.dynamic_fix2(model, solver, t, op_flags, control_flags),
                3 => self.dynamic_fix3(model, solver, t),
                4 => self.dynamic_fix4(model, solver, t),
                5 => self.dynamic_fix5(model, solver, t),
                _ => break,
            };

            if retval == StatusCode::FunctionExecutionSuccess {
                return StatusCode::FunctionExecutionSuccess;
            } else if retval == StatusCode::SolverInvalidStateError {
                self.low_voltage_check(model, solver, t);
            }
        }
        retval
    }

    fn low_voltage_check(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mode = solver.solver_mode();
        let sd = StateData {
            t,
            state: solver.state_data(),
            deriv: solver.deriv_data(),
            seq_id: 0,
            cj: 0.0,
        };
        model.root_check(&sd, mode, RootCheckLevel::LowVoltageCheck);
        solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
    }

    /// Any non-reversible network adjustments, then block converge.
    fn dynamic_fix1(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        model.check_network(NetworkCheckLevel::Simplified);
        let mode = solver.solver_mode();
        {
            let (state, deriv) = solver.state_and_deriv_mut();
            model.converge(t, state, Some(deriv), mode, ConvergeMode::BlockIteration, 3.0);
        }
        solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
    }

    /// Low-voltage load handling the first time through (switch loads to
    /// PQ-at-0.9 and re-check roots), reversible-only root adjustment on
    /// subsequent passes.
    fn dynamic_fix2(
        &self,
        model: &mut dyn SimulationModel,
        solver: &mut dyn SolverBackend,
        t: Time,
        op_flags: &mut OpFlags,
        control_flags: &mut ControlFlags,
    ) -> StatusCode {
        let mode = solver.solver_mode();
        {
            let (state, deriv) = solver.state_and_deriv_mut();
            model.converge(t, state, Some(deriv), mode, ConvergeMode::BlockIteration, 3.0);
        }

        let voltages = model.get_voltage();
        if !voltages.iter().any(|&v| v < 0.7) {
            let (state, deriv) = solver.state_and_deriv_mut();
            model.converge(t, state, Some(deriv), mode, ConvergeMode::BlockIteration, 0.01);
            return solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
        }

        if !op_flags.contains(OpFlags::PREV_SETALL_PQVLIMIT) {
            op_flags.insert(OpFlags::DISABLE_FLAG_UPDATES);
            model.set_all("load", "pqlowvlimit", 0.9);
            control_flags.insert(ControlFlags::VOLTAGE_CONSTRAINTS);
            op_flags.insert(OpFlags::PREV_SETALL_PQVLIMIT);
            op_flags.remove(OpFlags::RESET_VOLTAGE);
            op_flags.remove(OpFlags::DISABLE_FLAG_UPDATES);
            model.handle_root_change(mode);

            let sd = StateData {
                t,
                state: solver.state_data(),
                deriv: solver.deriv_data(),
                seq_id: 0,
                cj: 0.0,
            };
            let ret = model.root_check(&sd, mode, RootCheckLevel::CompleteStateCheck);
            model.handle_root_change(mode);
            if ret > ChangeCode::NoChange {
                if model.dynamic_check_and_reset(mode, Some(ret)) {
                    return solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
                }
                return StatusCode::Custom(-10);
            }
            solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
        } else {
            let sd = StateData {
                t,
                state: solver.state_data(),
                deriv: solver.deriv_data(),
                seq_id: 0,
                cj: 0.0,
            };
            let ret = model.root_check(&sd, mode, RootCheckLevel::ReversableOnly);
            model.handle_root_change(mode);
            if ret > ChangeCode::NonStateChange {
                if model.dynamic_check_and_reset(mode, Some(ret)) {
                    return solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
                }
                return StatusCode::Custom(-10);
            }
            let size = solver.size();
            let mut deriv_buf = vec![0.0; size];
            {
                let state = solver.state_data_mut();
                model.guess_state(t, state, &mut deriv_buf, mode);
            }
            solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
        }
    }

    /// Step forward one probe interval, reconcile structure, and re-probe a
    /// fresh IC. No separate algebraic-solve branch — left for a future
    /// solver that needs one.
    fn dynamic_fix3(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mode = solver.solver_mode();
        model.dynamic_check_and_reset(mode, None);
        solver.calc_ic(t + Time::probe_step(), Time::probe_step(), IcMode::FixedDiff, true)
    }

    /// Disconnect very low voltage buses, then block-converge and re-probe.
    fn dynamic_fix4(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mode = solver.solver_mode();
        if model.get_voltage().iter().any(|&v| v < 0.1) {
            model.set_all("bus", "lowvdisconnect", 0.03);
            model.dynamic_check_and_reset(mode, None);
        }
        let (state, deriv) = solver.state_and_deriv_mut();
        model.converge(t, state, Some(deriv), mode, ConvergeMode::BlockIteration, 0.01);
        solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
    }

    /// Reserved stage: a plain block-converge-then-probe with no
    /// low-voltage-disconnect branch, kept distinct from `dynamic_fix4`
    /// rather than collapsed into it.
    fn dynamic_fix5(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mode = solver.solver_mode();
        let (state, deriv) = solver.state_and_deriv_mut();
        model.converge(t, state, Some(deriv), mode, ConvergeMode::BlockIteration, 0.01);
        solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
    }
}

impl Default for DynamicIcRecovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulation_model::JacobianSink;
    use crate::core::state::SolverModeKind;

    struct StubModel {
        voltages: Vec<f64>,
        set_all_calls: Vec<(String, String, f64)>,
    }

    impl SimulationModel for StubModel {
        fn state_size(&self, _mode: crate::core::state::SolverMode) -> usize {
            2
        }
        fn root_size(&self, _mode: crate::core::state::SolverMode) -> usize {
            0
        }
        fn jac_size(&self, _mode: crate::core::state::SolverMode) -> usize {
            4
        }
        fn guess_state(&mut self, _t: Time, state_out: &mut [f64], _deriv_out: &mut [f64], _mode: crate::core::state::SolverMode) {
            state_out.fill(1.0);
        }
        fn set_state(&mut self, _t: Time, _state_in: &[f64], _deriv_in: &[f64], _mode: crate::core::state::SolverMode) {}
        fn residual(&self, _sd: &StateData, _resid_out: &mut [f64], _mode: crate::core::state::SolverMode) -> Result<(), &'static str> {
            Ok(())
        }
        fn derivative(&self, _sd: &StateData, _deriv_out: &mut [f64], _mode: crate::core::state::SolverMode) -> Result<(), &'static str> {
            Ok(())
        }
        fn jacobian_elements(&self, _sd: &StateData, _sink: &mut dyn JacobianSink, _mode: crate::core::state::SolverMode) {}
        fn algebraic_update(&mut self, _sd: &StateData, _update_out: &mut [f64], _mode: crate::core::state::SolverMode, _alpha: f64) {}
        fn root_test(&self, _sd: &StateData, _roots_out: &mut [f64], _mode: crate::core::state::SolverMode) {}
        fn root_check(&mut self, _sd: &StateData, _mode: crate::core::state::SolverMode, _level: RootCheckLevel) -> ChangeCode {
            ChangeCode::NoChange
        }
        fn root_trigger(&mut self, _t: Time, _roots_found: &[i32], _mode: crate::core::state::SolverMode) {}
        fn converge(
            &mut self,
            _t: Time,
            _state: &mut [f64],
            _deriv: Option<&mut [f64]>,
            _mode: crate::core::state::SolverMode,
            _converge_mode: ConvergeMode,
            _tolerance: f64,
        ) {
        }
        fn check_network(&mut self, _level: NetworkCheckLevel) {}
        fn power_flow_adjust(&mut self, _reversable_only: bool, _level: RootCheckLevel) -> ChangeCode {
            ChangeCode::NoChange
        }
        fn dynamic_check_and_reset(&mut self, _mode: crate::core::state::SolverMode, _change: Option<ChangeCode>) -> bool {
            true
        }
        fn get_voltage(&self) -> Vec<f64> {
            self.voltages.clone()
        }
        fn set_all(&mut self, kind: &str, parameter: &str, value: f64) {
            self.set_all_calls.push((kind.to_string(), parameter.to_string(), value));
        }
    }

    struct StubSolver {
        state: Vec<f64>,
        deriv: Vec<f64>,
        mode: crate::core::state::SolverMode,
        calc_ic_result: StatusCode,
    }

    impl SolverBackend for StubSolver {
        fn allocate(&mut self, _state_count: usize, _root_count: usize) -> Result<(), &'static str> {
            Ok(())
        }
        fn initialize(&mut self, _t0: Time) -> Result<(), &'static str> {
            Ok(())
        }
        fn set(&mut self, _param: &str, _value: f64) -> Result<(), &'static str> {
            Ok(())
        }
        fn calc_ic(&mut self, _t0: Time, _probe_step: Time, _mode: IcMode, _constraints_on: bool) -> StatusCode {
            self.calc_ic_result
        }
        fn solve(&mut self, t_stop: Time, _step_mode: crate::core::solver_backend::StepMode) -> (StatusCode, Time) {
            (StatusCode::FunctionExecutionSuccess, t_stop)
        }
        fn sparse_re_init(&mut self, _mode: crate::core::solver_backend::SparseReInit) -> Result<(), &'static str> {
            Ok(())
        }
        fn set_max_non_zeros(&mut self, _nnz: usize) {}
        fn set_root_finding(&mut self, _root_count: usize) {}
        fn state_data(&self) -> &[f64] {
            &self.state
        }
        fn state_data_mut(&mut self) -> &mut [f64] {
            &mut self.state
        }
        fn deriv_data(&self) -> &[f64] {
            &self.deriv
        }
        fn deriv_data_mut(&mut self) -> &mut [f64] {
            &mut self.deriv
        }
        fn state_and_deriv_mut(&mut self) -> (&mut [f64], &mut [f64]) {
            (&mut self.state, &mut self.deriv)
        }
        fn roots_found(&self) -> &[i32] {
            &[]
        }
        fn size(&self) -> usize {
            self.state.len()
        }
        fn solver_mode(&self) -> crate::core::state::SolverMode {
            self.mode
        }
    }

    fn fresh(calc_ic_result: StatusCode) -> (StubModel, StubSolver) {
        (
            StubModel {
                voltages: vec![1.0, 1.0],
                set_all_calls: Vec::new(),
            },
            StubSolver {
                state: vec![0.0, 0.0],
                deriv: vec![0.0, 0.0],
                mode: crate::core::state::SolverMode::new(SolverModeKind::Dae, 0),
                calc_ic_result,
            },
        )
    }

    #[test]
    fn stage_one_success_returns_immediately() {
        let (mut model, mut solver) = fresh(StatusCode::FunctionExecutionSuccess);
        let mut recovery = DynamicIcRecovery::new();
        let mut op = OpFlags::empty();
        let mut ctrl = ControlFlags::empty();
        let outcome = recovery.attempt_fix(&mut model, &mut solver, Time::zero(), &mut op, &mut ctrl);
        assert_eq!(outcome, StatusCode::FunctionExecutionSuccess);
        assert_eq!(recovery.attempts(), 1);
    }

    #[test]
    fn low_voltage_triggers_pq_limit_switch_once() {
        let (mut model, mut solver) = fresh(StatusCode::Custom(-10));
        model.voltages = vec![0.5, 1.0];
        let mut recovery = DynamicIcRecovery::new();
        recovery.attempt_number = 1; // force straight into fix2
        let mut op = OpFlags::empty();
        let mut ctrl = ControlFlags::empty();
        recovery.attempt_fix(&mut model, &mut solver, Time::zero(), &mut op, &mut ctrl);
        assert!(model.set_all_calls.iter().any(|(k, p, v)| k == "load" && p == "pqlowvlimit" && *v == 0.9));
        assert!(op.contains(OpFlags::PREV_SETALL_PQVLIMIT));
    }

    #[test]
    fn exhausts_after_six_attempts() {
        let (mut model, mut solver) = fresh(StatusCode::Custom(-10));
        let mut recovery = DynamicIcRecovery::new();
        let mut op = OpFlags::empty();
        let mut ctrl = ControlFlags::empty();
        let outcome = recovery.attempt_fix(&mut model, &mut solver, Time::zero(), &mut op, &mut ctrl);
        assert_ne!(outcome, StatusCode::FunctionExecutionSuccess);
        assert_eq!(recovery.attempts(), 6);
        assert!(!recovery.has_more_fixes());
    }
}
