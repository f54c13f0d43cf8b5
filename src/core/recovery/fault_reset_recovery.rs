//! `FaultResetRecovery` re-establishes a valid dynamic state after a fault
//! clears, escalating through six fixes, each followed by
//! [`check_reset_voltages`] — a sanity check that rejects an IC solve that
//! silently killed or resurrected the wrong buses.

use crate::core::simulation_model::{ConvergeMode, ResetLevel, SimulationModel};
use crate::core::solver_backend::{IcMode, SolverBackend};
use crate::core::state::StatusCode;
use crate::core::time::Time;

pub struct FaultResetRecovery {
    attempt_number: u32,
    init_volts: Vec<f64>,
}

impl FaultResetRecovery {
    /// Snapshots the pre-fault-reset voltage profile for later sanity checks.
    pub fn new(model: &dyn SimulationModel) -> Self {
        FaultResetRecovery {
            attempt_number: 0,
            init_volts: model.get_voltage(),
        }
    }

    pub fn reset(&mut self, model: &dyn SimulationModel) {
        self.attempt_number = 0;
        self.init_volts = model.get_voltage();
    }

    pub fn attempts(&self) -> u32 {
        self.attempt_number
    }

    pub fn has_more_fixes(&self) -> bool {
        self.attempt_number < 7
    }

    /// Walks the six stages in order, checking `check_reset_voltages` after
    /// every nominally-successful solve, and continuing the loop (rather
    /// than returning) if the sanity check fails.
    pub fn attempt_fix(&mut self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mut retval = StatusCode::Custom(-101);
        while self.attempt_number < 7 {
            self.attempt_number += 1;
            retval = match self.attempt_number {
                1 => self.fault_reset_fix1(model, solver, t),
                2 => self.fault_reset_fix2(model, solver, t, ResetLevel::LowVoltageDyn0),
                3 => self.fault_reset_fix2(model, solver, t, ResetLevel::LowVoltageDyn1),
                4 => self.fault_reset_fix2(model, solver, t, ResetLevel::LowVoltageDyn2),
                5 => self.fault_reset_fix3(model, solver, t),
                6 => self.fault_reset_fix4(),
                _ => break,
            };

            if retval.is_success() {
                let n_volts = model.get_voltage();
                if !check_reset_voltages(&self.init_volts, &n_volts) {
                    retval = StatusCode::Custom(-47);
                } else {
                    break;
                }
            }
        }
        retval
    }

    /// Force on any state whose voltage component has collapsed below 0.1 p.u.
    /// back toward 1.0, then probe with `calc_ic`.
    fn fault_reset_fix1(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        model.reset_level(ResetLevel::LowVoltageDyn0);
        let handled = model.handle_state_change(solver.solver_mode());
        if handled != StatusCode::HandlerNoReturn {
            return handled;
        }

        let mode = solver.solver_mode();
        let mask = model.voltage_state_mask(mode);
        {
            let size = solver.size();
            let mut deriv_buf = vec![0.0; size];
            let state = solver.state_data_mut();
            model.guess_state(t, state, &mut deriv_buf, mode);
        }
        {
            let state = solver.state_data_mut();
            for (pp, is_voltage) in mask.iter().enumerate() {
                if *is_voltage && pp < state.len() && state[pp] < 0.9 {
                    state[pp] = 1.0;
                }
            }
        }
        solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true)
    }

    /// Reset to `rlevel`, probe; on failure fall back to a voltage-only local
    /// converge before re-probing.
    fn fault_reset_fix2(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, rlevel: ResetLevel) -> StatusCode {
        model.reset_level(rlevel);
        let handled = model.handle_state_change(solver.solver_mode());
        if handled != StatusCode::HandlerNoReturn {
            return handled;
        }
        let mode = solver.solver_mode();
        {
            let size = solver.size();
            let mut deriv_buf = vec![0.0; size];
            let state = solver.state_data_mut();
            model.guess_state(t, state, &mut deriv_buf, mode);
        }
        let mut retval = solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
        if !retval.is_success() {
            {
                let state = solver.state_data_mut();
                model.converge(t, state, None, mode, ConvergeMode::VoltageOnly, 0.05);
            }
            retval = solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
        }
        retval
    }

    /// Blend each voltage state toward 1.0 in increasing steps of 0.1,
    /// re-probing (and, on a failed probe, block-converging first) at each step.
    fn fault_reset_fix3(&self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time) -> StatusCode {
        let mode = solver.solver_mode();
        let mask = model.voltage_state_mask(mode);
        let mut retval = StatusCode::Custom(-10);

        let mut step = 1;
        while step < 10 {
            let rv1 = step as f64 * 0.1;
            let mut kk = 0usize;
            {
                let state = solver.state_data_mut();
                for (pp, is_voltage) in mask.iter().enumerate() {
                    if *is_voltage && pp < state.len() {
                        let base = self.init_volts.get(kk).copied().unwrap_or(1.0);
                        state[pp] = rv1 + (1.0 - rv1) * base;
                        kk += 1;
                    }
                }
            }

            retval = solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
            if retval.is_success() {
                let n_volts = model.get_voltage();
                if !check_reset_voltages(&self.init_volts, &n_volts) {
                    retval = StatusCode::Custom(-47);
                }
            } else {
                {
                    let state = solver.state_data_mut();
                    model.converge(t, state, None, mode, ConvergeMode::BlockIteration, 0.1);
                }
                retval = solver.calc_ic(t, Time::probe_step(), IcMode::FixedDiff, true);
                if retval.is_success() {
                    let state = solver.state_data().to_vec();
                    model.set_state(t + Time::probe_step(), &state, &[], mode);
                    let n_volts = model.get_voltage();
                    if check_reset_voltages(&self.init_volts, &n_volts) {
                        return StatusCode::FunctionExecutionSuccess;
                    }
                    retval = StatusCode::Custom(-47);
                }
            }
            step += 1;
        }
        retval
    }

    /// Reserved: no further strategy is known.
    fn fault_reset_fix4(&self) -> StatusCode {
        StatusCode::FunctionExecutionFailure
    }
}

/// Rejects a reset if it simultaneously energized a previously-dead bus and
/// killed another, or if more than one bus newly collapsed — either pattern
/// indicates the IC solver found a spurious, physically implausible state.
pub fn check_reset_voltages(prev: &[f64], curr: &[f64]) -> bool {
    let mut resurrected = false;
    let mut collapsed = 0u32;
    for (p, c) in prev.iter().zip(curr.iter()) {
        if *p < 0.001 && *c > 0.1 {
            resurrected = true;
        }
        if *p > 0.1 && *c < 0.001 {
            collapsed += 1;
        }
    }
    if resurrected && collapsed > 0 {
        return false;
    }
    if collapsed > 1 {
        return false;
    }
    true
}
