//! Residual/Jacobian/convergence checks used by the drivers' error paths and
//! by ad-hoc debugging: a finite-difference Jacobian check, residual and
//! algebraic/derivative sweeps, and a convergence-rate report the recovery
//! ladders consult when Jacobian auditing is enabled.

use crate::core::simulation_model::{JacobianSink, SimulationModel, StateData};
use crate::core::state::SolverMode;
use crate::core::time::Time;

/// One entry of a residual vector that exceeds tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualOffender {
    pub index: usize,
    pub value: f64,
}

/// Evaluates `model.residual` at the given state and reports every entry
/// whose magnitude exceeds `tolerance`.
pub fn residual_check(model: &dyn SimulationModel, sd: &StateData, mode: SolverMode, tolerance: f64) -> Result<Vec<ResidualOffender>, &'static str> {
    let mut resid = vec![0.0; model.state_size(mode)];
    model.residual(sd, &mut resid, mode)?;
    Ok(resid
        .into_iter()
        .enumerate()
        .filter(|&(_, r)| r.abs() > tolerance)
        .map(|(index, value)| ResidualOffender { index, value })
        .collect())
}

struct CountingSink {
    triplets: Vec<(usize, usize, f64)>,
}

impl JacobianSink for CountingSink {
    fn add_triplet(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
    }
}

/// An analytic Jacobian entry whose finite-difference estimate disagrees by
/// more than `tolerance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianMismatch {
    pub row: usize,
    pub col: usize,
    pub analytic: f64,
    pub numeric: f64,
}

/// Compares `model.jacobian_elements`'s analytic entries against a forward
/// finite-difference estimate of the residual's sensitivity to each state
/// component. `perturbation` is the finite-difference step; callers pick an
/// absolute step for simplicity.
pub fn jacobian_check(
    model: &dyn SimulationModel,
    t: Time,
    state: &[f64],
    deriv: &[f64],
    mode: SolverMode,
    perturbation: f64,
    tolerance: f64,
) -> Result<Vec<JacobianMismatch>, &'static str> {
    let n = model.state_size(mode);
    let sd = StateData {
        t,
        state,
        deriv,
        seq_id: 0,
        cj: 0.0,
    };
    let mut sink = CountingSink { triplets: Vec::new() };
    model.jacobian_elements(&sd, &mut sink, mode);

    let mut base_resid = vec![0.0; n];
    model.residual(&sd, &mut base_resid, mode)?;

    let mut mismatches = Vec::new();
    for col in 0..n {
        let mut perturbed_state = state.to_vec();
        perturbed_state[col] += perturbation;
        let perturbed_sd = StateData {
            t,
            state: &perturbed_state,
            deriv,
            seq_id: 0,
            cj: 0.0,
        };
        let mut perturbed_resid = vec![0.0; n];
        model.residual(&perturbed_sd, &mut perturbed_resid, mode)?;

        for row in 0..n {
            let numeric = (perturbed_resid[row] - base_resid[row]) / perturbation;
            let analytic = sink
                .triplets
                .iter()
                .find(|&&(r, c, _)| r == row && c == col)
                .map(|&(_, _, v)| v)
                .unwrap_or(0.0);
            if (numeric - analytic).abs() > tolerance {
                mismatches.push(JacobianMismatch { row, col, analytic, numeric });
            }
        }
    }
    Ok(mismatches)
}

/// Applies `model.algebraic_update` at `alpha = 1.0` and reports the largest
/// resulting change magnitude, a cheap proxy for "is the algebraic subsystem
/// near a fixed point". Grounded on the block-converge retry pattern common
/// to all three recovery ladders.
pub fn algebraic_check(model: &mut dyn SimulationModel, sd: &StateData, mode: SolverMode) -> f64 {
    let mut update = vec![0.0; sd.state.len()];
    model.algebraic_update(sd, &mut update, mode, 1.0);
    update.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
}

/// Runs `model.derivative` and reports the largest magnitude entry, a cheap
/// proxy for how far a guessed state is from satisfying the DAE's
/// differential equations.
pub fn derivative_check(model: &dyn SimulationModel, sd: &StateData, mode: SolverMode) -> Result<f64, &'static str> {
    let mut deriv_out = vec![0.0; sd.state.len()];
    model.derivative(sd, &mut deriv_out, mode)?;
    Ok(deriv_out.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs())))
}

/// A convergence test report, written alongside a dynamic-driver step for
/// offline inspection. Returns the record rather than writing it, leaving
/// persistence to the caller.
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    pub t: Time,
    pub max_residual: f64,
    pub offending_count: usize,
}

pub fn dynamic_solver_convergence_test(model: &dyn SimulationModel, sd: &StateData, mode: SolverMode, tolerance: f64) -> Result<ConvergenceReport, &'static str> {
    let offenders = residual_check(model, sd, mode, tolerance)?;
    let max_residual = offenders.iter().fold(0.0_f64, |acc, o| acc.max(o.value.abs()));
    Ok(ConvergenceReport {
        t: sd.t,
        max_residual,
        offending_count: offenders.len(),
    })
}
