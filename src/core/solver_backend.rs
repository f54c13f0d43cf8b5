//! `SolverBackend`: the abstract contract over {DAE, partitioned
//! differential, partitioned algebraic, power-flow Newton, parallel-in-time}
//! backends. Allocates state vectors, exposes `solve`/`calc_ic`, and reports
//! roots and sparse-Jacobian reinit requests; every concrete numerical
//! backend implements this one trait so the drivers never distinguish them.

use super::state::{SolverMode, StatusCode};

/// Which half of `calc_ic`'s contract to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcMode {
    /// Solve algebraic equations with differential states held fixed, then probe.
    FixedDiff,
    /// As `FixedDiff`, additionally holding masked derivatives fixed.
    FixedMaskedAndDeriv,
}

/// How far `solve` is allowed to advance before returning control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Normal,
    SingleStep,
}

/// Signals to the linear-algebra layer that Jacobian structure changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseReInit {
    Resize,
    Refactor,
}

/// The abstract numerical backend a driver is built over: a small, closed
/// capability surface rather than an open class hierarchy.
pub trait SolverBackend {
    /// Idempotent re-sizing of the backend's owned state/root arrays.
    fn allocate(&mut self, state_count: usize, root_count: usize) -> Result<(), &'static str>;

    /// Finalize after allocation; must follow sparsity setup.
    fn initialize(&mut self, t0: super::time::Time) -> Result<(), &'static str>;

    /// Tolerances, stepping policy, or paired-mode linking by `offset_index`.
    fn set(&mut self, param: &str, value: f64) -> Result<(), &'static str>;

    /// Solve algebraic equations with differential states held fixed (or
    /// further constrained per `mode`), then probe forward by `probe_step`.
    fn calc_ic(
        &mut self,
        t0: super::time::Time,
        probe_step: super::time::Time,
        mode: IcMode,
        constraints_on: bool,
    ) -> StatusCode;

    /// Advance to `t_stop`, writing the time actually reached into the return value.
    fn solve(
        &mut self,
        t_stop: super::time::Time,
        step_mode: StepMode,
    ) -> (StatusCode, super::time::Time);

    fn sparse_re_init(&mut self, mode: SparseReInit) -> Result<(), &'static str>;

    fn set_max_non_zeros(&mut self, nnz: usize);

    fn set_root_finding(&mut self, root_count: usize);

    fn state_data(&self) -> &[f64];
    fn state_data_mut(&mut self) -> &mut [f64];
    fn deriv_data(&self) -> &[f64];
    fn deriv_data_mut(&mut self) -> &mut [f64];

    /// Both buffers at once, for callers (DAE `converge`) that need to
    /// mutate state and derivative together; a plain `&mut self` cannot
    /// yield two independent `&mut [f64]` without this.
    fn state_and_deriv_mut(&mut self) -> (&mut [f64], &mut [f64]);

    fn roots_found(&self) -> &[i32];

    fn size(&self) -> usize;

    fn solver_mode(&self) -> SolverMode;

    /// Re-arm internal symbolic/numeric factorization caches without
    /// discarding allocated storage. Declared on every backend (with a
    /// no-op default) so all backends present the same surface.
    fn reset(&mut self) {}

    fn last_error_string(&self) -> Option<String> {
        None
    }
}
