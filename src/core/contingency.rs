//! Contingency analysis: N-1/N-1-1/N-2 and custom outage lists run against a
//! solved base case, with violation scoring and staged event replay per
//! contingency.

use crate::core::event_queue::SimEvent;
use crate::core::simulation_model::{BranchFlow, SimulationModel};
use crate::core::solver_backend::SolverBackend;
use crate::core::state::StatusCode;
use crate::core::time::Time;
use crate::core::work_queue::{WorkPriority, WorkQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCode {
    NoViolation,
    VoltageOverLimit,
    VoltageUnderLimit,
    MvaExceedRatingA,
    MvaExceedRatingB,
    MvaExceedRatingEmergency,
    MinAngleExceeded,
    MaxAngleExceeded,
    MaxCurrentExceeded,
    ConvergenceFailure,
}

/// One constraint violation found while scoring a contingency's solved state.
#[derive(Debug, Clone)]
pub struct Violation {
    pub object_name: String,
    pub level: f64,
    pub limit: f64,
    pub percent_violation: f64,
    pub contingency_id: u64,
    pub code: ViolationCode,
    pub severity: i32,
}

impl Violation {
    pub fn to_string(&self) -> String {
        format!(
            "{}: {:?} level={:.4} limit={:.4} ({:+.1}%)",
            self.object_name, self.code, self.level, self.limit, self.percent_violation * 100.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContingencyMode {
    N1,
    N11,
    N2,
    Line,
    Gen,
    Load,
    Bus,
    Custom,
    Unknown,
}

/// Parameters steering `build_contingency_list` for modes that need more
/// than a bare enum (thresholds, inclusion lists).
#[derive(Debug, Clone, Default)]
pub struct ExtraContingencyInfo {
    pub voltage_low_limit: f64,
    pub voltage_high_limit: f64,
    pub line_mva_limit_scale: f64,
    pub angle_min_limit: f64,
    pub angle_max_limit: f64,
    pub included_object_names: Vec<String>,
}

/// Scores one branch's MVA (against its three rating tiers, worst tier
/// first so a branch past its emergency rating isn't also reported as
/// merely past ratingA) and current against `BranchFlow`'s own limits.
fn score_branch_flow(contingency_id: u64, flow: &BranchFlow) -> Vec<Violation> {
    let mut violations = Vec::new();
    if flow.mva > flow.rating_emergency {
        violations.push(Violation {
            object_name: flow.name.clone(),
            level: flow.mva,
            limit: flow.rating_emergency,
            percent_violation: (flow.mva - flow.rating_emergency) / flow.rating_emergency,
            contingency_id,
            code: ViolationCode::MvaExceedRatingEmergency,
            severity: 3,
        });
    } else if flow.mva > flow.rating_b {
        violations.push(Violation {
            object_name: flow.name.clone(),
            level: flow.mva,
            limit: flow.rating_b,
            percent_violation: (flow.mva - flow.rating_b) / flow.rating_b,
            contingency_id,
            code: ViolationCode::MvaExceedRatingB,
            severity: 2,
        });
    } else if flow.mva > flow.rating_a {
        violations.push(Violation {
            object_name: flow.name.clone(),
            level: flow.mva,
            limit: flow.rating_a,
            percent_violation: (flow.mva - flow.rating_a) / flow.rating_a,
            contingency_id,
            code: ViolationCode::MvaExceedRatingA,
            severity: 1,
        });
    }
    if flow.current > flow.current_limit {
        violations.push(Violation {
            object_name: flow.name.clone(),
            level: flow.current,
            limit: flow.current_limit,
            percent_violation: (flow.current - flow.current_limit) / flow.current_limit,
            contingency_id,
            code: ViolationCode::MaxCurrentExceeded,
            severity: 1,
        });
    }
    violations
}

/// A single contingency: which events to apply to the base case, and the
/// resulting violations once it has been executed.
pub struct Contingency {
    pub id: u64,
    pub name: String,
    pub mode: ContingencyMode,
    pub completed: bool,
    pub violations: Vec<Violation>,
    /// Performance index: aggregate severity score, computed over `violations`.
    pub pi: f64,
    pub low_v: f64,
    pub bus_voltages: Vec<f64>,
    pub bus_angles: Vec<f64>,
    pub line_flows: Vec<f64>,
    /// Staged event lists applied at the start of this contingency's run:
    /// each stage is a list of events executed together (outage, then any
    /// cascading trips) before the powerflow is re-solved.
    pub event_list: Vec<Vec<Box<dyn SimEvent>>>,
}

impl Contingency {
    pub fn new(id: u64, mode: ContingencyMode) -> Self {
        Contingency {
            id,
            name: format!("{mode:?}-{id}"),
            mode,
            completed: false,
            violations: Vec::new(),
            pi: 0.0,
            low_v: 1.0,
            bus_voltages: Vec::new(),
            bus_angles: Vec::new(),
            line_flows: Vec::new(),
            event_list: Vec::new(),
        }
    }

    /// Run this contingency's events against `model`/`solver`, record the
    /// resulting bus voltages/angles, and score violations. Returns the
    /// solver status from the re-solve.
    pub fn execute(&mut self, model: &mut dyn SimulationModel, solver: &mut dyn SolverBackend, t: Time, limits: &ExtraContingencyInfo) -> StatusCode {
        for stage in self.event_list.iter_mut() {
            for event in stage.iter_mut() {
                event.execute_a(t);
            }
            for event in stage.iter_mut() {
                event.execute_b(t);
            }
        }

        let (status, _reached) = solver.solve(t, crate::core::solver_backend::StepMode::Normal);
        self.bus_voltages = model.get_voltage();
        self.bus_angles = model.get_bus_angles();
        self.low_v = self.bus_voltages.iter().cloned().fold(f64::INFINITY, f64::min);
        let branch_flows = model.get_branch_flows();
        self.line_flows = branch_flows.iter().map(|b| b.mva).collect();

        self.violations.clear();
        for (idx, &v) in self.bus_voltages.iter().enumerate() {
            if v < limits.voltage_low_limit {
                self.violations.push(Violation {
                    object_name: format!("bus{idx}"),
                    level: v,
                    limit: limits.voltage_low_limit,
                    percent_violation: (limits.voltage_low_limit - v) / limits.voltage_low_limit,
                    contingency_id: self.id,
                    code: ViolationCode::VoltageUnderLimit,
                    severity: 1,
                });
            } else if v > limits.voltage_high_limit {
                self.violations.push(Violation {
                    object_name: format!("bus{idx}"),
                    level: v,
                    limit: limits.voltage_high_limit,
                    percent_violation: (v - limits.voltage_high_limit) / limits.voltage_high_limit,
                    contingency_id: self.id,
                    code: ViolationCode::VoltageOverLimit,
                    severity: 1,
                });
            }
        }
        for (idx, &a) in self.bus_angles.iter().enumerate() {
            if a < limits.angle_min_limit {
                self.violations.push(Violation {
                    object_name: format!("bus{idx}"),
                    level: a,
                    limit: limits.angle_min_limit,
                    percent_violation: (limits.angle_min_limit - a) / limits.angle_min_limit.abs().max(f64::EPSILON),
                    contingency_id: self.id,
                    code: ViolationCode::MinAngleExceeded,
                    severity: 1,
                });
            } else if a > limits.angle_max_limit {
                self.violations.push(Violation {
                    object_name: format!("bus{idx}"),
                    level: a,
                    limit: limits.angle_max_limit,
                    percent_violation: (a - limits.angle_max_limit) / limits.angle_max_limit.abs().max(f64::EPSILON),
                    contingency_id: self.id,
                    code: ViolationCode::MaxAngleExceeded,
                    severity: 1,
                });
            }
        }
        for flow in &branch_flows {
            self.violations.extend(score_branch_flow(self.id, flow));
        }
        if status.is_failure() {
            self.violations.push(Violation {
                object_name: "solver".to_string(),
                level: 0.0,
                limit: 0.0,
                percent_violation: 1.0,
                contingency_id: self.id,
                code: ViolationCode::ConvergenceFailure,
                severity: 10,
            });
        }
        self.pi = self.violations.iter().map(|v| v.severity as f64 * (1.0 + v.percent_violation)).sum();
        self.completed = true;
        status
    }

    /// Returns a fresh, unexecuted copy of this contingency's configuration
    /// (id/mode/name; not its results), for re-running against a different
    /// base case.
    pub fn clone_config(&self) -> Contingency {
        let mut fresh = Contingency::new(self.id, self.mode);
        fresh.name = self.name.clone();
        fresh
    }
}

/// Identifies the object an outage event is built for, resolved by the
/// caller-supplied `event_factory` into a concrete [`SimEvent`] — the core
/// knows only the identifier, never how to mutate the component library.
pub enum ContingencyTarget<'a> {
    ComponentId(u64),
    Name(&'a str),
}

/// Builds the contingency list for the given mode (N-1 line/generator/load
/// outages, N-1-1 staged pairs, N-2 simultaneous pairs, or a caller-provided
/// custom list via `extra.included_object_names`). `component_ids`
/// enumerates candidate objects of the relevant kind in `mode`.
///
/// `event_factory` turns a [`ContingencyTarget`] into the concrete outage
/// event for that object; each contingency's `event_list` is populated from
/// it here so `Contingency::execute` has staged events to replay instead of
/// an empty list.
pub fn build_contingency_list(
    mode: ContingencyMode,
    component_ids: &[u64],
    extra: &ExtraContingencyInfo,
    event_factory: &mut dyn FnMut(ContingencyTarget) -> Box<dyn SimEvent>,
) -> Vec<Contingency> {
    let mut next_id = 0u64;
    let mut list = Vec::new();
    match mode {
        ContingencyMode::N1 | ContingencyMode::Line | ContingencyMode::Gen | ContingencyMode::Load | ContingencyMode::Bus => {
            for &id in component_ids {
                let mut con = Contingency::new(next_id, mode);
                con.event_list.push(vec![event_factory(ContingencyTarget::ComponentId(id))]);
                list.push(con);
                next_id += 1;
            }
        }
        ContingencyMode::N2 => {
            for i in 0..component_ids.len() {
                for j in (i + 1)..component_ids.len() {
                    let mut con = Contingency::new(next_id, mode);
                    con.event_list.push(vec![
                        event_factory(ContingencyTarget::ComponentId(component_ids[i])),
                        event_factory(ContingencyTarget::ComponentId(component_ids[j])),
                    ]);
                    list.push(con);
                    next_id += 1;
                }
            }
        }
        ContingencyMode::N11 => {
            // Staged cross-product: every ordered pair of distinct components,
            // the first outage applied at stage 0 and the second at stage 1,
            // so a component can appear as both the initial and the
            // cascading outage across the full n*(n-1) list.
            for i in 0..component_ids.len() {
                for j in 0..component_ids.len() {
                    if i == j {
                        continue;
                    }
                    let mut con = Contingency::new(next_id, mode);
                    con.event_list.push(vec![event_factory(ContingencyTarget::ComponentId(component_ids[i]))]);
                    con.event_list.push(vec![event_factory(ContingencyTarget::ComponentId(component_ids[j]))]);
                    list.push(con);
                    next_id += 1;
                }
            }
        }
        ContingencyMode::Custom => {
            for name in &extra.included_object_names {
                let mut con = Contingency::new(next_id, mode);
                con.event_list.push(vec![event_factory(ContingencyTarget::Name(name))]);
                list.push(con);
                next_id += 1;
            }
        }
        ContingencyMode::Unknown => {}
    }
    list
}

/// Runs every contingency in `list` against independent clones of the solved
/// base case, fanned out across a [`WorkQueue`], and returns the completed
/// list sorted by descending performance index (worst case first).
pub fn run_contingency_analysis(
    list: Vec<Contingency>,
    limits: ExtraContingencyInfo,
    run_one: impl FnMut(&mut Contingency, &ExtraContingencyInfo) + Send + Clone + 'static,
) -> Vec<Contingency> {
    let queue = WorkQueue::new(Some(4));
    let mut handles = Vec::with_capacity(list.len());
    for mut con in list {
        let limits = limits.clone();
        let mut run_one = run_one.clone();
        handles.push(queue.add_work(WorkPriority::Medium, move || {
            run_one(&mut con, &limits);
            con
        }));
    }
    let mut results: Vec<Contingency> = handles.into_iter().map(|h| h.wait()).collect();
    results.sort_by(|a, b| b.pi.partial_cmp(&a.pi).unwrap_or(std::cmp::Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ChangeCode;

    /// Minimal outage event: records which target it was built for and
    /// reports a non-state change when it fires.
    struct TestOutageEvent {
        label: String,
    }

    impl SimEvent for TestOutageEvent {
        fn next_time(&self) -> Time {
            Time::zero()
        }
        fn execute_a(&mut self, _t: Time) -> ChangeCode {
            ChangeCode::NonStateChange
        }
        fn execute_b(&mut self, _t: Time) {}
        fn name(&self) -> String {
            self.label.clone()
        }
    }

    fn test_factory() -> impl FnMut(ContingencyTarget) -> Box<dyn SimEvent> {
        |target: ContingencyTarget| -> Box<dyn SimEvent> {
            let label = match target {
                ContingencyTarget::ComponentId(id) => format!("outage-{id}"),
                ContingencyTarget::Name(name) => format!("outage-{name}"),
            };
            Box::new(TestOutageEvent { label })
        }
    }

    #[test]
    fn build_n1_list_has_one_contingency_per_component() {
        let extra = ExtraContingencyInfo::default();
        let mut factory = test_factory();
        let list = build_contingency_list(ContingencyMode::N1, &[1, 2, 3], &extra, &mut factory);
        assert_eq!(list.len(), 3);
        for con in &list {
            assert_eq!(con.event_list.len(), 1);
            assert_eq!(con.event_list[0].len(), 1);
        }
    }

    #[test]
    fn build_n2_list_has_all_unordered_pairs_with_both_events_staged_together() {
        let extra = ExtraContingencyInfo::default();
        let mut factory = test_factory();
        let list = build_contingency_list(ContingencyMode::N2, &[1, 2, 3, 4], &extra, &mut factory);
        assert_eq!(list.len(), 6); // C(4,2)
        for con in &list {
            assert_eq!(con.event_list.len(), 1);
            assert_eq!(con.event_list[0].len(), 2);
        }
    }

    #[test]
    fn build_n11_list_is_the_staged_cross_product() {
        let extra = ExtraContingencyInfo::default();
        let mut factory = test_factory();
        let list = build_contingency_list(ContingencyMode::N11, &[1, 2, 3], &extra, &mut factory);
        // n*(n-1) ordered pairs, not n like a plain N-1 list.
        assert_eq!(list.len(), 6);
        for con in &list {
            // Two stages, one outage event each — stage 0 the initial
            // outage, stage 1 the cascading one.
            assert_eq!(con.event_list.len(), 2);
            assert_eq!(con.event_list[0].len(), 1);
            assert_eq!(con.event_list[1].len(), 1);
        }
    }

    #[test]
    fn unknown_mode_yields_empty_list() {
        let extra = ExtraContingencyInfo::default();
        let mut factory = test_factory();
        let list = build_contingency_list(ContingencyMode::Unknown, &[1, 2], &extra, &mut factory);
        assert!(list.is_empty());
    }

    #[test]
    fn executing_a_contingency_runs_every_staged_event() {
        use crate::core::solver_backend::{IcMode, SolverBackend, SparseReInit, StepMode};
        use crate::core::state::{SolverMode, SolverModeKind, StatusCode};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct CountingEvent(Arc<AtomicUsize>);
        impl SimEvent for CountingEvent {
            fn next_time(&self) -> Time {
                Time::zero()
            }
            fn execute_a(&mut self, _t: Time) -> ChangeCode {
                self.0.fetch_add(1, Ordering::SeqCst);
                ChangeCode::NonStateChange
            }
            fn execute_b(&mut self, _t: Time) {}
        }

        struct StubModel;
        impl SimulationModel for StubModel {
            fn state_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn root_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn jac_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn guess_state(&mut self, _t: Time, _s: &mut [f64], _d: &mut [f64], _mode: SolverMode) {}
            fn set_state(&mut self, _t: Time, _s: &[f64], _d: &[f64], _mode: SolverMode) {}
            fn residual(&self, _sd: &crate::core::simulation_model::StateData, _r: &mut [f64], _mode: SolverMode) -> Result<(), &'static str> {
                Ok(())
            }
            fn derivative(&self, _sd: &crate::core::simulation_model::StateData, _d: &mut [f64], _mode: SolverMode) -> Result<(), &'static str> {
                Ok(())
            }
            fn jacobian_elements(&self, _sd: &crate::core::simulation_model::StateData, _sink: &mut dyn crate::core::simulation_model::JacobianSink, _mode: SolverMode) {}
            fn algebraic_update(&mut self, _sd: &crate::core::simulation_model::StateData, _u: &mut [f64], _mode: SolverMode, _alpha: f64) {}
            fn root_test(&self, _sd: &crate::core::simulation_model::StateData, _r: &mut [f64], _mode: SolverMode) {}
            fn root_check(&mut self, _sd: &crate::core::simulation_model::StateData, _mode: SolverMode, _level: crate::core::simulation_model::RootCheckLevel) -> ChangeCode {
                ChangeCode::NoChange
            }
            fn root_trigger(&mut self, _t: Time, _roots_found: &[i32], _mode: SolverMode) {}
            fn converge(
                &mut self,
                _t: Time,
                _state: &mut [f64],
                _deriv: Option<&mut [f64]>,
                _mode: SolverMode,
                _converge_mode: crate::core::simulation_model::ConvergeMode,
                _tolerance: f64,
            ) {
            }
            fn check_network(&mut self, _level: crate::core::simulation_model::NetworkCheckLevel) {}
            fn power_flow_adjust(&mut self, _reversable_only: bool, _level: crate::core::simulation_model::RootCheckLevel) -> ChangeCode {
                ChangeCode::NoChange
            }
            fn dynamic_check_and_reset(&mut self, _mode: SolverMode, _change: Option<ChangeCode>) -> bool {
                false
            }
            fn get_voltage(&self) -> Vec<f64> {
                vec![1.0, 1.0]
            }
            fn set_all(&mut self, _kind: &str, _parameter: &str, _value: f64) {}
        }

        struct StubSolver {
            state: Vec<f64>,
            deriv: Vec<f64>,
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
                StatusCode::FunctionExecutionSuccess
            }
            fn solve(&mut self, t_stop: Time, _step_mode: StepMode) -> (StatusCode, Time) {
                (StatusCode::FunctionExecutionSuccess, t_stop)
            }
            fn sparse_re_init(&mut self, _mode: SparseReInit) -> Result<(), &'static str> {
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
                0
            }
            fn solver_mode(&self) -> SolverMode {
                SolverMode::new(SolverModeKind::Powerflow, 0)
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let mut con = Contingency::new(1, ContingencyMode::N1);
        con.event_list.push(vec![Box::new(CountingEvent(counter.clone()))]);
        con.event_list.push(vec![Box::new(CountingEvent(counter.clone())), Box::new(CountingEvent(counter.clone()))]);

        let mut model = StubModel;
        let mut solver = StubSolver { state: Vec::new(), deriv: Vec::new() };
        con.execute(&mut model, &mut solver, Time::zero(), &ExtraContingencyInfo::default());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn overloaded_branch_records_mva_exceed_rating_a_violation() {
        use crate::core::solver_backend::{IcMode, SolverBackend, SparseReInit, StepMode};
        use crate::core::simulation_model::{BranchFlow, ConvergeMode, JacobianSink, NetworkCheckLevel, RootCheckLevel, StateData};
        use crate::core::state::{SolverMode, SolverModeKind, StatusCode};

        struct FlowModel;
        impl SimulationModel for FlowModel {
            fn state_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn root_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn jac_size(&self, _mode: SolverMode) -> usize {
                0
            }
            fn guess_state(&mut self, _t: Time, _s: &mut [f64], _d: &mut [f64], _mode: SolverMode) {}
            fn set_state(&mut self, _t: Time, _s: &[f64], _d: &[f64], _mode: SolverMode) {}
            fn residual(&self, _sd: &StateData, _r: &mut [f64], _mode: SolverMode) -> Result<(), &'static str> {
                Ok(())
            }
            fn derivative(&self, _sd: &StateData, _d: &mut [f64], _mode: SolverMode) -> Result<(), &'static str> {
                Ok(())
            }
            fn jacobian_elements(&self, _sd: &StateData, _sink: &mut dyn JacobianSink, _mode: SolverMode) {}
            fn algebraic_update(&mut self, _sd: &StateData, _u: &mut [f64], _mode: SolverMode, _alpha: f64) {}
            fn root_test(&self, _sd: &StateData, _r: &mut [f64], _mode: SolverMode) {}
            fn root_check(&mut self, _sd: &StateData, _mode: SolverMode, _level: RootCheckLevel) -> ChangeCode {
                ChangeCode::NoChange
            }
            fn root_trigger(&mut self, _t: Time, _roots_found: &[i32], _mode: SolverMode) {}
            fn converge(&mut self, _t: Time, _state: &mut [f64], _deriv: Option<&mut [f64]>, _mode: SolverMode, _converge_mode: ConvergeMode, _tolerance: f64) {}
            fn check_network(&mut self, _level: NetworkCheckLevel) {}
            fn power_flow_adjust(&mut self, _reversable_only: bool, _level: RootCheckLevel) -> ChangeCode {
                ChangeCode::NoChange
            }
            fn dynamic_check_and_reset(&mut self, _mode: SolverMode, _change: Option<ChangeCode>) -> bool {
                false
            }
            fn get_voltage(&self) -> Vec<f64> {
                vec![1.0, 0.98]
            }
            fn get_bus_angles(&self) -> Vec<f64> {
                vec![0.0, -0.01]
            }
            fn get_branch_flows(&self) -> Vec<BranchFlow> {
                vec![
                    BranchFlow {
                        name: "line1-2".to_string(),
                        mva: 1.2,
                        rating_a: 1.0,
                        rating_b: 1.3,
                        rating_emergency: 1.5,
                        current: 0.5,
                        current_limit: 1.0,
                    },
                    BranchFlow {
                        name: "line2-3".to_string(),
                        mva: 0.4,
                        rating_a: 1.0,
                        rating_b: 1.3,
                        rating_emergency: 1.5,
                        current: 0.2,
                        current_limit: 1.0,
                    },
                ]
            }
            fn set_all(&mut self, _kind: &str, _parameter: &str, _value: f64) {}
        }

        struct StubSolver {
            state: Vec<f64>,
            deriv: Vec<f64>,
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
                StatusCode::FunctionExecutionSuccess
            }
            fn solve(&mut self, t_stop: Time, _step_mode: StepMode) -> (StatusCode, Time) {
                (StatusCode::FunctionExecutionSuccess, t_stop)
            }
            fn sparse_re_init(&mut self, _mode: SparseReInit) -> Result<(), &'static str> {
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
                0
            }
            fn solver_mode(&self) -> SolverMode {
                SolverMode::new(SolverModeKind::Powerflow, 0)
            }
        }

        let mut con = Contingency::new(1, ContingencyMode::Line);
        let mut model = FlowModel;
        let mut solver = StubSolver { state: Vec::new(), deriv: Vec::new() };
        let limits = ExtraContingencyInfo {
            voltage_low_limit: 0.9,
            voltage_high_limit: 1.1,
            ..Default::default()
        };
        con.execute(&mut model, &mut solver, Time::zero(), &limits);

        assert_eq!(con.bus_angles, vec![0.0, -0.01]);
        assert_eq!(con.line_flows, vec![1.2, 0.4]);
        assert!(con.violations.iter().any(|v| v.code == ViolationCode::MvaExceedRatingA && v.object_name == "line1-2"));
        assert!(!con.violations.iter().any(|v| v.object_name == "line2-3"));
    }

    #[test]
    fn clone_config_drops_results_but_keeps_identity() {
        let mut con = Contingency::new(7, ContingencyMode::Line);
        con.pi = 5.0;
        con.completed = true;
        let fresh = con.clone_config();
        assert_eq!(fresh.id, 7);
        assert_eq!(fresh.mode, ContingencyMode::Line);
        assert!(!fresh.completed);
        assert_eq!(fresh.pi, 0.0);
    }

    #[test]
    fn worse_contingencies_sort_first() {
        let mut a = Contingency::new(1, ContingencyMode::Line);
        a.pi = 1.0;
        let mut b = Contingency::new(2, ContingencyMode::Line);
        b.pi = 9.0;
        let results = run_contingency_analysis(vec![a, b], ExtraContingencyInfo::default(), |_c, _l| {});
        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 1);
    }
}
