//! Process state machine, change-code ordering, solver-mode identifiers, and
//! the opFlags/controlFlags bitsets that the drivers and recovery ladders
//! read and mutate throughout a run.

use bitflags::bitflags;

/// Simulation process state. Ordered; the driver advances it monotonically
/// except for explicit downgrades on event-driven resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessState {
    Startup,
    Initialized,
    PowerflowComplete,
    DynamicInitialized,
    DynamicPartial,
    DynamicComplete,
    GdError,
}

impl ProcessState {
    /// True if `self` is a valid state to transition to directly from `prior`,
    /// per the driver's documented transitions (monotonic advance, or an
    /// explicit downgrade to `DynamicPartial`/`Initialized`).
    pub fn reachable_from(self, prior: ProcessState) -> bool {
        use ProcessState::*;
        if self >= prior {
            return true;
        }
        matches!(self, DynamicPartial | Initialized | GdError)
    }
}

/// Ordered change-code enum. The driver branches on inequalities
/// (`eval > non_state_change`), never on equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeCode {
    NoChange,
    NonStateChange,
    ParameterChange,
    ObjectChange,
    JacobianChange,
    StateCountChange,
}

impl ChangeCode {
    pub fn max(self, other: ChangeCode) -> ChangeCode {
        std::cmp::max(self, other)
    }
}

/// Which numerical subsystem a call refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverModeKind {
    Powerflow,
    Dae,
    DynamicAlg,
    DynamicDiff,
    Local,
}

/// A `SolverMode` value: a subsystem identifier plus the offset-table handle
/// components use to find their slice of the global state vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolverMode {
    pub kind: SolverModeKind,
    pub offset_index: usize,
    pub force_recalc: bool,
}

impl SolverMode {
    pub fn new(kind: SolverModeKind, offset_index: usize) -> Self {
        SolverMode {
            kind,
            offset_index,
            force_recalc: false,
        }
    }

    pub fn is_dynamic(self) -> bool {
        matches!(
            self.kind,
            SolverModeKind::Dae | SolverModeKind::DynamicAlg | SolverModeKind::DynamicDiff
        )
    }

    pub fn is_differential(self) -> bool {
        matches!(self.kind, SolverModeKind::Dae | SolverModeKind::DynamicDiff)
    }

    pub fn is_algebraic(self) -> bool {
        matches!(
            self.kind,
            SolverModeKind::Powerflow | SolverModeKind::Dae | SolverModeKind::DynamicAlg
        )
    }
}

bitflags! {
    /// Flags produced/consumed by the numerics: structural change markers,
    /// root bookkeeping, and transient recovery state. Cleared (mostly) by
    /// `RESET_CHANGE_FLAG_MASK` after every successful step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u32 {
        const RESET_VOLTAGE          = 1 << 0;
        const LOW_BUS_VOLTAGE        = 1 << 1;
        const STATE_CHANGE           = 1 << 2;
        const OBJECT_CHANGE          = 1 << 3;
        const ROOT_CHANGE            = 1 << 4;
        const JACOBIAN_COUNT_CHANGE  = 1 << 5;
        const CONNECTIVITY_CHANGE    = 1 << 6;
        const SLACK_BUS_CHANGE       = 1 << 7;
        const HAS_ROOTS              = 1 << 8;
        const HAS_ALG_ROOTS          = 1 << 9;
        const PREV_SETALL_PQVLIMIT   = 1 << 10;
        const POWERFLOW_SAVED        = 1 << 11;
        const INVALID_STATE          = 1 << 12;
        const DISABLE_FLAG_UPDATES   = 1 << 13;
    }
}

impl OpFlags {
    /// Mask applied after every successful step: squashes transient change
    /// markers while preserving flags that represent ongoing policy state
    /// (`prev_setall_pqvlimit`, `has_roots`, `has_alg_roots`).
    pub fn reset_change_flags(self) -> OpFlags {
        self - (OpFlags::STATE_CHANGE
            | OpFlags::OBJECT_CHANGE
            | OpFlags::ROOT_CHANGE
            | OpFlags::JACOBIAN_COUNT_CHANGE
            | OpFlags::CONNECTIVITY_CHANGE
            | OpFlags::SLACK_BUS_CHANGE
            | OpFlags::RESET_VOLTAGE
            | OpFlags::INVALID_STATE)
    }
}

bitflags! {
    /// User-policy flags: never produced by the numerics, only read by them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u32 {
        const POWER_ADJUST_ENABLED          = 1 << 0;
        const NO_POWERFLOW_ERROR_RECOVERY   = 1 << 1;
        const NO_POWERFLOW_ADJUSTMENTS      = 1 << 2;
        const FIRST_RUN_LIMITS_ONLY         = 1 << 3;
        const VOLTAGE_CONSTRAINTS           = 1 << 4;
        const CONSTRAINTS_DISABLED          = 1 << 5;
        const ROOTS_DISABLED                = 1 << 6;
        const DENSE_SOLVER                  = 1 << 7;
        const DAE_INIT_FOR_PARTITIONED      = 1 << 8;
        const SINGLE_STEP_MODE              = 1 << 9;
        const SAVE_POWER_FLOW_DATA          = 1 << 10;
        const FORCE_POWER_FLOW              = 1 << 11;
    }
}

/// Status codes returned across the `SolverBackend` boundary. Kept as
/// a numeric-compatible enum, not a `Result`, because callers branch on
/// magnitude (`< 0`) and on the "keep polling" sentinel `HandlerNoReturn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    FunctionExecutionSuccess,
    FunctionExecutionFailure,
    SolverRootFound,
    SolverInvalidStateError,
    HandlerNoReturn,
    Custom(i32),
}

impl StatusCode {
    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::FunctionExecutionSuccess => 0,
            StatusCode::FunctionExecutionFailure => -1,
            StatusCode::SolverRootFound => 1,
            StatusCode::SolverInvalidStateError => -11,
            StatusCode::HandlerNoReturn => i32::MIN,
            StatusCode::Custom(v) => v,
        }
    }

    pub fn is_failure(self) -> bool {
        self.as_i32() < 0
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::FunctionExecutionSuccess)
    }
}
