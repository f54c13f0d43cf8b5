//! Three solver-failure recovery ladders, one per driver context: each is an
//! ordered sequence of increasingly invasive repair strategies, tried in turn
//! until one succeeds or the ladder is exhausted.

pub mod dynamic_ic_recovery;
pub mod fault_reset_recovery;
pub mod power_flow_recovery;

pub use dynamic_ic_recovery::DynamicIcRecovery;
pub use fault_reset_recovery::FaultResetRecovery;
pub use power_flow_recovery::PowerFlowRecovery;

/// Shared by all three ladders: whether the caller may call `attempt_fix`
/// again without a `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    MoreOptions,
    OutOfOptions,
}
