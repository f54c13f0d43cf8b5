//! Transmission/distribution co-simulation coupling: a blocking
//! voltage↔current exchange protocol. This crate owns only the protocol
//! shape, not a concrete MPI transport — when MPI is unavailable, an
//! in-process callback registered per `task_id` plays the role of the
//! distribution task, and that is the only transport implemented here.

use num_complex::Complex64;

/// Message tags from the wire protocol, kept even though this transport
/// never serializes them, so a future MPI-backed `DistributionTask` can reuse
/// them verbatim.
pub const TAG_MODEL_SPEC: i32 = 1;
pub const TAG_VOLTAGE_STEP: i32 = 2;
pub const TAG_CURRENT: i32 = 3;
pub const TAG_STOP: i32 = 4;

/// Three phase-wise complex values, carried as parallel real/imaginary
/// arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThreePhaseValue {
    pub real: [f64; 3],
    pub imag: [f64; 3],
}

impl ThreePhaseValue {
    pub fn from_complex(phases: [Complex64; 3]) -> Self {
        let mut v = ThreePhaseValue::default();
        for i in 0..3 {
            v.real[i] = phases[i].re;
            v.imag[i] = phases[i].im;
        }
        v
    }

    pub fn to_complex(self) -> [Complex64; 3] {
        std::array::from_fn(|i| Complex64::new(self.real[i], self.imag[i]))
    }
}

/// `VoltageMessage`: sent transmission → distribution. `num_three_phase`
/// tells the receiver how many of the three `ThreePhaseValue` slots hold
/// real buses.
#[derive(Debug, Clone, Copy)]
pub struct VoltageMessage {
    pub voltages: [ThreePhaseValue; 3],
    pub num_three_phase: i32,
    pub delta_time: u32,
}

/// `CurrentMessage`: the matched blocking response, distribution → transmission.
#[derive(Debug, Clone, Copy)]
pub struct CurrentMessage {
    pub currents: [ThreePhaseValue; 3],
    pub num_three_phase: i32,
}

/// The distribution side of one coupled task, addressed by `task_id`. Plays
/// the role a per-task MPI rank would play when MPI is available, and the
/// role an in-process callback plays when it isn't — both collapse to this
/// trait here since the crate carries no MPI binding.
pub trait DistributionTask: Send {
    fn task_id(&self) -> i32;

    /// Blocking rendezvous: receive a voltage step, return the resulting current.
    fn exchange(&mut self, voltage: VoltageMessage) -> CurrentMessage;

    /// `STOP` message sent once, at simulation end.
    fn stop(&mut self) {}
}

/// The transmission side: holds one [`DistributionTask`] per registered
/// `task_id` and drives the per-step blocking rendezvous. Single-threaded:
/// each `step` blocks in turn on every registered task, since the per-step
/// send/receive pairing is synchronous.
#[derive(Default)]
pub struct CouplingManager {
    tasks: Vec<Box<dyn DistributionTask>>,
}

impl CouplingManager {
    pub fn new() -> Self {
        CouplingManager::default()
    }

    /// `task_id` assignment happens at setup, before any coupling step runs.
    pub fn register(&mut self, task: Box<dyn DistributionTask>) {
        self.tasks.push(task);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// One coupling step: send `voltage` to every registered task, blocking
    /// on each's current response in registration order before moving to the
    /// next. Returns `(task_id, response)` pairs in that same order.
    pub fn step(&mut self, voltage: VoltageMessage) -> Vec<(i32, CurrentMessage)> {
        self.tasks.iter_mut().map(|t| (t.task_id(), t.exchange(voltage))).collect()
    }

    /// Sends `STOP` to every registered task, in registration order.
    pub fn stop_all(&mut self) {
        for t in self.tasks.iter_mut() {
            t.stop();
        }
    }
}
