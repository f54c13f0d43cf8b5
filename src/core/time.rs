//! Integer-tick simulation time at a fixed nanosecond resolution.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Sub, SubAssign};

/// Number of ticks per second. Fixed at nanosecond resolution (10^-9 s).
pub const TICKS_PER_SECOND: i64 = 1_000_000_000;

/// Simulation time as a signed count of nanosecond ticks.
///
/// Arithmetic and comparisons are exact in tick-space; conversion to/from
/// `f64` seconds is explicit and rounds to the nearest tick.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    pub const fn from_ticks(ticks: i64) -> Self {
        Time(ticks)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    pub const fn zero() -> Self {
        Time(0)
    }

    pub const fn max() -> Self {
        Time(i64::MAX)
    }

    pub const fn min() -> Self {
        Time(i64::MIN)
    }

    /// The IC-probe step used throughout `calc_ic`: a tiny positive duration, fixed for a run.
    pub const fn probe_step() -> Self {
        Time(1_000) // 1 microsecond
    }

    pub fn from_seconds(t: f64) -> Self {
        Time((t * TICKS_PER_SECOND as f64).round() as i64)
    }

    pub fn to_seconds(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }

    pub fn is_unset(self) -> bool {
        self == Time::max()
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.to_seconds())
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, rhs: Time) -> Time {
        Time(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Div for Time {
    type Output = f64;
    fn div(self, rhs: Time) -> f64 {
        self.0 as f64 / rhs.0 as f64
    }
}

/// Index type used for state/root/Jacobian offsets. Fixed at `usize` in-process;
/// `Index` is the serialized/FFI-stable width.
pub type Index = u64;

pub const K_NULL_LOCATION: Index = Index::MAX;
pub const K_INVALID_LOCATION: Index = Index::MAX - 1;

pub fn is_valid_index(idx: Index) -> bool {
    idx != K_NULL_LOCATION && idx != K_INVALID_LOCATION
}
