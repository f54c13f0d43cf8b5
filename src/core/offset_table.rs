//! `OffsetTable`: per-`SolverMode` component offsets into the global
//! state/root/Jacobian arrays, reallocated whenever the component tree's
//! structure changes.

use std::collections::HashMap;

use super::state::SolverMode;

/// A contiguous slice within one of the backend's global arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub base: usize,
    pub len: usize,
}

impl Offset {
    pub fn range(self) -> std::ops::Range<usize> {
        self.base..self.base + self.len
    }
}

/// Per-component offsets for one `SolverMode`.
#[derive(Debug, Clone, Default)]
pub struct ModeOffsets {
    pub state: HashMap<u64, Offset>,
    pub deriv: HashMap<u64, Offset>,
    pub alg_root: HashMap<u64, Offset>,
    pub diff_root: HashMap<u64, Offset>,
    pub jacobian: HashMap<u64, Offset>,
    pub total_state: usize,
    pub total_roots: usize,
    pub max_non_zeros: usize,
    valid: bool,
}

/// Maps component ids to their slice of the global arrays, per mode.
/// Invalidated implicitly whenever `state_change_flag` or `object_change_flag`
/// fires (the caller signals this via [`OffsetTable::invalidate`]).
#[derive(Debug, Default)]
pub struct OffsetTable {
    modes: HashMap<usize, ModeOffsets>,
}

impl OffsetTable {
    pub fn new() -> Self {
        OffsetTable::default()
    }

    pub fn is_valid(&self, mode: SolverMode) -> bool {
        self.modes
            .get(&mode.offset_index)
            .map(|m| m.valid)
            .unwrap_or(false)
    }

    pub fn invalidate(&mut self, mode: SolverMode) {
        if let Some(m) = self.modes.get_mut(&mode.offset_index) {
            m.valid = false;
        }
    }

    pub fn invalidate_all(&mut self) {
        for m in self.modes.values_mut() {
            m.valid = false;
        }
    }

    /// Walk the component tree (`component_ids`, in the caller's fixed
    /// pre-order) and assign contiguous state/root/Jacobian slices. Each
    /// `sizes` entry gives `(state_len, alg_root_len, diff_root_len)` for the
    /// corresponding component. Idempotent when `is_valid(mode)` is already
    /// true and the component/size sets are unchanged — callers should skip
    /// the call in that case, since it is a no-op.
    pub fn update_offsets(
        &mut self,
        mode: SolverMode,
        component_ids: &[u64],
        sizes: &[(usize, usize, usize)],
    ) {
        assert_eq!(component_ids.len(), sizes.len());
        let mut entry = ModeOffsets::default();
        let mut state_base = 0usize;
        let mut alg_root_base = 0usize;
        let mut diff_root_base = 0usize;
        for (&id, &(state_len, alg_len, diff_len)) in component_ids.iter().zip(sizes.iter()) {
            if state_len > 0 {
                entry.state.insert(
                    id,
                    Offset {
                        base: state_base,
                        len: state_len,
                    },
                );
                if mode.is_differential() {
                    entry.deriv.insert(
                        id,
                        Offset {
                            base: state_base,
                            len: state_len,
                        },
                    );
                }
                state_base += state_len;
            }
            if alg_len > 0 {
                entry.alg_root.insert(
                    id,
                    Offset {
                        base: alg_root_base,
                        len: alg_len,
                    },
                );
                alg_root_base += alg_len;
            }
            if diff_len > 0 {
                entry.diff_root.insert(
                    id,
                    Offset {
                        base: diff_root_base,
                        len: diff_len,
                    },
                );
                diff_root_base += diff_len;
            }
        }
        entry.total_state = state_base;
        entry.total_roots = alg_root_base + diff_root_base;
        entry.valid = true;
        self.modes.insert(mode.offset_index, entry);
    }

    pub fn set_max_non_zeros(&mut self, mode: SolverMode, jac_size: usize) {
        self.modes
            .entry(mode.offset_index)
            .or_default()
            .max_non_zeros = jac_size;
    }

    pub fn state_offset(&self, mode: SolverMode, component: u64) -> Option<Offset> {
        self.modes.get(&mode.offset_index)?.state.get(&component).copied()
    }

    pub fn total_state(&self, mode: SolverMode) -> usize {
        self.modes.get(&mode.offset_index).map(|m| m.total_state).unwrap_or(0)
    }

    pub fn total_roots(&self, mode: SolverMode) -> usize {
        self.modes.get(&mode.offset_index).map(|m| m.total_roots).unwrap_or(0)
    }
}
