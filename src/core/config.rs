//! Core configuration surface, realized as a typed, serde-loadable struct
//! that round-trips through `serde_json` like the rest of this crate's
//! on-disk state.

use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_max_vadjust() -> u32 {
    9
}

fn default_max_padjust() -> u32 {
    5
}

fn default_power_adjust_threshold() -> f64 {
    1e-3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct CoreConfig {
    /// 0=no_print ... 6=trace; mapped to a `tracing` level in `crate::core::logging`.
    pub print_level: u8,
    pub power_adjust_enabled: bool,
    pub no_powerflow_error_recovery: bool,
    pub no_powerflow_adjustments: bool,
    pub first_run_limits_only: bool,
    pub voltage_constraints_flag: bool,
    pub constraints_disabled: bool,
    pub roots_disabled: bool,
    pub dense_solver: bool,
    pub dae_initialization_for_partitioned: bool,
    pub single_step_mode: bool,
    pub save_power_flow_data: bool,
    pub force_power_flow: bool,
    /// Period of binary state dumps during dynamics, in seconds; `0.0` disables.
    pub state_record_period: f64,
    #[serde(default = "default_max_vadjust")]
    pub max_vadjust_iterations: u32,
    #[serde(default = "default_max_padjust")]
    pub max_padjust_iterations: u32,
    #[serde(default = "default_power_adjust_threshold")]
    pub power_adjust_threshold: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            print_level: 2,
            power_adjust_enabled: false,
            no_powerflow_error_recovery: false,
            no_powerflow_adjustments: false,
            first_run_limits_only: false,
            voltage_constraints_flag: false,
            constraints_disabled: false,
            roots_disabled: false,
            dense_solver: false,
            dae_initialization_for_partitioned: false,
            single_step_mode: false,
            save_power_flow_data: false,
            force_power_flow: false,
            state_record_period: 0.0,
            max_vadjust_iterations: default_max_vadjust(),
            max_padjust_iterations: default_max_padjust(),
            power_adjust_threshold: default_power_adjust_threshold(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Layers a JSON file (if given) with `RUSTPOWER_<FIELD>` environment
    /// overrides for the boolean/numeric scalar fields, the minimal layering
    /// an embedded driver needs beyond the component library's single-file load.
    pub fn from_env_and_file(path: Option<impl AsRef<Path>>) -> std::io::Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        if let Ok(v) = std::env::var("RUSTPOWER_POWER_ADJUST_ENABLED") {
            cfg.power_adjust_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("RUSTPOWER_PRINT_LEVEL") {
            if let Ok(p) = v.parse() {
                cfg.print_level = p;
            }
        }
        if let Ok(v) = std::env::var("RUSTPOWER_STATE_RECORD_PERIOD") {
            if let Ok(p) = v.parse() {
                cfg.state_record_period = p;
            }
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = CoreConfig::default();
        assert!(!cfg.power_adjust_enabled);
        assert_eq!(cfg.max_vadjust_iterations, 9);
        assert_eq!(cfg.max_padjust_iterations, 5);
    }

    #[test]
    fn round_trips_through_json() {
        let mut cfg = CoreConfig::default();
        cfg.power_adjust_enabled = true;
        cfg.print_level = 5;
        let s = serde_json::to_string(&cfg).unwrap();
        let back = CoreConfig::from_json_str(&s).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let s = r#"{"print_level": 2, "bogus_field": true}"#;
        assert!(CoreConfig::from_json_str(s).is_err());
    }
}
