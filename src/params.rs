//! Parameter metadata for strategies
//!
//! This module provides metadata about strategy parameters, enabling:
//! - Range checks on strategy constants
//! - Parameter documentation
//! - Construction of strategies from loosely typed configuration
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use chartscan::params::{ParamMeta, ParameterizedStrategy};
//! use chartscan::prelude::*;
//!
//! for param in BreakoutStrategy::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("lookback", 30.0);
//! let strategy = BreakoutStrategy::with_params(&params).unwrap();
//! assert_eq!(strategy.lookback.get(), 30);
//! ```

use std::collections::HashMap;

use crate::{Period, Ratio, Result, SignalError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value in 0.0..=1.0
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Positive multiplier without an upper bound of 1.0
  Factor,
}

/// Metadata for a single strategy parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "stop_ema_factor")
  pub name: &'static str,
  /// Parameter type
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Accepted range: (min, max)
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(SignalError::InvalidValue("parameter must be finite"));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(SignalError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(SignalError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Factor => {
        if value <= 0.0 {
          return Err(SignalError::InvalidValue("Factor must be positive"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED STRATEGY TRAIT
// ============================================================

/// Trait for strategies whose constants can be supplied at construction
pub trait ParameterizedStrategy: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a strategy from a parameter map.
  ///
  /// Missing parameters use their default values; unknown keys are rejected.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Setup name carried by the strategy's signals
  fn setup_name() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Reject keys that no parameter in `meta` declares
pub fn check_known(params: &HashMap<&str, f64>, meta: &[ParamMeta]) -> Result<()> {
  match params.keys().find(|key| !meta.iter().any(|m| m.name == **key)) {
    Some(key) => Err(SignalError::InvalidConfig(format!("unknown parameter `{key}`"))),
    None => Ok(()),
  }
}

/// Look up a parameter (or its default) and validate it against its metadata
pub fn get_value(params: &HashMap<&str, f64>, meta: &[ParamMeta], key: &str) -> Result<f64> {
  let spec = meta
    .iter()
    .find(|m| m.name == key)
    .ok_or_else(|| SignalError::InvalidConfig(format!("undeclared parameter `{key}`")))?;
  let value = params.get(key).copied().unwrap_or(spec.default);
  spec.validate(value)?;
  Ok(value)
}

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, meta: &[ParamMeta], key: &str) -> Result<Ratio> {
  Ratio::new(get_value(params, meta, key)?)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, meta: &[ParamMeta], key: &str) -> Result<Period> {
  Period::new(get_value(params, meta, key)? as usize)
}

// ============================================================
// TESTS
// ============================================================
