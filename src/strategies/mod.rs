//! Chart-pattern strategies
//!
//! A strategy scans one enriched series and returns the candidate signals that
//! pass the shared validation contract in [`helpers`].
//!
//! # Builtin set
//!
//! - **Golden_Cross**: EMA50 crossing above EMA200
//! - **Simple_Breakout**: close clearing the prior lookback high by a margin
//!
//! The set is closed: a new variant is added to `define_builtin_strategies!`
//! and to [`ScannerBuilder::with_all_defaults`](crate::scanner::ScannerBuilder::with_all_defaults).

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple strategy types.
macro_rules! impl_with_defaults {
  ($($strategy:ty),* $(,)?) => {
    $(impl $strategy {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod breakout;
pub mod golden_cross;

pub use breakout::*;
pub use golden_cross::*;
pub use helpers::*;

use crate::{EnrichedSeries, Result, Signal};

/// Object-safe strategy contract
pub trait Strategy: Send + Sync {
    /// Setup name carried by emitted signals
    fn name(&self) -> &'static str;

    /// Shortest series the strategy will scan; shorter input yields no signals
    fn min_bars(&self) -> usize;

    fn min_risk_reward(&self) -> f64 {
        DEFAULT_MIN_RISK_REWARD
    }

    fn scan(&self, series: &EnrichedSeries, symbol: &str) -> Result<Vec<Signal>>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

impl_with_defaults!(GoldenCrossStrategy, BreakoutStrategy);

/// Macro to generate BuiltinStrategy enum without boilerplate
macro_rules! define_builtin_strategies {
    (
        $(
            $variant:ident($strategy:ty)
        ),* $(,)?
    ) => {
        /// All builtin strategies - enum dispatch over the closed set
        #[derive(Debug, Clone)]
        pub enum BuiltinStrategy {
            $($variant($strategy)),*
        }

        impl Strategy for BuiltinStrategy {
            #[inline]
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(s) => Strategy::name(s)),*
                }
            }

            #[inline]
            fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(s) => Strategy::min_bars(s)),*
                }
            }

            #[inline]
            fn min_risk_reward(&self) -> f64 {
                match self {
                    $(Self::$variant(s) => Strategy::min_risk_reward(s)),*
                }
            }

            fn scan(&self, series: &EnrichedSeries, symbol: &str) -> Result<Vec<Signal>> {
                match self {
                    $(Self::$variant(s) => Strategy::scan(s, series, symbol)),*
                }
            }

            fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(s) => Strategy::validate_config(s)),*
                }
            }
        }
    };
}

define_builtin_strategies! {
    GoldenCross(GoldenCrossStrategy),
    Breakout(BreakoutStrategy),
}
