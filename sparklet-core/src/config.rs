//! Engine limits and rendering defaults
//!
//! # Example
//! ```ignore
//! let config = EngineConfig::default().with_step_budget(20_000);
//! let session = SparkletSession::from_json(json, VirtualTimers::new(), config);
//! ```

use crate::runtime::Limits;

/// Tunables for one engine session
///
/// - `step_budget`: evaluation steps allowed per action/helper/expression
/// - `max_call_depth`: nested function calls allowed inside one evaluation
/// - `max_timer_delay_ms`: upper bound applied to `scheduleAction` delays
/// - `default_grid_columns`: grid column hint when an element gives none
/// - `random_seed`: fixed seed for `Math.random` (None = seeded from entropy)
/// - `max_fires_per_advance`: guard against zero-delay reschedule loops on
///   the virtual clock
/// - `max_array_len` / `max_string_len`: largest array (elements) and string
///   (bytes) a script may build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub step_budget: u64,
    pub max_call_depth: usize,
    pub max_timer_delay_ms: u64,
    pub default_grid_columns: usize,
    pub random_seed: Option<u64>,
    pub max_fires_per_advance: usize,
    pub max_array_len: usize,
    pub max_string_len: usize,
}

impl EngineConfig {
    pub const DEFAULT_STEP_BUDGET: u64 = 100_000;
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;
    /// One day
    pub const DEFAULT_MAX_TIMER_DELAY_MS: u64 = 24 * 60 * 60 * 1000;
    pub const DEFAULT_GRID_COLUMNS: usize = 3;
    pub const DEFAULT_MAX_ARRAY_LEN: usize = 100_000;
    pub const DEFAULT_MAX_STRING_LEN: usize = 1_000_000;

    /// Create a config with explicit limits
    pub fn new(
        step_budget: u64,
        max_call_depth: usize,
        max_timer_delay_ms: u64,
        default_grid_columns: usize,
    ) -> Self {
        Self {
            step_budget: step_budget.clamp(100, 100_000_000),
            max_call_depth: max_call_depth.clamp(1, 1_024),
            max_timer_delay_ms: max_timer_delay_ms.max(1),
            default_grid_columns: default_grid_columns.clamp(1, 64),
            random_seed: None,
            max_fires_per_advance: 10_000,
            max_array_len: Self::DEFAULT_MAX_ARRAY_LEN,
            max_string_len: Self::DEFAULT_MAX_STRING_LEN,
        }
    }

    pub fn with_step_budget(self, step_budget: u64) -> Self {
        Self::new(
            step_budget,
            self.max_call_depth,
            self.max_timer_delay_ms,
            self.default_grid_columns,
        )
        .keep_extras(&self)
    }

    pub fn with_max_call_depth(self, max_call_depth: usize) -> Self {
        Self::new(
            self.step_budget,
            max_call_depth,
            self.max_timer_delay_ms,
            self.default_grid_columns,
        )
        .keep_extras(&self)
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    fn keep_extras(mut self, from: &EngineConfig) -> Self {
        self.random_seed = from.random_seed;
        self.max_fires_per_advance = from.max_fires_per_advance;
        self.max_array_len = from.max_array_len;
        self.max_string_len = from.max_string_len;
        self
    }

    /// Interpreter limits derived from this config
    pub fn limits(&self) -> Limits {
        Limits {
            step_budget: self.step_budget,
            max_call_depth: self.max_call_depth,
            max_array_len: self.max_array_len,
            max_string_len: self.max_string_len,
        }
    }

    /// Clamp a script-supplied delay (NaN and negatives fire immediately)
    pub fn clamp_delay_ms(&self, delay_ms: f64) -> u64 {
        if delay_ms.is_nan() || delay_ms <= 0.0 {
            0
        } else {
            (delay_ms as u64).min(self.max_timer_delay_ms)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_STEP_BUDGET,
            Self::DEFAULT_MAX_CALL_DEPTH,
            Self::DEFAULT_MAX_TIMER_DELAY_MS,
            Self::DEFAULT_GRID_COLUMNS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_limits() {
        let config = EngineConfig::new(0, 0, 0, 0);
        assert_eq!(config.step_budget, 100);
        assert_eq!(config.max_call_depth, 1);
        assert_eq!(config.max_timer_delay_ms, 1);
        assert_eq!(config.default_grid_columns, 1);
    }

    #[test]
    fn test_builders_keep_seed() {
        let config = EngineConfig::default()
            .with_random_seed(7)
            .with_step_budget(5_000);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.step_budget, 5_000);
        assert_eq!(config.default_grid_columns, 3);
    }

    #[test]
    fn test_clamp_delay() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_delay_ms(f64::NAN), 0);
        assert_eq!(config.clamp_delay_ms(-50.0), 0);
        assert_eq!(config.clamp_delay_ms(1000.7), 1000);
        assert_eq!(
            config.clamp_delay_ms(1e12),
            EngineConfig::DEFAULT_MAX_TIMER_DELAY_MS
        );
    }
}
