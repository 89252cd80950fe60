//! Store configuration.

/// Tunables for a [`State`][crate::State].
///
/// Plain data with public fields; construct with `StateConfig::default()` and
/// override what you need.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateConfig {
    /// Enforce the window-2 allocation limits.
    ///
    /// While a subsystem is at `Topology`, only discrete variables owned at a
    /// stage above `Model` and cache entries owned at `Model` or above may be
    /// allocated; anything belonging to `Model` or earlier had to be allocated
    /// during construction.  With this off, such late allocations are accepted
    /// and logged at `warn` level, leaving the rule as a caller obligation.
    pub strict_allocation_windows: bool,

    /// Value written into derivative and constraint-error cache arrays when
    /// they are first materialized.  Defaults to `NaN` so uncomputed entries
    /// are obvious.
    pub uncomputed_cache_value: f64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            strict_allocation_windows: true,
            uncomputed_cache_value:    f64::NAN,
        }
    }
}
