//! Per-zone IXFR configuration.

use serde::{Deserialize, Serialize};

use crate::chain::ChainBudget;

/// The IXFR settings of one zone, as loaded from the host's policy/zone
/// configuration (TOML, per the workspace convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IxfrConfig {
    /// Whether incoming transfers are recorded as IXFR history at all.
    pub store_ixfr: bool,

    /// Maximum number of segments retained; 0 disables storage regardless of
    /// `store_ixfr`.
    pub ixfr_number: usize,

    /// Maximum aggregate byte size of the retained chain; 0 means no cap.
    pub ixfr_size: usize,
}

impl Default for IxfrConfig {
    fn default() -> Self {
        Self { store_ixfr: false, ixfr_number: 0, ixfr_size: 0 }
    }
}

impl IxfrConfig {
    /// The [`ChainBudget`] this configuration implies. `store_ixfr == false`
    /// collapses to a disabled budget regardless of `ixfr_number`.
    pub fn budget(&self) -> ChainBudget {
        if !self.store_ixfr {
            return ChainBudget::disabled();
        }
        ChainBudget { max_count: self.ixfr_number, max_bytes: self.ixfr_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_ixfr_false_disables_the_budget_even_with_a_positive_number() {
        let config = IxfrConfig { store_ixfr: false, ixfr_number: 50, ixfr_size: 0 };
        assert_eq!(config.budget(), ChainBudget::disabled());
    }

    #[test]
    fn zero_size_means_no_byte_cap() {
        let config = IxfrConfig { store_ixfr: true, ixfr_number: 10, ixfr_size: 0 };
        let budget = config.budget();
        assert_eq!(budget.max_bytes, 0);
        assert_eq!(budget.max_count, 10);
    }
}
