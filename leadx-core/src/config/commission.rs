//! Commission rate table.

use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionRate {
    /// Fraction of the deal basis, e.g. `0.05` for 5%.
    pub rate: Decimal,
    /// Floor applied after the rate.
    pub minimum: Decimal,
}

/// Rates per property category plus the split between candidate and platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionSettings {
    pub default_rate: CommissionRate,
    /// Keyed by lowercase category.
    pub rates: HashMap<String, CommissionRate>,
    /// Fraction of the amount owed to the winning candidate.
    pub candidate_share: Decimal,
}

impl CommissionSettings {
    pub fn new(default_rate: CommissionRate, candidate_share: Decimal) -> Self {
        Self {
            default_rate,
            rates: HashMap::new(),
            candidate_share,
        }
    }

    pub fn with_rate(mut self, category: &str, rate: CommissionRate) -> Self {
        self.rates.insert(category.trim().to_lowercase(), rate);
        self
    }

    /// Rate for `category`, falling back to the default. Case-insensitive.
    pub fn rate_for(&self, category: &str) -> CommissionRate {
        self.rates
            .get(&category.trim().to_lowercase())
            .copied()
            .unwrap_or(self.default_rate)
    }
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self::new(
            CommissionRate {
                rate: Decimal::new(3, 2),
                minimum: Decimal::ZERO,
            },
            Decimal::new(60, 2),
        )
        .with_rate(
            "rental",
            CommissionRate {
                rate: Decimal::new(5, 2),
                minimum: Decimal::from(1_000),
            },
        )
        .with_rate(
            "sale",
            CommissionRate {
                rate: Decimal::new(2, 2),
                minimum: Decimal::from(4_000),
            },
        )
        .with_rate(
            "developer",
            CommissionRate {
                rate: Decimal::new(3, 2),
                minimum: Decimal::from(10_000),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive_with_fallback() {
        let settings = CommissionSettings::default();
        assert_eq!(settings.rate_for("Rental").rate, Decimal::new(5, 2));
        assert_eq!(settings.rate_for(" SALE ").minimum, Decimal::from(4_000));
        assert_eq!(settings.rate_for("apartment"), settings.default_rate);
    }
}
