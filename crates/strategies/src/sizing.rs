use crate::StrategyError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfig {
    cash_fraction: f64,
}

impl SizingConfig {
    pub fn new(cash_fraction: f64) -> Result<Self, StrategyError> {
        if !cash_fraction.is_finite() || cash_fraction <= 0.0 || cash_fraction > 1.0 {
            return Err(StrategyError::InvalidCashFraction(cash_fraction));
        }

        Ok(Self { cash_fraction })
    }

    pub fn cash_fraction(&self) -> f64 {
        self.cash_fraction
    }

    /// Whole-cash sizing is left to the engine so the cost matches cash exactly.
    pub fn uses_all_cash(&self) -> bool {
        self.cash_fraction == 1.0
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self { cash_fraction: 1.0 }
    }
}

/// Units affordable with `cash * cash_fraction`, commission on the open leg included.
pub fn size_for_price(
    cash: f64,
    price: f64,
    commission: f64,
    config: SizingConfig,
) -> Result<f64, StrategyError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(StrategyError::NonPositivePrice(price));
    }
    if !cash.is_finite() || cash < 0.0 {
        return Err(StrategyError::InvalidCash(cash));
    }
    if !commission.is_finite() || commission < 0.0 {
        return Err(StrategyError::InvalidCommission(commission));
    }

    let size = cash * config.cash_fraction / (price * (1.0 + commission));
    if !size.is_finite() || size <= 0.0 {
        return Err(StrategyError::InvalidPositionSize);
    }

    Ok(size)
}
