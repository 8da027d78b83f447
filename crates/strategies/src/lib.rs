use std::fmt;

pub mod breakout;
pub mod buy_and_hold;
pub mod signals;
pub mod sizing;

pub use breakout::{Breakout, BreakoutParams};
pub use buy_and_hold::BuyAndHold;
pub use signals::{down_breakout, up_breakout};
pub use sizing::{size_for_price, SizingConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyError {
    InvalidCashFraction(f64),
    InvalidPeriod(usize),
    NonPositivePrice(f64),
    InvalidCash(f64),
    InvalidCommission(f64),
    InvalidPositionSize,
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCashFraction(fraction) => {
                write!(f, "cash fraction must be within (0, 1], got {fraction}")
            }
            Self::InvalidPeriod(period) => {
                write!(f, "breakout period must be at least 1, got {period}")
            }
            Self::NonPositivePrice(price) => {
                write!(f, "price must be finite and positive, got {price}")
            }
            Self::InvalidCash(cash) => write!(f, "cash must be finite and non-negative, got {cash}"),
            Self::InvalidCommission(rate) => {
                write!(f, "commission must be finite and non-negative, got {rate}")
            }
            Self::InvalidPositionSize => write!(f, "computed position size is not usable"),
        }
    }
}

impl std::error::Error for StrategyError {}
