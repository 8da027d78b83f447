use std::{env, fmt, path::PathBuf};

use engine::BacktestConfig;
use strategies::{BreakoutParams, SizingConfig, StrategyError};

const DEFAULT_CASH: f64 = 10_000.0;
const DEFAULT_COMMISSION: f64 = 0.0;
const DEFAULT_STRATEGY: StrategyKind = StrategyKind::Breakout;
const DEFAULT_BREAKOUT_PERIODS: &[(usize, usize)] = &[(20, 10)];
const DEFAULT_CASH_FRACTION: f64 = 1.0;
const DEFAULT_OUTPUT_DIR: &str = "artifacts";
const DEFAULT_SYNTHETIC_SEED: u64 = 42;
const DEFAULT_SYNTHETIC_STEPS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    BuyAndHold,
    Breakout,
}

impl StrategyKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "buy-and-hold" => Some(Self::BuyAndHold),
            "breakout" => Some(Self::Breakout),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuyAndHold => "buy-and-hold",
            Self::Breakout => "breakout",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: Option<PathBuf>,
    pub cash: f64,
    pub commission: f64,
    pub strategy: StrategyKind,
    pub breakout_periods: Vec<(usize, usize)>,
    pub cash_fraction: f64,
    pub output_dir: PathBuf,
    pub synthetic_seed: u64,
    pub synthetic_steps: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidDataPath,
    InvalidCash,
    InvalidCommission,
    InvalidStrategy,
    InvalidBreakoutPeriods,
    InvalidCashFraction(StrategyError),
    InvalidOutputDir,
    InvalidSyntheticSeed,
    InvalidSyntheticSteps,
    NonUnicodeDataPath,
    NonUnicodeCash,
    NonUnicodeCommission,
    NonUnicodeStrategy,
    NonUnicodeBreakoutPeriods,
    NonUnicodeCashFraction,
    NonUnicodeOutputDir,
    NonUnicodeSyntheticSeed,
    NonUnicodeSyntheticSteps,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDataPath => write!(f, "BT_DATA_PATH must not be empty or whitespace"),
            Self::InvalidCash => write!(f, "BT_CASH must be a finite, non-negative amount"),
            Self::InvalidCommission => {
                write!(f, "BT_COMMISSION must be a finite, non-negative rate")
            }
            Self::InvalidStrategy => {
                write!(f, "BT_STRATEGY must be one of: buy-and-hold, breakout")
            }
            Self::InvalidBreakoutPeriods => {
                write!(
                    f,
                    "BT_BREAKOUT_PERIODS must be a comma-separated list of buy:sell periods, each at least 1"
                )
            }
            Self::InvalidCashFraction(err) => write!(f, "BT_CASH_FRACTION is invalid: {err}"),
            Self::InvalidOutputDir => write!(f, "BT_OUTPUT_DIR must not be empty or whitespace"),
            Self::InvalidSyntheticSeed => {
                write!(f, "BT_SYNTHETIC_SEED must be an unsigned 64-bit integer")
            }
            Self::InvalidSyntheticSteps => {
                write!(f, "BT_SYNTHETIC_STEPS must be a positive integer")
            }
            Self::NonUnicodeDataPath => write!(f, "BT_DATA_PATH contains non-unicode data"),
            Self::NonUnicodeCash => write!(f, "BT_CASH contains non-unicode data"),
            Self::NonUnicodeCommission => write!(f, "BT_COMMISSION contains non-unicode data"),
            Self::NonUnicodeStrategy => write!(f, "BT_STRATEGY contains non-unicode data"),
            Self::NonUnicodeBreakoutPeriods => {
                write!(f, "BT_BREAKOUT_PERIODS contains non-unicode data")
            }
            Self::NonUnicodeCashFraction => {
                write!(f, "BT_CASH_FRACTION contains non-unicode data")
            }
            Self::NonUnicodeOutputDir => write!(f, "BT_OUTPUT_DIR contains non-unicode data"),
            Self::NonUnicodeSyntheticSeed => {
                write!(f, "BT_SYNTHETIC_SEED contains non-unicode data")
            }
            Self::NonUnicodeSyntheticSteps => {
                write!(f, "BT_SYNTHETIC_STEPS contains non-unicode data")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCashFraction(err) => Some(err),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_path = match env::var("BT_DATA_PATH") {
            Ok(value) => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidDataPath);
                }
                Some(PathBuf::from(value))
            }
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeDataPath);
            }
        };

        let cash = parse_env(
            "BT_CASH",
            DEFAULT_CASH,
            parse_non_negative,
            ConfigError::InvalidCash,
            ConfigError::NonUnicodeCash,
        )?;

        let commission = parse_env(
            "BT_COMMISSION",
            DEFAULT_COMMISSION,
            parse_non_negative,
            ConfigError::InvalidCommission,
            ConfigError::NonUnicodeCommission,
        )?;

        let strategy = parse_env(
            "BT_STRATEGY",
            DEFAULT_STRATEGY,
            StrategyKind::parse,
            ConfigError::InvalidStrategy,
            ConfigError::NonUnicodeStrategy,
        )?;

        let breakout_periods = parse_env(
            "BT_BREAKOUT_PERIODS",
            DEFAULT_BREAKOUT_PERIODS.to_vec(),
            parse_periods,
            ConfigError::InvalidBreakoutPeriods,
            ConfigError::NonUnicodeBreakoutPeriods,
        )?;

        let cash_fraction = match env::var("BT_CASH_FRACTION") {
            Ok(value) => {
                let parsed = value.trim().parse::<f64>().unwrap_or(f64::NAN);
                SizingConfig::new(parsed)
                    .map_err(ConfigError::InvalidCashFraction)?
                    .cash_fraction()
            }
            Err(env::VarError::NotPresent) => DEFAULT_CASH_FRACTION,
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeCashFraction);
            }
        };

        let output_dir = match env::var("BT_OUTPUT_DIR") {
            Ok(value) => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidOutputDir);
                }
                PathBuf::from(value)
            }
            Err(env::VarError::NotPresent) => PathBuf::from(DEFAULT_OUTPUT_DIR),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeOutputDir);
            }
        };

        let synthetic_seed = parse_env(
            "BT_SYNTHETIC_SEED",
            DEFAULT_SYNTHETIC_SEED,
            |value| value.parse::<u64>().ok(),
            ConfigError::InvalidSyntheticSeed,
            ConfigError::NonUnicodeSyntheticSeed,
        )?;

        let synthetic_steps = parse_env(
            "BT_SYNTHETIC_STEPS",
            DEFAULT_SYNTHETIC_STEPS,
            |value| value.parse::<usize>().ok().filter(|steps| *steps > 0),
            ConfigError::InvalidSyntheticSteps,
            ConfigError::NonUnicodeSyntheticSteps,
        )?;

        Ok(Self {
            data_path,
            cash,
            commission,
            strategy,
            breakout_periods,
            cash_fraction,
            output_dir,
            synthetic_seed,
            synthetic_steps,
        })
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig::new(self.cash, self.commission)
    }

    pub fn breakout_params(&self) -> Result<Vec<BreakoutParams>, StrategyError> {
        let sizing = SizingConfig::new(self.cash_fraction)?;
        self.breakout_periods
            .iter()
            .map(|&(buy, sell)| BreakoutParams::new(buy, sell, sizing))
            .collect()
    }
}

fn parse_env<T>(
    key: &str,
    default_value: T,
    parse: impl FnOnce(&str) -> Option<T>,
    invalid_error: ConfigError,
    non_unicode_error: ConfigError,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => parse(value.trim()).ok_or(invalid_error),
        Err(env::VarError::NotPresent) => Ok(default_value),
        Err(env::VarError::NotUnicode(_)) => Err(non_unicode_error),
    }
}

fn parse_non_negative(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite() && *parsed >= 0.0)
}

/// Parses `buy:sell[,buy:sell...]`.
fn parse_periods(value: &str) -> Option<Vec<(usize, usize)>> {
    let periods: Option<Vec<(usize, usize)>> = value
        .split(',')
        .map(|pair| {
            let (buy, sell) = pair.trim().split_once(':')?;
            let buy = buy.trim().parse::<usize>().ok().filter(|p| *p > 0)?;
            let sell = sell.trim().parse::<usize>().ok().filter(|p| *p > 0)?;
            Some((buy, sell))
        })
        .collect();
    periods.filter(|periods| !periods.is_empty())
}
