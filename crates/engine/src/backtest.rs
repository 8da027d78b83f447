use std::{fmt, marker::PhantomData, sync::Arc};

use ledger::{Position, Trade};
use serde::Serialize;

use crate::engine::{Engine, EquityPoint};
use crate::logging::{RunLogWriter, TracingRunLogWriter};
use crate::records::{StepSeries, CLOSE_FIELD};
use crate::strategy::Strategy;

const DEFAULT_CASH: f64 = 10_000.0;
const DEFAULT_COMMISSION: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub cash: f64,
    /// Fraction of notional charged on each leg, e.g. `0.001` for 0.1%.
    pub commission: f64,
    /// Field used to mark open positions at the end of every step.
    pub close_field: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            cash: DEFAULT_CASH,
            commission: DEFAULT_COMMISSION,
            close_field: CLOSE_FIELD.to_owned(),
        }
    }
}

impl BacktestConfig {
    pub fn new(cash: f64, commission: f64) -> Self {
        Self {
            cash,
            commission,
            ..Self::default()
        }
    }

    pub fn with_close_field(mut self, close_field: impl Into<String>) -> Self {
        self.close_field = close_field.into();
        self
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.cash.is_finite() || self.cash < 0.0 {
            return Err(BacktestError::InvalidCash(self.cash));
        }
        if !self.commission.is_finite() || self.commission < 0.0 {
            return Err(BacktestError::InvalidCommission(self.commission));
        }
        if self.close_field.trim().is_empty() {
            return Err(BacktestError::EmptyCloseField);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BacktestError {
    InvalidCash(f64),
    InvalidCommission(f64),
    EmptyCloseField,
    UnorderedTimestamps { index: usize },
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCash(cash) => {
                write!(f, "cash must be a finite, non-negative amount, got {cash}")
            }
            Self::InvalidCommission(rate) => {
                write!(f, "commission must be a finite, non-negative rate, got {rate}")
            }
            Self::EmptyCloseField => write!(f, "close field must not be empty"),
            Self::UnorderedTimestamps { index } => {
                write!(f, "step {index} is timestamped before the step preceding it")
            }
        }
    }
}

impl std::error::Error for BacktestError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    /// One point per step, aligned with the series timestamps.
    pub equity: Vec<EquityPoint>,
    /// Closed trades in close order.
    pub trades: Vec<Trade>,
    /// Positions still open after the last step, in open order.
    pub open_positions: Vec<Position>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity.last().map(|point| point.equity)
    }
}

/// Driver binding a strategy type to a record series and run settings.
///
/// Every run gets a fresh strategy and a fresh engine, so one `Backtest`
/// can be run any number of times.
pub struct Backtest<S> {
    series: Arc<StepSeries>,
    config: BacktestConfig,
    _strategy: PhantomData<fn() -> S>,
}

impl<S> Clone for Backtest<S> {
    fn clone(&self) -> Self {
        Self {
            series: Arc::clone(&self.series),
            config: self.config.clone(),
            _strategy: PhantomData,
        }
    }
}

impl<S: Strategy> Backtest<S> {
    pub fn new(
        series: impl Into<Arc<StepSeries>>,
        config: BacktestConfig,
    ) -> Result<Self, BacktestError> {
        config.validate()?;
        let series = series.into();
        if let Some(index) = series.first_unordered_index() {
            return Err(BacktestError::UnorderedTimestamps { index });
        }

        Ok(Self {
            series,
            config,
            _strategy: PhantomData,
        })
    }

    pub fn series(&self) -> &Arc<StepSeries> {
        &self.series
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(&self, params: S::Params) -> BacktestResult
    where
        S: Default,
    {
        self.run_with_strategy(S::default(), params)
    }

    pub fn run_with_strategy(&self, strategy: S, params: S::Params) -> BacktestResult {
        self.run_logged(strategy, params, &mut TracingRunLogWriter)
    }

    pub fn run_logged(
        &self,
        mut strategy: S,
        params: S::Params,
        log: &mut dyn RunLogWriter,
    ) -> BacktestResult {
        let span = tracing::info_span!(
            "backtest",
            steps = self.series.len(),
            cash = self.config.cash,
            commission = self.config.commission
        );
        let _entered = span.enter();

        let engine = Engine::new(&self.series, &self.config, log);
        let result = engine.run(&mut strategy, params);

        tracing::debug!(
            trades = result.trades.len(),
            open_positions = result.open_positions.len(),
            final_equity = ?result.final_equity(),
            "backtest finished"
        );
        result
    }
}
