use std::fmt;

use ledger::{materialize_trade, Position, PositionId, Timestamp, Trade};
use serde::Serialize;

use crate::backtest::{BacktestConfig, BacktestResult};
use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};
use crate::records::{StepRecord, StepSeries};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: Timestamp,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderRejection {
    InvalidPrice,
    InvalidSize,
    InsufficientCash { required: f64, available: f64 },
    UnknownPosition(PositionId),
}

impl fmt::Display for OrderRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrice => write!(f, "price must be a positive number"),
            Self::InvalidSize => write!(f, "position size must be a positive number"),
            Self::InsufficientCash {
                required,
                available,
            } => write!(f, "order needs {required} cash but only {available} is available"),
            Self::UnknownPosition(id) => write!(f, "position {} is not open", id.0),
        }
    }
}

impl std::error::Error for OrderRejection {}

/// Per-run trading context handed to the strategy hooks.
///
/// Owns cash, the open positions (in open order), the append-only trade log
/// and the equity series. An engine drives exactly one run: `run` consumes it.
pub struct Engine<'a> {
    series: &'a StepSeries,
    close_field: &'a str,
    log: &'a mut dyn RunLogWriter,
    state: RunState,
    step: Option<usize>,
    date: Option<Timestamp>,
    initial_cash: f64,
    cash: f64,
    commission: f64,
    open_positions: Vec<Position>,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
    cumulative_return: f64,
    open_value: f64,
    next_position_id: u64,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        series: &'a StepSeries,
        config: &'a BacktestConfig,
        log: &'a mut dyn RunLogWriter,
    ) -> Self {
        Self {
            series,
            close_field: config.close_field.as_str(),
            log,
            state: RunState::NotStarted,
            step: None,
            date: None,
            initial_cash: config.cash,
            cash: config.cash,
            commission: config.commission,
            open_positions: Vec::new(),
            trades: Vec::new(),
            equity: Vec::with_capacity(series.len()),
            cumulative_return: config.cash,
            open_value: 0.0,
            next_position_id: 0,
        }
    }

    /// Opens a long position and reports only whether it was accepted.
    pub fn open(&mut self, price: f64, size: Option<f64>, instrument: Option<&str>) -> bool {
        self.try_open(price, size, instrument).is_ok()
    }

    /// Opens a long position at `price`.
    ///
    /// Without a `size` the whole cash balance is committed, commission
    /// included, so cash lands on zero. A rejected order changes nothing.
    pub fn try_open(
        &mut self,
        price: f64,
        size: Option<f64>,
        instrument: Option<&str>,
    ) -> Result<PositionId, OrderRejection> {
        match self.resolve_open(price, size) {
            Ok((size, cost)) => Ok(self.book_open(price, size, cost, instrument)),
            Err(rejection) => {
                self.journal_rejection(instrument, rejection);
                Err(rejection)
            }
        }
    }

    /// Closes every open position on `instrument` (`None` matches positions
    /// without an instrument). Succeeds even when nothing matched.
    pub fn close(&mut self, price: f64, instrument: Option<&str>) -> bool {
        self.try_close(price, instrument).is_ok()
    }

    pub fn try_close(
        &mut self,
        price: f64,
        instrument: Option<&str>,
    ) -> Result<Vec<Trade>, OrderRejection> {
        if is_invalid_price(price) {
            self.journal_rejection(instrument, OrderRejection::InvalidPrice);
            return Err(OrderRejection::InvalidPrice);
        }

        let matching: Vec<PositionId> = self
            .open_positions
            .iter()
            .filter(|position| position.instrument() == instrument)
            .map(Position::id)
            .collect();

        let mut trades = Vec::with_capacity(matching.len());
        for id in matching {
            trades.push(self.try_close_position(id, price)?);
        }
        Ok(trades)
    }

    pub fn close_position(&mut self, id: PositionId, price: f64) -> bool {
        self.try_close_position(id, price).is_ok()
    }

    pub fn try_close_position(
        &mut self,
        id: PositionId,
        price: f64,
    ) -> Result<Trade, OrderRejection> {
        let index = match self.validate_close(id, price) {
            Ok(index) => index,
            Err(rejection) => {
                self.journal_rejection(None, rejection);
                return Err(rejection);
            }
        };

        let mut position = self.open_positions.remove(index);
        self.open_value -= position.current_value();
        position.update(self.date, price);

        let trade = materialize_trade(
            &position,
            self.date,
            price,
            self.commission,
            self.cumulative_return,
        );
        self.cumulative_return = trade.cumulative_return;
        self.trades.push(trade.clone());

        let close_cost = position.last_price() * position.position_size() * self.commission;
        self.cash += position.current_value() - close_cost;

        self.journal(
            RunLogEventKind::PositionClosed,
            position.instrument(),
            format!(
                "id={} price={price} size={} profit_loss={} commission={}",
                id.0,
                position.position_size(),
                trade.profit_loss,
                trade.trade_commission
            ),
        );
        Ok(trade)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Index of the step being simulated; `None` inside `init`.
    pub fn step(&self) -> Option<usize> {
        self.step
    }

    pub fn date(&self) -> Option<Timestamp> {
        self.date
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn cumulative_return(&self) -> f64 {
        self.cumulative_return
    }

    /// Mark-to-market value of the open positions as last tracked.
    pub fn open_value(&self) -> f64 {
        self.open_value
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open_positions
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.open_positions.iter().find(|position| position.id() == id)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity(&self) -> &[EquityPoint] {
        &self.equity
    }

    /// The full record series, e.g. for precomputing indicators in `init`.
    pub fn series(&self) -> &'a StepSeries {
        self.series
    }

    pub fn instruments(&self) -> &'a [String] {
        self.series.instruments()
    }

    /// Field positions are marked against each step.
    pub fn close_field(&self) -> &'a str {
        self.close_field
    }

    pub(crate) fn run<S: Strategy>(
        mut self,
        strategy: &mut S,
        params: S::Params,
    ) -> BacktestResult {
        self.state = RunState::Running;
        self.cumulative_return = self.cash;
        self.open_value = 0.0;
        self.journal(
            RunLogEventKind::RunStarted,
            None,
            format!("steps={} cash={}", self.series.len(), self.cash),
        );

        strategy.init(&mut self, params);

        let series = self.series;
        for (index, step) in series.steps().iter().enumerate() {
            self.step = Some(index);
            self.date = Some(step.timestamp);
            self.journal(RunLogEventKind::StepStarted, None, String::new());

            strategy.next(&mut self, index, &step.record);
            self.journal(RunLogEventKind::DecisionApplied, None, String::new());

            self.mark_to_market(step.timestamp, &step.record);
        }

        self.state = RunState::Finished;
        self.journal(
            RunLogEventKind::RunFinished,
            None,
            format!(
                "trades={} open_positions={}",
                self.trades.len(),
                self.open_positions.len()
            ),
        );

        BacktestResult {
            equity: self.equity,
            trades: self.trades,
            open_positions: self.open_positions,
        }
    }

    fn mark_to_market(&mut self, timestamp: Timestamp, record: &StepRecord) {
        let mut skipped = Vec::new();
        for position in &mut self.open_positions {
            match record.field_for(position.instrument(), self.close_field) {
                Some(price) if price > 0.0 => position.update(Some(timestamp), price),
                observed => skipped.push((
                    position.id(),
                    position.instrument().map(str::to_owned),
                    observed,
                )),
            }
        }
        for (id, instrument, observed) in skipped {
            let observed =
                observed.map_or_else(|| "missing".to_string(), |price| price.to_string());
            self.journal(
                RunLogEventKind::MarkSkipped,
                instrument.as_deref(),
                format!("id={} {}={observed}", id.0, self.close_field),
            );
        }

        self.open_value = self
            .open_positions
            .iter()
            .map(Position::current_value)
            .sum();
        let equity = self.cash + self.open_value;
        self.equity.push(EquityPoint { timestamp, equity });
        self.journal(
            RunLogEventKind::EquityRecorded,
            None,
            format!("equity={equity}"),
        );
    }

    fn resolve_open(&self, price: f64, size: Option<f64>) -> Result<(f64, f64), OrderRejection> {
        if is_invalid_price(price) {
            return Err(OrderRejection::InvalidPrice);
        }
        if size.is_some_and(is_invalid_size) {
            return Err(OrderRejection::InvalidSize);
        }

        let (size, cost) = match size {
            None => (self.cash / (price * (1.0 + self.commission)), self.cash),
            Some(size) => (size, size * price * (1.0 + self.commission)),
        };

        if is_invalid_size(size) {
            return Err(OrderRejection::InvalidSize);
        }
        if self.cash < cost {
            return Err(OrderRejection::InsufficientCash {
                required: cost,
                available: self.cash,
            });
        }

        Ok((size, cost))
    }

    fn book_open(
        &mut self,
        price: f64,
        size: f64,
        cost: f64,
        instrument: Option<&str>,
    ) -> PositionId {
        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;

        let mut position =
            Position::new(id, instrument.map(str::to_owned), self.date, price, size);
        position.update(self.date, price);

        self.open_value += position.current_value();
        self.cash -= cost;
        self.open_positions.push(position);

        self.journal(
            RunLogEventKind::PositionOpened,
            instrument,
            format!("id={} price={price} size={size} cost={cost}", id.0),
        );
        id
    }

    fn validate_close(&self, id: PositionId, price: f64) -> Result<usize, OrderRejection> {
        if is_invalid_price(price) {
            return Err(OrderRejection::InvalidPrice);
        }
        self.open_positions
            .iter()
            .position(|position| position.id() == id)
            .ok_or(OrderRejection::UnknownPosition(id))
    }

    fn journal_rejection(&mut self, instrument: Option<&str>, rejection: OrderRejection) {
        self.journal(
            RunLogEventKind::OrderRejected,
            instrument,
            rejection.to_string(),
        );
    }

    fn journal(&mut self, kind: RunLogEventKind, instrument: Option<&str>, detail: String) {
        self.log.write(
            RunLogEvent::new(self.step, kind)
                .with_instrument(instrument)
                .with_detail(detail),
        );
    }
}

fn is_invalid_price(price: f64) -> bool {
    price.is_nan() || price <= 0.0
}

fn is_invalid_size(size: f64) -> bool {
    size.is_nan() || size <= 0.0
}
