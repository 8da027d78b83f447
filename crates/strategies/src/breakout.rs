use engine::{Engine, StepRecord, Strategy};

use crate::signals::{down_breakout, up_breakout};
use crate::sizing::{size_for_price, SizingConfig};
use crate::StrategyError;

const OPEN_FIELD: &str = "Open";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutParams {
    buy_period: usize,
    sell_period: usize,
    sizing: SizingConfig,
}

impl BreakoutParams {
    pub fn new(
        buy_period: usize,
        sell_period: usize,
        sizing: SizingConfig,
    ) -> Result<Self, StrategyError> {
        for period in [buy_period, sell_period] {
            if period == 0 {
                return Err(StrategyError::InvalidPeriod(period));
            }
        }

        Ok(Self {
            buy_period,
            sell_period,
            sizing,
        })
    }

    pub fn buy_period(&self) -> usize {
        self.buy_period
    }

    pub fn sell_period(&self) -> usize {
        self.sell_period
    }

    pub fn sizing(&self) -> SizingConfig {
        self.sizing
    }
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            buy_period: 20,
            sell_period: 10,
            sizing: SizingConfig::default(),
        }
    }
}

#[derive(Debug)]
struct InstrumentSignals {
    instrument: Option<String>,
    buy: Vec<bool>,
    sell: Vec<bool>,
}

/// Channel breakout: buys when the close clears the `buy_period` high,
/// sells when it drops through the `sell_period` low.
///
/// Signals come from closes up to `i - 1` and are acted on at the `Open` of
/// step `i`, so a step never trades on its own close.
#[derive(Debug, Default)]
pub struct Breakout {
    params: BreakoutParams,
    signals: Vec<InstrumentSignals>,
}

impl Strategy for Breakout {
    type Params = BreakoutParams;

    fn init(&mut self, engine: &mut Engine<'_>, params: BreakoutParams) {
        let series = engine.series();
        let close_field = engine.close_field();
        let instruments: Vec<Option<String>> = if engine.instruments().is_empty() {
            vec![None]
        } else {
            engine.instruments().iter().cloned().map(Some).collect()
        };

        self.signals = instruments
            .into_iter()
            .map(|instrument| {
                let closes = series.column(instrument.as_deref(), close_field);
                InstrumentSignals {
                    buy: up_breakout(&closes, params.buy_period),
                    sell: down_breakout(&closes, params.sell_period),
                    instrument,
                }
            })
            .collect();
        self.params = params;
    }

    fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord) {
        let Some(previous) = index.checked_sub(1) else {
            return;
        };

        for signals in &self.signals {
            let instrument = signals.instrument.as_deref();
            let Some(price) = record.field_for(instrument, OPEN_FIELD) else {
                continue;
            };
            let holding = engine
                .open_positions()
                .iter()
                .any(|position| position.instrument() == instrument);

            if holding && signals.sell[previous] {
                engine.close(price, instrument);
            } else if !holding && signals.buy[previous] {
                let size = if self.params.sizing.uses_all_cash() {
                    None
                } else {
                    match size_for_price(engine.cash(), price, engine.commission(), self.params.sizing)
                    {
                        Ok(size) => Some(size),
                        Err(err) => {
                            tracing::debug!(?instrument, %err, "breakout entry skipped");
                            continue;
                        }
                    }
                };
                engine.open(price, size, instrument);
            }
        }
    }
}
