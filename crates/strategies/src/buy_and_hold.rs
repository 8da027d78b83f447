use engine::{Engine, StepRecord, Strategy};

use crate::sizing::{size_for_price, SizingConfig};

const OPEN_FIELD: &str = "Open";

/// Enters every instrument once, at its first usable price, and never sells.
///
/// The entry price is the step's `Open`, falling back to the engine's close field.
///
/// Cash is split evenly between the instruments not yet entered; the last
/// one takes whatever cash remains.
#[derive(Debug, Default)]
pub struct BuyAndHold {
    entered: Vec<bool>,
}

impl Strategy for BuyAndHold {
    type Params = ();

    fn init(&mut self, engine: &mut Engine<'_>, _params: ()) {
        self.entered = vec![false; engine.instruments().len().max(1)];
    }

    fn next(&mut self, engine: &mut Engine<'_>, _index: usize, record: &StepRecord) {
        let instruments = engine.instruments();
        let close_field = engine.close_field();
        for slot in 0..self.entered.len() {
            if self.entered[slot] {
                continue;
            }
            let instrument = instruments.get(slot).map(String::as_str);
            let Some(price) = entry_price(record, instrument, close_field) else {
                continue;
            };

            let remaining = self.entered.iter().filter(|entered| !**entered).count();
            let size = if remaining == 1 {
                None
            } else {
                let share = SizingConfig::new(1.0 / remaining as f64);
                match share.and_then(|share| {
                    size_for_price(engine.cash(), price, engine.commission(), share)
                }) {
                    Ok(size) => Some(size),
                    Err(err) => {
                        tracing::debug!(?instrument, %err, "buy-and-hold entry skipped");
                        continue;
                    }
                }
            };

            self.entered[slot] = engine.open(price, size, instrument);
        }
    }
}

fn entry_price(record: &StepRecord, instrument: Option<&str>, close_field: &str) -> Option<f64> {
    [OPEN_FIELD, close_field]
        .into_iter()
        .filter_map(|field| record.field_for(instrument, field))
        .find(|price| price.is_finite() && *price > 0.0)
}

#[cfg(test)]
mod tests {
    use engine::{Backtest, BacktestConfig, Step, StepRecord, StepSeries, CLOSE_FIELD};
    use time::macros::datetime;

    use super::BuyAndHold;

    #[test]
    fn falls_back_to_close_when_open_is_missing() {
        let series = StepSeries::new(vec![
            Step::new(
                datetime!(2024-01-01 0:00 UTC),
                StepRecord::new().with_field(CLOSE_FIELD, 100.0),
            ),
            Step::new(
                datetime!(2024-01-02 0:00 UTC),
                StepRecord::new()
                    .with_field("Open", 110.0)
                    .with_field(CLOSE_FIELD, 120.0),
            ),
        ]);
        let backtest =
            Backtest::<BuyAndHold>::new(series, BacktestConfig::new(1_000.0, 0.0)).unwrap();

        let result = backtest.run(());

        assert!(result.trades.is_empty());
        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.open_positions[0].open_price(), 100.0);
        assert_eq!(result.open_positions[0].position_size(), 10.0);
        let equity: Vec<f64> = result.equity.iter().map(|point| point.equity).collect();
        assert_eq!(equity, vec![1_000.0, 1_200.0]);
    }

    #[test]
    fn falls_back_to_the_configured_close_field() {
        let series = StepSeries::new(vec![
            Step::new(
                datetime!(2024-01-01 0:00 UTC),
                StepRecord::new()
                    .with_field(CLOSE_FIELD, 40.0)
                    .with_field("Adj", 50.0),
            ),
            Step::new(
                datetime!(2024-01-02 0:00 UTC),
                StepRecord::new().with_field("Adj", 60.0),
            ),
        ]);
        let config = BacktestConfig::new(1_000.0, 0.0).with_close_field("Adj");
        let backtest = Backtest::<BuyAndHold>::new(series, config).unwrap();

        let result = backtest.run(());

        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.open_positions[0].open_price(), 50.0);
        assert_eq!(result.open_positions[0].position_size(), 20.0);
        assert_eq!(result.final_equity(), Some(1_200.0));
    }

    #[test]
    fn splits_cash_across_instruments_as_they_become_tradable() {
        let series = StepSeries::new(vec![
            Step::new(
                datetime!(2024-01-01 0:00 UTC),
                StepRecord::new()
                    .with_instrument_field("AAA", "Open", 10.0)
                    .with_instrument_field("AAA", CLOSE_FIELD, 10.0),
            ),
            Step::new(
                datetime!(2024-01-02 0:00 UTC),
                StepRecord::new()
                    .with_instrument_field("AAA", "Open", 10.0)
                    .with_instrument_field("AAA", CLOSE_FIELD, 10.0)
                    .with_instrument_field("BBB", "Open", 20.0)
                    .with_instrument_field("BBB", CLOSE_FIELD, 20.0),
            ),
        ]);
        let backtest =
            Backtest::<BuyAndHold>::new(series, BacktestConfig::new(1_000.0, 0.0)).unwrap();

        let result = backtest.run(());

        let holdings: Vec<(Option<&str>, f64)> = result
            .open_positions
            .iter()
            .map(|position| (position.instrument(), position.position_size()))
            .collect();
        assert_eq!(holdings, vec![(Some("AAA"), 50.0), (Some("BBB"), 25.0)]);
        assert_eq!(result.final_equity(), Some(1_000.0));
    }

    #[test]
    fn never_enters_without_a_usable_price() {
        let series = StepSeries::new(vec![Step::new(
            datetime!(2024-01-01 0:00 UTC),
            StepRecord::new()
                .with_field("Open", 0.0)
                .with_field(CLOSE_FIELD, f64::NAN),
        )]);
        let backtest =
            Backtest::<BuyAndHold>::new(series, BacktestConfig::new(1_000.0, 0.0)).unwrap();

        let result = backtest.run(());

        assert!(result.open_positions.is_empty());
        assert_eq!(result.final_equity(), Some(1_000.0));
    }
}
