pub mod backtest;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod parallel;
pub mod records;
pub mod replay;
pub mod strategy;
pub mod synthetic;

pub use backtest::{Backtest, BacktestConfig, BacktestError, BacktestResult};
pub use engine::{Engine, EquityPoint, OrderRejection, RunState};
pub use ledger::{Position, PositionId, Timestamp, Trade};
pub use metrics::RunSummary;
pub use parallel::{run_parallel, ParallelRunError};
pub use records::{FieldKey, Step, StepRecord, StepSeries, CLOSE_FIELD};
pub use replay::ReplayCsvWriter;
pub use strategy::Strategy;
pub use synthetic::{synthetic_series, PriceGenerator};

#[cfg(test)]
mod tests {
    use ledger::Timestamp;
    use time::macros::datetime;

    use crate::logging::{InMemoryRunLogWriter, RunLogEventKind};
    use crate::{
        Backtest, BacktestConfig, Engine, RunState, Step, StepRecord, StepSeries, Strategy,
        CLOSE_FIELD,
    };

    const DATES: [Timestamp; 3] = [
        datetime!(2023-10-18 0:00 UTC),
        datetime!(2023-10-19 0:00 UTC),
        datetime!(2023-10-20 0:00 UTC),
    ];

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn single_asset_series() -> StepSeries {
        [100.0, 200.0, 300.0]
            .into_iter()
            .zip(DATES)
            .map(|(price, date)| {
                Step::new(
                    date,
                    StepRecord::new()
                        .with_field("Open", price)
                        .with_field("High", price)
                        .with_field("Low", price)
                        .with_field(CLOSE_FIELD, price),
                )
            })
            .collect()
    }

    fn multiple_assets_series() -> StepSeries {
        let aaa = [(100.0, 100.0), (200.0, 200.0), (300.0, 300.0)];
        let bbb = [(2_850.0, 2_840.0), (2_835.0, 2_815.0), (2_820.0, 2_810.0)];

        DATES
            .into_iter()
            .zip(aaa.into_iter().zip(bbb))
            .map(|(date, ((aaa_open, aaa_close), (bbb_open, bbb_close)))| {
                Step::new(
                    date,
                    StepRecord::new()
                        .with_instrument_field("AAA", "Open", aaa_open)
                        .with_instrument_field("AAA", CLOSE_FIELD, aaa_close)
                        .with_instrument_field("BBB", "Open", bbb_open)
                        .with_instrument_field("BBB", CLOSE_FIELD, bbb_close),
                )
            })
            .collect()
    }

    #[derive(Default)]
    struct SingleAssetStrategy;

    impl Strategy for SingleAssetStrategy {
        type Params = ();

        fn init(&mut self, _engine: &mut Engine<'_>, _params: ()) {}

        fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord) {
            let open = record.field("Open").unwrap_or(f64::NAN);
            if index == 0 {
                assert!(engine.open(open, None, None));
            }
            if index == 2 {
                assert!(engine.close(open, None));
            }
        }
    }

    #[derive(Default)]
    struct MultipleAssetsStrategy;

    impl Strategy for MultipleAssetsStrategy {
        type Params = ();

        fn init(&mut self, _engine: &mut Engine<'_>, _params: ()) {}

        fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord) {
            let open = |instrument: &str| {
                record
                    .instrument_field(instrument, "Open")
                    .unwrap_or(f64::NAN)
            };
            if index == 0 {
                assert!(engine.open(open("AAA"), Some(10.0), Some("AAA")));
            }
            if index == 1 {
                assert!(engine.open(open("BBB"), Some(1.0), Some("BBB")));
            }
            if index == 2 {
                assert!(engine.close(open("AAA"), Some("AAA")));
            }
        }
    }

    #[test]
    fn single_asset_round_trip_matches_expected_ledger() {
        let backtest = Backtest::<SingleAssetStrategy>::new(
            single_asset_series(),
            BacktestConfig::new(10_000.0, 0.01),
        )
        .unwrap();

        let result = backtest.run(());

        let equity: Vec<f64> = result.equity.iter().map(|point| point.equity).collect();
        assert_eq!(equity.len(), 3);
        assert_close(equity[0], 9_900.990_099_009_901);
        assert_close(equity[1], 19_801.980_198_019_803);
        assert_close(equity[2], 29_405.940_594_059_408);
        let timestamps: Vec<Timestamp> =
            result.equity.iter().map(|point| point.timestamp).collect();
        assert_eq!(timestamps, DATES.to_vec());

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.instrument, None);
        assert_eq!(trade.open_date, Some(DATES[0]));
        assert_eq!(trade.close_date, Some(DATES[2]));
        assert_eq!(trade.open_price, 100.0);
        assert_eq!(trade.close_price, 300.0);
        assert_close(trade.position_size, 99.009_900_990_099_01);
        assert_close(trade.profit_loss, 19_801.980_198_019_803);
        assert_close(trade.change_pct, 200.0);
        assert_close(trade.trade_commission, 396.039_603_960_396_05);
        assert_close(trade.cumulative_return, 29_405.940_594_059_408);

        assert!(result.open_positions.is_empty());
    }

    #[test]
    fn multiple_assets_close_one_and_carry_the_other() {
        let backtest = Backtest::<MultipleAssetsStrategy>::new(
            multiple_assets_series(),
            BacktestConfig::new(10_000.0, 0.01),
        )
        .unwrap();

        let result = backtest.run(());

        let equity: Vec<f64> = result.equity.iter().map(|point| point.equity).collect();
        assert_eq!(equity.len(), 3);
        assert_close(equity[0], 9_990.0);
        assert_close(equity[1], 10_941.65);
        assert_close(equity[2], 11_906.65);

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.instrument.as_deref(), Some("AAA"));
        assert_eq!(trade.open_date, Some(DATES[0]));
        assert_eq!(trade.close_date, Some(DATES[2]));
        assert_eq!(trade.position_size, 10.0);
        assert_close(trade.profit_loss, 2_000.0);
        assert_close(trade.change_pct, 200.0);
        assert_close(trade.trade_commission, 40.0);
        assert_close(trade.cumulative_return, 11_960.0);

        assert_eq!(result.open_positions.len(), 1);
        let position = &result.open_positions[0];
        assert_eq!(position.instrument(), Some("BBB"));
        assert_eq!(position.open_date(), Some(DATES[1]));
        assert_eq!(position.last_date(), Some(DATES[2]));
        assert_eq!(position.open_price(), 2_835.0);
        assert_eq!(position.last_price(), 2_810.0);
        assert_eq!(position.position_size(), 1.0);
        assert_close(position.profit_loss(), -25.0);
        assert_close(position.change_pct(), -0.881_834_215_167_554);
        assert_close(position.current_value(), 2_810.0);
    }

    #[test]
    fn series_lists_instruments_for_multi_asset_data() {
        assert_eq!(multiple_assets_series().instruments(), &["AAA", "BBB"]);
        assert!(single_asset_series().instruments().is_empty());
    }

    #[test]
    fn decision_hook_runs_before_mark_and_equity_for_every_step() {
        let backtest = Backtest::<SingleAssetStrategy>::new(
            single_asset_series(),
            BacktestConfig::new(10_000.0, 0.01),
        )
        .unwrap();
        let mut log = InMemoryRunLogWriter::new();

        backtest.run_logged(SingleAssetStrategy, (), &mut log);

        use RunLogEventKind::*;
        assert_eq!(
            log.kinds(),
            vec![
                RunStarted,
                StepStarted,
                PositionOpened,
                DecisionApplied,
                EquityRecorded,
                StepStarted,
                DecisionApplied,
                EquityRecorded,
                StepStarted,
                PositionClosed,
                DecisionApplied,
                EquityRecorded,
                RunFinished,
            ]
        );
        assert_eq!(log.events()[2].step, Some(0));
        assert_eq!(log.events()[9].step, Some(2));
    }

    struct SeededInit;

    impl Strategy for SeededInit {
        type Params = (f64, &'static str);

        fn init(&mut self, engine: &mut Engine<'_>, (size, instrument): (f64, &'static str)) {
            assert_eq!(engine.state(), RunState::Running);
            assert_eq!(engine.step(), None);
            assert_eq!(engine.date(), None);
            assert!(engine.open(100.0, Some(size), Some(instrument)));
        }

        fn next(&mut self, engine: &mut Engine<'_>, index: usize, _record: &StepRecord) {
            assert_eq!(engine.state(), RunState::Running);
            assert_eq!(engine.step(), Some(index));
            assert_eq!(engine.date(), Some(DATES[index]));
        }
    }

    #[test]
    fn init_receives_params_and_may_trade_before_the_first_step() {
        let backtest =
            Backtest::<SeededInit>::new(single_asset_series(), BacktestConfig::new(10_000.0, 0.0))
                .unwrap();

        let result = backtest.run_with_strategy(SeededInit, (3.0, "XYZ"));

        let position = &result.open_positions[0];
        assert_eq!(position.position_size(), 3.0);
        assert_eq!(position.instrument(), Some("XYZ"));
        assert_eq!(position.open_date(), None);
        assert_eq!(position.last_date(), Some(DATES[2]));
        assert_eq!(position.last_price(), 300.0);
        assert_eq!(result.final_equity(), Some(9_700.0 + 900.0));
    }

    #[derive(Default)]
    struct CloseEveryHandle;

    impl Strategy for CloseEveryHandle {
        type Params = ();

        fn init(&mut self, engine: &mut Engine<'_>, _params: ()) {
            for _ in 0..3 {
                assert!(engine.open(50.0, Some(1.0), None));
            }
        }

        fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord) {
            if index != 1 {
                return;
            }
            let price = record.field(CLOSE_FIELD).unwrap_or(f64::NAN);
            let ids: Vec<_> = engine.open_positions().iter().map(|p| p.id()).collect();
            for id in ids {
                assert!(engine.close_position(id, price));
            }
        }
    }

    #[test]
    fn closing_by_handle_drains_the_open_set_in_open_order() {
        let backtest = Backtest::<CloseEveryHandle>::new(
            single_asset_series(),
            BacktestConfig::new(1_000.0, 0.0),
        )
        .unwrap();

        let result = backtest.run(());

        assert_eq!(result.trades.len(), 3);
        assert!(result.open_positions.is_empty());
        assert!(result
            .trades
            .iter()
            .all(|trade| trade.profit_loss == 150.0 && trade.close_date == Some(DATES[1])));
        assert_eq!(result.trades[2].cumulative_return, 1_450.0);
        assert_eq!(result.final_equity(), Some(1_450.0));
    }

    #[test]
    fn each_run_starts_from_fresh_state() {
        let backtest = Backtest::<SingleAssetStrategy>::new(
            single_asset_series(),
            BacktestConfig::new(10_000.0, 0.01),
        )
        .unwrap();

        let first = backtest.run(());
        let second = backtest.run(());

        assert_eq!(first, second);
    }
}
