use time::{macros::datetime, Duration};

use crate::records::{Step, StepRecord, StepSeries, CLOSE_FIELD};

const SERIES_START: ledger::Timestamp = datetime!(2024-01-01 0:00 UTC);
const TICKS_PER_STEP: usize = 4;
const MIN_PRICE: f64 = 0.01;

/// Seeded random walk. The same seed always yields the same path.
#[derive(Debug, Clone)]
pub struct PriceGenerator {
    state: u64,
    price: f64,
    max_step: f64,
}

impl PriceGenerator {
    pub fn new(seed: u64, start_price: f64, max_step: f64) -> Self {
        assert!(
            start_price.is_finite() && start_price > 0.0,
            "start_price must be finite and positive"
        );
        assert!(
            max_step.is_finite() && max_step >= 0.0,
            "max_step must be finite and non-negative"
        );

        Self {
            state: seed,
            price: start_price,
            max_step,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn next_price(&mut self) -> f64 {
        let unit = next_unit(&mut self.state);
        let delta = (unit * 2.0 - 1.0) * self.max_step;
        self.price = (self.price + delta).max(MIN_PRICE);
        self.price
    }
}

/// Daily single-instrument OHLC series starting 2024-01-01 UTC.
///
/// Each step opens at the previous close and walks a few ticks; the high
/// and low bound every tick of the step.
pub fn synthetic_series(seed: u64, steps: usize, start_price: f64, max_step: f64) -> StepSeries {
    let mut generator = PriceGenerator::new(seed, start_price, max_step);

    (0..steps)
        .map(|index| {
            let open = generator.price();
            let (mut high, mut low, mut close) = (open, open, open);
            for _ in 0..TICKS_PER_STEP {
                close = generator.next_price();
                high = high.max(close);
                low = low.min(close);
            }

            Step::new(
                SERIES_START + Duration::days(index as i64),
                StepRecord::new()
                    .with_field("Open", open)
                    .with_field("High", high)
                    .with_field("Low", low)
                    .with_field(CLOSE_FIELD, close),
            )
        })
        .collect()
}

fn next_u64(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn next_unit(state: &mut u64) -> f64 {
    let value = next_u64(state);
    (value as f64) / (u64::MAX as f64)
}
