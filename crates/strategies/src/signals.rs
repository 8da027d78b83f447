//! Channel breakout signals over a close column.
//!
//! A value of `None` or a non-finite close counts as missing. Any missing
//! value in the look-back window, or at the current step, yields `false`.

/// `true` at `i` when the close is strictly above every one of the previous
/// `period` closes.
pub fn up_breakout(closes: &[Option<f64>], period: usize) -> Vec<bool> {
    breakout(closes, period, |close, extreme| close > extreme, f64::max)
}

/// `true` at `i` when the close is strictly below every one of the previous
/// `period` closes.
pub fn down_breakout(closes: &[Option<f64>], period: usize) -> Vec<bool> {
    breakout(closes, period, |close, extreme| close < extreme, f64::min)
}

fn breakout(
    closes: &[Option<f64>],
    period: usize,
    crosses: impl Fn(f64, f64) -> bool,
    fold: fn(f64, f64) -> f64,
) -> Vec<bool> {
    (0..closes.len())
        .map(|index| {
            if period == 0 || index < period {
                return false;
            }
            let Some(close) = valid(closes[index]) else {
                return false;
            };
            let window: Option<Vec<f64>> = closes[index - period..index]
                .iter()
                .map(|value| valid(*value))
                .collect();
            match window {
                Some(window) => {
                    let extreme = window[1..].iter().copied().fold(window[0], fold);
                    crosses(close, extreme)
                }
                None => false,
            }
        })
        .collect()
}

fn valid(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite())
}
