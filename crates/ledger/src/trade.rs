use serde::Serialize;

use crate::{Position, Timestamp};

/// A completed round trip. Built once at close time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub instrument: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub open_date: Option<Timestamp>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub close_date: Option<Timestamp>,
    pub open_price: f64,
    pub close_price: f64,
    pub position_size: f64,
    pub profit_loss: f64,
    pub change_pct: f64,
    pub trade_commission: f64,
    pub cumulative_return: f64,
}

/// Commission charged over both legs of a round trip.
pub fn round_trip_commission(
    open_price: f64,
    close_price: f64,
    position_size: f64,
    commission_rate: f64,
) -> f64 {
    (open_price + close_price) * position_size * commission_rate
}

/// Snapshots `position` as marked at (`close_date`, `close_price`) into a
/// [`Trade`]. `trade.cumulative_return` is `cumulative_return` plus the net
/// realized result; applying it and removing the position is up to the caller.
pub fn materialize_trade(
    position: &Position,
    close_date: Option<Timestamp>,
    close_price: f64,
    commission_rate: f64,
    cumulative_return: f64,
) -> Trade {
    let mut closing = position.clone();
    closing.update(close_date, close_price);

    let trade_commission = round_trip_commission(
        closing.open_price(),
        closing.last_price(),
        closing.position_size(),
        commission_rate,
    );

    Trade {
        instrument: closing.instrument().map(str::to_owned),
        open_date: closing.open_date(),
        close_date: closing.last_date(),
        open_price: closing.open_price(),
        close_price: closing.last_price(),
        position_size: closing.position_size(),
        profit_loss: closing.profit_loss(),
        change_pct: closing.change_pct(),
        trade_commission,
        cumulative_return: cumulative_return + closing.profit_loss() - trade_commission,
    }
}
