mod position;
mod trade;

pub use position::{Position, PositionId};
pub use trade::{materialize_trade, round_trip_commission, Trade};

/// Simulated clock value attached to positions, trades and equity points.
pub type Timestamp = time::OffsetDateTime;
