use serde::Serialize;

use crate::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

/// An open long exposure to one instrument.
///
/// The derived fields (`profit_loss`, `change_pct`, `current_value` and the
/// last mark) only change through [`Position::update`], so they always agree
/// with the open price and size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    id: PositionId,
    instrument: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    open_date: Option<Timestamp>,
    #[serde(with = "time::serde::rfc3339::option")]
    last_date: Option<Timestamp>,
    open_price: f64,
    last_price: f64,
    position_size: f64,
    profit_loss: f64,
    change_pct: f64,
    current_value: f64,
}

impl Position {
    /// Unmarked position; derived fields stay NaN until the first `update`.
    pub fn new(
        id: PositionId,
        instrument: Option<String>,
        open_date: Option<Timestamp>,
        open_price: f64,
        position_size: f64,
    ) -> Self {
        Self {
            id,
            instrument,
            open_date,
            last_date: None,
            open_price,
            last_price: f64::NAN,
            position_size,
            profit_loss: f64::NAN,
            change_pct: f64::NAN,
            current_value: f64::NAN,
        }
    }

    /// Marks the position at `last_price`. The caller guarantees a positive
    /// price; a zero or NaN open price propagates NaN into the derived fields.
    pub fn update(&mut self, last_date: Option<Timestamp>, last_price: f64) {
        self.last_date = last_date;
        self.last_price = last_price;
        self.profit_loss = (self.last_price - self.open_price) * self.position_size;
        self.change_pct = (self.last_price / self.open_price - 1.0) * 100.0;
        self.current_value = self.open_price * self.position_size + self.profit_loss;
    }

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn open_date(&self) -> Option<Timestamp> {
        self.open_date
    }

    pub fn last_date(&self) -> Option<Timestamp> {
        self.last_date
    }

    pub fn open_price(&self) -> f64 {
        self.open_price
    }

    pub fn last_price(&self) -> f64 {
        self.last_price
    }

    pub fn position_size(&self) -> f64 {
        self.position_size
    }

    pub fn profit_loss(&self) -> f64 {
        self.profit_loss
    }

    pub fn change_pct(&self) -> f64 {
        self.change_pct
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }
}
