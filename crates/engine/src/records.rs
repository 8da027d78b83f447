use std::collections::HashMap;

use ledger::Timestamp;

pub const CLOSE_FIELD: &str = "Close";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Unkeyed field, shared by every instrument of a single-instrument run.
    Field(String),
    Instrument { instrument: String, field: String },
}

impl FieldKey {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn instrument(instrument: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Instrument {
            instrument: instrument.into(),
            field: field.into(),
        }
    }
}

/// Numeric observations for one step, keyed by field or (instrument, field).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StepRecord {
    values: HashMap<FieldKey, f64>,
}

impl StepRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.insert(FieldKey::field(name), value);
        self
    }

    pub fn with_instrument_field(mut self, instrument: &str, field: &str, value: f64) -> Self {
        self.insert(FieldKey::instrument(instrument, field), value);
        self
    }

    pub fn insert(&mut self, key: FieldKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &FieldKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.get(&FieldKey::field(name))
    }

    pub fn instrument_field(&self, instrument: &str, field: &str) -> Option<f64> {
        self.get(&FieldKey::instrument(instrument, field))
    }

    /// Keyed value for `instrument` when present, otherwise the unkeyed field.
    pub fn field_for(&self, instrument: Option<&str>, field: &str) -> Option<f64> {
        instrument
            .and_then(|instrument| self.instrument_field(instrument, field))
            .or_else(|| self.field(field))
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub timestamp: Timestamp,
    pub record: StepRecord,
}

impl Step {
    pub fn new(timestamp: Timestamp, record: StepRecord) -> Self {
        Self { timestamp, record }
    }
}

/// Ordered historical record source consumed by the engine.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StepSeries {
    steps: Vec<Step>,
    instruments: Vec<String>,
}

impl StepSeries {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_instruments(steps, Vec::new())
    }

    /// Builds a series whose instruments lead with `order`.
    ///
    /// Instruments found in the steps but absent from `order` follow in
    /// first-seen order, sorted within a step.
    pub fn with_instruments(steps: Vec<Step>, order: Vec<String>) -> Self {
        let mut instruments: Vec<String> = Vec::with_capacity(order.len());
        for instrument in order {
            if !instruments.contains(&instrument) {
                instruments.push(instrument);
            }
        }

        for step in &steps {
            let mut keyed: Vec<&String> = step
                .record
                .keys()
                .filter_map(|key| match key {
                    FieldKey::Instrument { instrument, .. } => Some(instrument),
                    FieldKey::Field(_) => None,
                })
                .collect();
            // HashMap order is arbitrary; keep discovery within a step stable.
            keyed.sort();
            for instrument in keyed {
                if !instruments.contains(instrument) {
                    instruments.push(instrument.clone());
                }
            }
        }

        Self { steps, instruments }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.steps.iter().map(|step| step.timestamp)
    }

    /// Instruments named by keyed fields, in order of first appearance.
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    /// One value per step for `field`; `None` where the step has no observation.
    pub fn column(&self, instrument: Option<&str>, field: &str) -> Vec<Option<f64>> {
        self.steps
            .iter()
            .map(|step| step.record.field_for(instrument, field))
            .collect()
    }

    /// Index of the first step whose timestamp precedes the one before it.
    pub fn first_unordered_index(&self) -> Option<usize> {
        self.steps
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
            .map(|index| index + 1)
    }
}

impl FromIterator<Step> for StepSeries {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
