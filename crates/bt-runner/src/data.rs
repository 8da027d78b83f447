use std::{fmt, io, path::Path};

use engine::{FieldKey, Step, StepRecord, StepSeries, Timestamp};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

#[derive(Debug)]
pub enum DataLoadError {
    Csv(csv::Error),
    MissingTimestampColumn,
    EmptyColumnName { column: usize },
    InvalidTimestamp { line: u64, value: String },
    InvalidValue { line: u64, column: String, value: String },
}

impl fmt::Display for DataLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(err) => write!(f, "failed to read record csv: {err}"),
            Self::MissingTimestampColumn => {
                write!(f, "record csv needs a timestamp column and at least one field")
            }
            Self::EmptyColumnName { column } => {
                write!(f, "column {column} has an empty field or instrument name")
            }
            Self::InvalidTimestamp { line, value } => {
                write!(
                    f,
                    "line {line}: `{value}` is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"
                )
            }
            Self::InvalidValue {
                line,
                column,
                value,
            } => write!(f, "line {line}: `{value}` in column `{column}` is not a number"),
        }
    }
}

impl std::error::Error for DataLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<csv::Error> for DataLoadError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Loads a record series from a CSV file.
///
/// The first column holds the step timestamp. Every other header is either a
/// field name (`Close`) or `INSTRUMENT:FIELD` (`AAA:Close`). Empty cells are
/// missing observations.
pub fn load_series(path: &Path) -> Result<StepSeries, DataLoadError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_series(file)
}

pub fn read_series<R: io::Read>(reader: R) -> Result<StepSeries, DataLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataLoadError::MissingTimestampColumn);
    }
    let columns: Vec<FieldKey> = headers
        .iter()
        .enumerate()
        .skip(1)
        .map(|(column, name)| parse_column(column, name))
        .collect::<Result<_, _>>()?;

    let mut steps = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .map_or(index as u64 + 2, |position| position.line());

        let raw_timestamp = row.get(0).unwrap_or_default();
        let timestamp =
            parse_timestamp(raw_timestamp).ok_or_else(|| DataLoadError::InvalidTimestamp {
                line,
                value: raw_timestamp.to_owned(),
            })?;

        let mut record = StepRecord::new();
        for (key, cell) in columns.iter().zip(row.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            let value = cell
                .parse::<f64>()
                .map_err(|_| DataLoadError::InvalidValue {
                    line,
                    column: column_label(key),
                    value: cell.to_owned(),
                })?;
            record.insert(key.clone(), value);
        }
        steps.push(Step::new(timestamp, record));
    }

    let mut instruments: Vec<String> = Vec::new();
    for key in &columns {
        if let FieldKey::Instrument { instrument, .. } = key {
            if !instruments.contains(instrument) {
                instruments.push(instrument.clone());
            }
        }
    }

    Ok(StepSeries::with_instruments(steps, instruments))
}

fn parse_column(column: usize, name: &str) -> Result<FieldKey, DataLoadError> {
    let key = match name.split_once(':') {
        Some((instrument, field)) => {
            let (instrument, field) = (instrument.trim(), field.trim());
            if instrument.is_empty() || field.is_empty() {
                return Err(DataLoadError::EmptyColumnName { column });
            }
            FieldKey::instrument(instrument, field)
        }
        None if name.is_empty() => return Err(DataLoadError::EmptyColumnName { column }),
        None => FieldKey::field(name),
    };
    Ok(key)
}

fn column_label(key: &FieldKey) -> String {
    match key {
        FieldKey::Field(name) => name.clone(),
        FieldKey::Instrument { instrument, field } => format!("{instrument}:{field}"),
    }
}

fn parse_timestamp(value: &str) -> Option<Timestamp> {
    if let Ok(timestamp) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(timestamp);
    }
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}
