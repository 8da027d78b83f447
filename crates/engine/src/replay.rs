use std::io::{self, Write};

use csv::Writer as CsvWriter;
use ledger::{Timestamp, Trade};
use time::format_description::well_known::Rfc3339;

use crate::engine::EquityPoint;
use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};

pub const EQUITY_CSV_HEADER: &str = "timestamp,equity\n";
pub const TRADES_CSV_HEADER: &str = "instrument,open_date,close_date,open_price,close_price,\
position_size,profit_loss,change_pct,trade_commission,cumulative_return\n";

const EQUITY_COLUMNS: [&str; 2] = ["timestamp", "equity"];
const TRADE_COLUMNS: [&str; 10] = [
    "instrument",
    "open_date",
    "close_date",
    "open_price",
    "close_price",
    "position_size",
    "profit_loss",
    "change_pct",
    "trade_commission",
    "cumulative_return",
];

/// Writes run results as CSV artifacts.
pub struct ReplayCsvWriter<W: Write> {
    writer: CsvWriter<W>,
}

impl<W: Write> ReplayCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: CsvWriter::from_writer(writer),
        }
    }

    pub fn write_equity(&mut self, equity: &[EquityPoint]) -> io::Result<()> {
        self.writer.write_record(EQUITY_COLUMNS)?;
        for point in equity {
            self.writer.write_record([
                format_timestamp(point.timestamp)?,
                point.equity.to_string(),
            ])?;
        }
        Ok(())
    }

    pub fn write_trades(&mut self, trades: &[Trade]) -> io::Result<()> {
        self.writer.write_record(TRADE_COLUMNS)?;
        for trade in trades {
            self.writer.write_record([
                trade.instrument.clone().unwrap_or_default(),
                format_optional_timestamp(trade.open_date)?,
                format_optional_timestamp(trade.close_date)?,
                trade.open_price.to_string(),
                trade.close_price.to_string(),
                trade.position_size.to_string(),
                trade.profit_loss.to_string(),
                trade.change_pct.to_string(),
                trade.trade_commission.to_string(),
                trade.cumulative_return.to_string(),
            ])?;
        }
        Ok(())
    }

    /// Flushes the sink, then records `artifact` in the run journal.
    pub fn finish_and_log(
        mut self,
        artifact: &str,
        run_log_writer: &mut dyn RunLogWriter,
    ) -> io::Result<W> {
        self.writer.flush()?;
        run_log_writer.write(
            RunLogEvent::new(None, RunLogEventKind::ArtifactWritten).with_detail(artifact),
        );
        self.into_inner()
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

fn format_timestamp(timestamp: Timestamp) -> io::Result<String> {
    timestamp.format(&Rfc3339).map_err(io::Error::other)
}

fn format_optional_timestamp(timestamp: Option<Timestamp>) -> io::Result<String> {
    timestamp.map_or_else(|| Ok(String::new()), format_timestamp)
}
