mod config;
mod data;

use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use engine::logging::{RunLogWriter, TracingRunLogWriter};
use engine::{
    run_parallel, synthetic_series, Backtest, BacktestResult, ReplayCsvWriter, RunSummary,
    StepSeries,
};
use serde::Serialize;
use strategies::{Breakout, BuyAndHold};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StrategyKind};

const SYNTHETIC_START_PRICE: f64 = 100.0;
const SYNTHETIC_MAX_STEP: f64 = 1.0;
const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Serialize)]
struct RunReport {
    label: String,
    strategy: &'static str,
    summary: RunSummary,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let config = Config::from_env()?;
    let reports = run(&config).await?;
    tracing::info!(
        runs = reports.len(),
        output_dir = %config.output_dir.display(),
        "backtests complete"
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bt_runner=info,engine=info,strategies=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
}

async fn run(config: &Config) -> Result<Vec<RunReport>, Box<dyn Error>> {
    let series = load_series(config)?;
    tracing::info!(
        steps = series.len(),
        instruments = series.instruments().len(),
        strategy = config.strategy.as_str(),
        "record series ready"
    );

    let runs: Vec<(String, BacktestResult)> = match config.strategy {
        StrategyKind::BuyAndHold => {
            let backtest = Backtest::<BuyAndHold>::new(series, config.backtest_config())?;
            vec![(StrategyKind::BuyAndHold.as_str().to_owned(), backtest.run(()))]
        }
        StrategyKind::Breakout => {
            let params = config.breakout_params()?;
            let backtest = Backtest::<Breakout>::new(series, config.backtest_config())?;
            let results = run_parallel(&backtest, params.clone()).await?;
            params
                .iter()
                .map(|params| format!("breakout-{}-{}", params.buy_period(), params.sell_period()))
                .zip(results)
                .collect()
        }
    };

    fs::create_dir_all(&config.output_dir)?;
    let mut log = TracingRunLogWriter;
    let mut reports = Vec::with_capacity(runs.len());
    for (label, result) in runs {
        write_csv_artifact(
            &config.output_dir.join(format!("{label}-equity.csv")),
            &mut log,
            |writer| writer.write_equity(&result.equity),
        )?;
        write_csv_artifact(
            &config.output_dir.join(format!("{label}-trades.csv")),
            &mut log,
            |writer| writer.write_trades(&result.trades),
        )?;

        let summary = RunSummary::from_result(config.cash, &result);
        tracing::info!(
            label = %label,
            final_equity = summary.final_equity,
            total_return_pct = summary.total_return_pct,
            max_drawdown_pct = summary.max_drawdown_pct,
            trades = summary.trade_count,
            "run finished"
        );
        reports.push(RunReport {
            label,
            strategy: config.strategy.as_str(),
            summary,
        });
    }

    let summary_file = BufWriter::new(File::create(config.output_dir.join(SUMMARY_FILE))?);
    serde_json::to_writer_pretty(summary_file, &reports)?;

    Ok(reports)
}

fn load_series(config: &Config) -> Result<StepSeries, data::DataLoadError> {
    match &config.data_path {
        Some(path) => data::load_series(path),
        None => {
            tracing::info!(
                seed = config.synthetic_seed,
                steps = config.synthetic_steps,
                "no BT_DATA_PATH set, using synthetic series"
            );
            Ok(synthetic_series(
                config.synthetic_seed,
                config.synthetic_steps,
                SYNTHETIC_START_PRICE,
                SYNTHETIC_MAX_STEP,
            ))
        }
    }
}

fn write_csv_artifact(
    path: &Path,
    log: &mut dyn RunLogWriter,
    write: impl FnOnce(&mut ReplayCsvWriter<BufWriter<File>>) -> io::Result<()>,
) -> io::Result<()> {
    let mut writer = ReplayCsvWriter::new(BufWriter::new(File::create(path)?));
    write(&mut writer)?;
    writer.finish_and_log(&path.display().to_string(), log)?;
    Ok(())
}
