use std::fmt;

use tokio::task::{self, JoinHandle};

use crate::backtest::{Backtest, BacktestResult};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelRunError {
    RunPanicked { index: usize },
    RunCancelled { index: usize },
}

impl fmt::Display for ParallelRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunPanicked { index } => write!(f, "backtest run {index} panicked"),
            Self::RunCancelled { index } => write!(f, "backtest run {index} was cancelled"),
        }
    }
}

impl std::error::Error for ParallelRunError {}

/// Runs one backtest per parameter set on the blocking pool.
///
/// Every run owns its engine and a fresh strategy; only the record series
/// is shared. Results come back in the order of `params`. When a run fails,
/// the remaining runs are still awaited and the first failure by index is
/// returned.
pub async fn run_parallel<S>(
    backtest: &Backtest<S>,
    params: Vec<S::Params>,
) -> Result<Vec<BacktestResult>, ParallelRunError>
where
    S: Strategy + Default + 'static,
    S::Params: Send + 'static,
{
    tracing::debug!(runs = params.len(), "starting parallel backtests");

    let handles: Vec<JoinHandle<BacktestResult>> = params
        .into_iter()
        .map(|params| {
            let backtest = backtest.clone();
            task::spawn_blocking(move || backtest.run(params))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    let mut failure = None;
    for (index, handle) in handles.into_iter().enumerate() {
        let err = match handle.await {
            Ok(result) => {
                results.push(result);
                continue;
            }
            Err(err) if err.is_panic() => {
                tracing::error!(index, "parallel backtest run panicked");
                ParallelRunError::RunPanicked { index }
            }
            Err(_) => {
                tracing::warn!(index, "parallel backtest run was cancelled");
                ParallelRunError::RunCancelled { index }
            }
        };
        failure.get_or_insert(err);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
