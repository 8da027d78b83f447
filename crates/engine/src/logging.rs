#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLogEventKind {
    RunStarted,
    StepStarted,
    DecisionApplied,
    PositionOpened,
    PositionClosed,
    OrderRejected,
    MarkSkipped,
    EquityRecorded,
    RunFinished,
    ArtifactWritten,
}

impl RunLogEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run_started",
            Self::StepStarted => "step_started",
            Self::DecisionApplied => "decision_applied",
            Self::PositionOpened => "position_opened",
            Self::PositionClosed => "position_closed",
            Self::OrderRejected => "order_rejected",
            Self::MarkSkipped => "mark_skipped",
            Self::EquityRecorded => "equity_recorded",
            Self::RunFinished => "run_finished",
            Self::ArtifactWritten => "artifact_written",
        }
    }
}

/// One entry of the run journal. `step` is `None` for events raised before
/// the first step, i.e. from the strategy's `init` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogEvent {
    pub step: Option<usize>,
    pub kind: RunLogEventKind,
    pub instrument: Option<String>,
    pub detail: String,
}

impl RunLogEvent {
    pub fn new(step: Option<usize>, kind: RunLogEventKind) -> Self {
        Self {
            step,
            kind,
            instrument: None,
            detail: String::new(),
        }
    }

    pub fn with_instrument(mut self, instrument: Option<&str>) -> Self {
        self.instrument = instrument.map(str::to_owned);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

pub trait RunLogWriter {
    fn write(&mut self, event: RunLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemoryRunLogWriter {
    events: Vec<RunLogEvent>,
}

impl InMemoryRunLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RunLogEvent] {
        &self.events
    }

    pub fn kinds(&self) -> Vec<RunLogEventKind> {
        self.events.iter().map(|event| event.kind).collect()
    }

    pub fn count(&self, kind: RunLogEventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }
}

impl RunLogWriter for InMemoryRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        self.events.push(event);
    }
}

/// Forwards journal events to `tracing`. Per-step bookkeeping goes to
/// `trace`, order activity to `debug`, stale marks to `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLogWriter;

impl RunLogWriter for TracingRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        let kind = event.kind.as_str();
        let instrument = event.instrument.as_deref().unwrap_or("-");
        match event.kind {
            RunLogEventKind::StepStarted
            | RunLogEventKind::DecisionApplied
            | RunLogEventKind::EquityRecorded => {
                tracing::trace!(
                    step = ?event.step,
                    kind,
                    instrument,
                    detail = %event.detail,
                    "run journal"
                );
            }
            RunLogEventKind::MarkSkipped => {
                tracing::warn!(
                    step = ?event.step,
                    kind,
                    instrument,
                    detail = %event.detail,
                    "run journal"
                );
            }
            RunLogEventKind::RunStarted
            | RunLogEventKind::RunFinished
            | RunLogEventKind::PositionOpened
            | RunLogEventKind::PositionClosed
            | RunLogEventKind::OrderRejected
            | RunLogEventKind::ArtifactWritten => {
                tracing::debug!(
                    step = ?event.step,
                    kind,
                    instrument,
                    detail = %event.detail,
                    "run journal"
                );
            }
        }
    }
}
