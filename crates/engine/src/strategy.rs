use crate::engine::Engine;
use crate::records::StepRecord;

/// User strategy driven by the backtest loop. Both hooks are required.
pub trait Strategy {
    /// Arguments forwarded unchanged from the driver to `init`.
    type Params;

    /// Called once, before the first step.
    fn init(&mut self, engine: &mut Engine<'_>, params: Self::Params);

    /// Called once per step, in order, before the step's mark-to-market.
    fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord);
}
