//! Change notifications emitted by the bench.

/// What changed on the bench.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    /// An element was inserted at `index`.
    OpticsAdded { index: usize },
    /// `count` elements starting at `index` were removed.
    OpticsRemoved { index: usize, count: usize },
    /// Elements or beams from `start` to `end` (inclusive) changed.
    DataChanged { start: usize, end: usize },
    WavelengthChanged,
    TargetBeamChanged,
    BoundariesChanged,
    FitAdded { index: usize },
    FitsRemoved { index: usize, count: usize },
    FitDataChanged { index: usize },
    SphericityChanged,
    DimensionalityChanged,
    ModifiedChanged { modified: bool },
}

/// Receiver of bench notifications.
///
/// Events are delivered after the bench operation that caused them has
/// completed, in emission order. Listeners only see the event, so they
/// cannot re-enter the bench while it is being modified.
pub trait BenchListener {
    fn on_bench_event(&mut self, event: &BenchEvent);
}

impl<F> BenchListener for F
where
    F: FnMut(&BenchEvent),
{
    fn on_bench_event(&mut self, event: &BenchEvent) {
        self(event)
    }
}
