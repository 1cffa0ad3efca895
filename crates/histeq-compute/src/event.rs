/// Time unit used to report profiling information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfilingResolution {
    /// nanoseconds
    Ns,
    /// microseconds
    #[default]
    Us,
    /// milliseconds
    Ms,
    /// seconds
    S,
}

impl ProfilingResolution {
    fn divisor(self) -> f64 {
        match self {
            ProfilingResolution::Ns => 1.0,
            ProfilingResolution::Us => 1e3,
            ProfilingResolution::Ms => 1e6,
            ProfilingResolution::S => 1e9,
        }
    }

    /// The unit suffix, e.g. `us`.
    pub fn suffix(self) -> &'static str {
        match self {
            ProfilingResolution::Ns => "ns",
            ProfilingResolution::Us => "us",
            ProfilingResolution::Ms => "ms",
            ProfilingResolution::S => "s",
        }
    }

    /// Convert a nanosecond count to this resolution.
    pub fn convert(self, ns: u64) -> f64 {
        ns as f64 / self.divisor()
    }
}

/// Profiling record of one dispatched kernel.
///
/// Timestamps are nanoseconds since the backend was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// name of the dispatched kernel
    pub kernel: String,
    /// number of work-items dispatched
    pub global_size: usize,
    /// when the command entered the queue
    pub queued: u64,
    /// when the command was submitted to the device
    pub submitted: u64,
    /// when the device started executing
    pub start: u64,
    /// when the device finished executing
    pub end: u64,
}

impl Event {
    /// Execution time on the device, in nanoseconds.
    pub fn duration_ns(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Time from entering the queue to finishing, in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.end.saturating_sub(self.queued)
    }

    /// Full profiling breakdown of the event at the given resolution.
    ///
    /// # Example
    ///
    /// ```
    /// use histeq_compute::{Event, ProfilingResolution};
    ///
    /// let event = Event {
    ///     kernel: "remap".to_string(),
    ///     global_size: 4,
    ///     queued: 0,
    ///     submitted: 1_000,
    ///     start: 3_000,
    ///     end: 10_000,
    /// };
    ///
    /// assert_eq!(
    ///     event.profiling_info(ProfilingResolution::Us),
    ///     "Queued for: 1, Submitted for: 2, Executed for: 7, Total time: 10 [us]"
    /// );
    /// ```
    pub fn profiling_info(&self, resolution: ProfilingResolution) -> String {
        format!(
            "Queued for: {}, Submitted for: {}, Executed for: {}, Total time: {} [{}]",
            resolution.convert(self.submitted.saturating_sub(self.queued)),
            resolution.convert(self.start.saturating_sub(self.submitted)),
            resolution.convert(self.duration_ns()),
            resolution.convert(self.total_ns()),
            resolution.suffix(),
        )
    }
}
