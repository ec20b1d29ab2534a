use crate::types::Sequence;
use std::time::Duration;
use tokio::time::Instant;

/// The sequence of the current probe and whether it is in flight.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SequenceState {
    sequence: Sequence,
    probe_start: Option<Instant>,
    in_flight: bool,
}

impl SequenceState {
    #[must_use]
    pub const fn sequence(&self) -> Sequence {
        self.sequence
    }

    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Mark the probe for the current sequence as sent at `now`.
    pub fn begin(&mut self, now: Instant) {
        self.in_flight = true;
        self.probe_start = Some(now);
    }

    /// Complete the in-flight probe and move to the next sequence.
    ///
    /// Returns the time elapsed since the probe was sent.
    pub fn complete(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = self
            .probe_start
            .take()
            .map(|start| now.saturating_duration_since(start));
        self.in_flight = false;
        self.sequence = self.sequence.next();
        elapsed
    }

    /// Abandon the in-flight probe without moving to the next sequence.
    pub fn interrupt(&mut self) {
        self.in_flight = false;
        self.probe_start = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
