use crate::types::SendOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// No action beyond dropping the socket. Carries the current count.
    Continue(u32),
    /// Threshold reached; the device must restart.
    Restart,
}

/// Counts resource-exhaustion failures on the panel sender.
///
/// The count only grows: a successful send in between does not clear it, so
/// three exhaustion failures over the lifetime of the process restart the
/// device.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    count: u32,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn record(&mut self, outcome: SendOutcome, threshold: u32) -> Escalation {
        if outcome == SendOutcome::ResourceExhausted {
            self.count = self.count.saturating_add(1);
            if self.count >= threshold.max(1) {
                return Escalation::Restart;
            }
        }
        Escalation::Continue(self.count)
    }
}
