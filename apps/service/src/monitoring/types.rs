use std::fmt;

use crate::models::CheckState;

/// Terminal outcome of a single probe
///
/// Exactly one of these is produced per probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with this status code
    Response(u16),

    /// No response within the check's timeout
    Timeout,

    /// DNS, connection, TLS or other network failure
    Transport(String),
}

impl ProbeOutcome {
    /// Status code, if the endpoint answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Response(code) => Some(*code),
            ProbeOutcome::Timeout | ProbeOutcome::Transport(_) => None,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Response(code) => write!(f, "response {code}"),
            ProbeOutcome::Timeout => write!(f, "timeout"),
            ProbeOutcome::Transport(error) => write!(f, "transport error: {error}"),
        }
    }
}

/// What happened to the alert for a processed check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDisposition {
    /// Baseline probe or unchanged state
    NotWarranted,
    Sent,
    /// Warranted, but the notifier reported a failure
    Failed,
    /// Warranted, but the state write failed so nothing was sent
    Withheld,
}

/// Result of running one check through the outcome processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedOutcome {
    pub state: CheckState,
    pub persisted: bool,
    pub alert: AlertDisposition,
}

/// How a single check fared within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDisposition {
    /// An earlier cycle is still working on this check
    SkippedInFlight,
    ReadFailed,
    Invalid,
    Processed(ProcessedOutcome),
}

/// Summary of one cycle over all checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub probed: usize,
    pub skipped_in_flight: usize,
    pub read_failed: usize,
    pub invalid: usize,
    pub write_failed: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    /// Per-check tasks that panicked or were cancelled
    pub aborted: usize,
}

impl CycleReport {
    pub fn record(&mut self, disposition: &CheckDisposition) {
        match disposition {
            CheckDisposition::SkippedInFlight => self.skipped_in_flight += 1,
            CheckDisposition::ReadFailed => self.read_failed += 1,
            CheckDisposition::Invalid => self.invalid += 1,
            CheckDisposition::Processed(outcome) => {
                self.probed += 1;
                if !outcome.persisted {
                    self.write_failed += 1;
                }
                match outcome.alert {
                    AlertDisposition::Sent => self.alerts_sent += 1,
                    AlertDisposition::Failed => self.alerts_failed += 1,
                    AlertDisposition::NotWarranted | AlertDisposition::Withheld => {}
                }
            }
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listed, {} probed, {} in flight, {} unreadable, {} invalid, {} write failures, \
             {} alerts sent, {} alerts failed",
            self.listed,
            self.probed,
            self.skipped_in_flight,
            self.read_failed,
            self.invalid,
            self.write_failed,
            self.alerts_sent,
            self.alerts_failed
        )?;
        if self.aborted > 0 {
            write!(f, ", {} aborted", self.aborted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = CycleReport::default();
        report.record(&CheckDisposition::Invalid);
        report.record(&CheckDisposition::SkippedInFlight);
        report.record(&CheckDisposition::Processed(ProcessedOutcome {
            state: CheckState::Down,
            persisted: true,
            alert: AlertDisposition::Sent,
        }));
        report.record(&CheckDisposition::Processed(ProcessedOutcome {
            state: CheckState::Up,
            persisted: false,
            alert: AlertDisposition::Withheld,
        }));

        assert_eq!(report.invalid, 1);
        assert_eq!(report.skipped_in_flight, 1);
        assert_eq!(report.probed, 2);
        assert_eq!(report.write_failed, 1);
        assert_eq!(report.alerts_sent, 1);
        assert_eq!(report.alerts_failed, 0);
    }

    #[test]
    fn test_outcome_status_code() {
        assert_eq!(ProbeOutcome::Response(404).status_code(), Some(404));
        assert_eq!(ProbeOutcome::Timeout.status_code(), None);
        assert_eq!(ProbeOutcome::Transport("refused".into()).status_code(), None);
    }
}
