//! Scenario outcome reporting

use std::fmt;

use canteen_core::{PermanentFailure, SyncSummary};

/// What a scenario observed
#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    pub name: &'static str,
    /// Operations handed to the queue
    pub queued: usize,
    /// Writes that reached the store without queueing
    pub applied_directly: usize,
    /// Operations loaded back from the journal
    pub recovered: usize,
    /// Every completed pass, in order
    pub passes: Vec<SyncSummary>,
    /// Operations still pending when the scenario ended
    pub remaining: usize,
    /// Documents in the store when the scenario ended
    pub documents: usize,
}

impl ScenarioReport {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Operations the store accepted across all passes
    pub fn replayed(&self) -> usize {
        self.passes.iter().map(|p| p.successful).sum()
    }

    pub fn permanent_failures(&self) -> impl Iterator<Item = &PermanentFailure> {
        self.passes.iter().flat_map(|p| p.permanently_failed.iter())
    }

    pub fn permanently_failed(&self) -> usize {
        self.permanent_failures().count()
    }

    /// Queue fully drained with nothing dropped
    pub fn is_clean(&self) -> bool {
        self.remaining == 0 && self.permanently_failed() == 0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(f, "  queued:             {}", self.queued)?;
        if self.applied_directly > 0 {
            writeln!(f, "  applied directly:   {}", self.applied_directly)?;
        }
        if self.recovered > 0 {
            writeln!(f, "  recovered:          {}", self.recovered)?;
        }
        for (i, pass) in self.passes.iter().enumerate() {
            writeln!(
                f,
                "  pass {:>2}: dispatched {}, ok {}, dropped {}, skipped {}, pending {}{}",
                i + 1,
                pass.total,
                pass.successful,
                pass.permanently_failed.len(),
                pass.skipped,
                pass.pending,
                if pass.journal_persisted { "" } else { " (journal write failed)" },
            )?;
        }
        writeln!(f, "  replayed:           {}", self.replayed())?;
        writeln!(f, "  permanently failed: {}", self.permanently_failed())?;
        for failure in self.permanent_failures() {
            writeln!(
                f,
                "    {} {} after {} attempts: {}",
                failure.operation.kind,
                failure.operation.target(),
                failure.operation.attempts,
                failure.last_error
            )?;
        }
        writeln!(f, "  remaining:          {}", self.remaining)?;
        write!(f, "  documents in store: {}", self.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_across_passes() {
        let mut report = ScenarioReport::new("flaky");
        report.passes.push(SyncSummary {
            total: 4,
            successful: 3,
            pending: 1,
            journal_persisted: true,
            ..Default::default()
        });
        report.passes.push(SyncSummary {
            total: 1,
            successful: 1,
            pending: 0,
            journal_persisted: true,
            ..Default::default()
        });

        assert_eq!(report.replayed(), 4);
        assert_eq!(report.permanently_failed(), 0);
        assert!(report.is_clean());

        let text = report.to_string();
        assert!(text.starts_with("=== flaky ==="));
        assert!(text.contains("pass  2"));
    }

    #[test]
    fn test_remaining_is_not_clean() {
        let mut report = ScenarioReport::new("outage");
        report.remaining = 2;
        assert!(!report.is_clean());
    }
}
