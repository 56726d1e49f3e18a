use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;

// -----------------------------------------------------------------------------
// Types

/// Result of one git operation.
///
/// `failed` comes from the exit status alone; the message is informational
/// and may be non-empty on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub message: String,
    pub failed: bool,
}

/// One rendered line in a repository's outcome history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeLine {
    pub message: String,
    pub is_error: bool,
}

/// All lines recorded for one repository, in the order they were recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryOutcomes {
    pub repository: String,
    pub lines: Vec<OutcomeLine>,
}

/// Outcome log shared by every repository in a batch run.
///
/// Repositories keep the order in which they were first written to.
#[derive(Debug, Default)]
pub struct OutcomeLog {
    entries: Mutex<Vec<RepositoryOutcomes>>,
}

// -----------------------------------------------------------------------------
// OperationOutcome impl

impl OperationOutcome {
    pub fn new(message: impl AsRef<str>, failed: bool) -> Self {
        Self {
            message: single_line(message.as_ref()),
            failed,
        }
    }

    pub fn success(message: impl AsRef<str>) -> Self {
        Self::new(message, false)
    }

    pub fn failure(message: impl AsRef<str>) -> Self {
        Self::new(message, true)
    }
}

/// Trim captured process output and fold it onto a single line.
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// -----------------------------------------------------------------------------
// OutcomeLog impl

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome against `repository`.
    ///
    /// Failures are always kept. Successes are kept only when `verbose` is set
    /// and they carry text. Returns whether the outcome was kept.
    pub fn record(&self, repository: &str, outcome: &OperationOutcome, verbose: bool) -> bool {
        if !outcome.failed && (!verbose || outcome.message.is_empty()) {
            return false;
        }

        let line = OutcomeLine {
            message: outcome.message.clone(),
            is_error: outcome.failed,
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|entry| entry.repository == repository) {
            Some(entry) => entry.lines.push(line),
            None => entries.push(RepositoryOutcomes {
                repository: repository.to_string(),
                lines: vec![line],
            }),
        }
        true
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<RepositoryOutcomes> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines recorded for a single repository.
    pub fn lines(&self, repository: &str) -> Vec<OutcomeLine> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.repository == repository)
            .map(|entry| entry.lines.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
