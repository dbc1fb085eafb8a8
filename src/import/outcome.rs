use serde::Serialize;
use std::fmt;

/// What one import call did. Row-level problems end up here, never as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub succeeded: usize,
    pub skipped: usize,
    pub errored: usize,
    /// Skip and error messages in the order they happened
    pub messages: Vec<String>,
    pub lots_created: usize,
    pub sales_created: usize,
}

impl ImportOutcome {
    pub(crate) fn skip(&mut self, message: String) {
        log::debug!("{message}");
        self.skipped += 1;
        self.messages.push(message);
    }

    pub(crate) fn error(&mut self, message: String) {
        log::debug!("{message}");
        self.errored += 1;
        self.messages.push(message);
    }

    /// Nothing was skipped or rejected
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.errored == 0
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} skipped, {} failed ({} lot(s), {} sale(s) created)",
            self.succeeded, self.skipped, self.errored, self.lots_created, self.sales_created
        )
    }
}

/// How a single sale line ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RowVerdict {
    Inserted,
    Skipped(String),
    Failed(String),
}

impl RowVerdict {
    /// Count a skip or failure; returns whether a row was written
    pub(crate) fn apply(self, outcome: &mut ImportOutcome) -> bool {
        match self {
            RowVerdict::Inserted => true,
            RowVerdict::Skipped(message) => {
                outcome.skip(message);
                false
            }
            RowVerdict::Failed(message) => {
                outcome.error(message);
                false
            }
        }
    }
}
