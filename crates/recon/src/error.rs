use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// Missing required column in a tabular input.
    MissingColumn { source: String, column: String },
    /// The ledger CSV could not be read at all (bad quoting, ragged header, ...).
    Csv { source: String, message: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { source, column } => {
                write!(f, "{source}: missing column '{column}'")
            }
            Self::Csv { source, message } => write!(f, "{source}: CSV error: {message}"),
        }
    }
}

impl std::error::Error for ReconError {}

/// A single input line that could not be used.
///
/// Never fatal: the offending line is skipped, logged, and reported back to
/// the caller so a run summary can say how much input was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub source: String,
    /// 1-based line (or record) number within `source`.
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl LineError {
    pub fn new(source: &str, line: usize, content: &str, reason: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    /// Log at warn level and hand the error back, for `errors.push(e.logged())`.
    pub fn logged(self) -> Self {
        log::warn!("{self}");
        self
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}, skipping line '{}'",
            self.source, self.line, self.reason, self.content
        )
    }
}

impl std::error::Error for LineError {}
