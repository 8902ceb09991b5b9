use std::fmt;
use std::path::{Path, PathBuf};

use gamba_recon::ReconError;

#[derive(Debug)]
pub enum IoError {
    /// An input file for a date does not exist. Callers skip the date.
    MissingFile { path: PathBuf },
    Read { path: PathBuf, message: String },
    Write { path: PathBuf, message: String },
    Csv { path: PathBuf, message: String },
    /// A processed table row that cannot be turned back into a sale.
    InvalidRow { path: PathBuf, line: usize, message: String },
    /// The ledger exists but cannot be used (missing column, broken CSV).
    Ledger(ReconError),
    Recon(ReconError),
}

impl IoError {
    pub fn read(path: &Path, err: impl fmt::Display) -> Self {
        Self::Read { path: path.to_path_buf(), message: err.to_string() }
    }

    pub fn write(path: &Path, err: impl fmt::Display) -> Self {
        Self::Write { path: path.to_path_buf(), message: err.to_string() }
    }

    pub fn csv(path: &Path, err: impl fmt::Display) -> Self {
        Self::Csv { path: path.to_path_buf(), message: err.to_string() }
    }

    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::MissingFile { .. })
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { path } => write!(f, "file not found: {}", path.display()),
            Self::Read { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Write { path, message } => write!(f, "cannot write {}: {message}", path.display()),
            Self::Csv { path, message } => write!(f, "{}: CSV error: {message}", path.display()),
            Self::InvalidRow { path, line, message } => {
                write!(f, "{}:{line}: {message}", path.display())
            }
            Self::Ledger(e) => write!(f, "unusable ledger: {e}"),
            Self::Recon(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<ReconError> for IoError {
    fn from(e: ReconError) -> Self {
        Self::Recon(e)
    }
}
