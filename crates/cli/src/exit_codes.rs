//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: cron jobs rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, bad dates)    |
//! | 60-69   | pipeline         | Batch pipeline codes                     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - failure outside the pipeline's own domain, such as
/// serializing `--json` output.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable or inverted date range.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Pipeline (60-69)
// =============================================================================

/// Config file unreadable, unparseable or invalid, or no config at all.
pub const EXIT_PIPELINE_CONFIG: u8 = 60;

/// Runtime I/O failure: unreadable input, unwritable output directory.
pub const EXIT_PIPELINE_RUNTIME: u8 = 61;

/// Ledger present but unusable (missing column, broken CSV).
pub const EXIT_PIPELINE_LEDGER: u8 = 62;

/// `--strict` only: at least one date finished with unmatched images.
pub const EXIT_PIPELINE_UNMATCHED: u8 = 63;
