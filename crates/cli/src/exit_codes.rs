//! CLI Exit Code Registry
//!
//! Single source of truth for `stampbook` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error                                             |
//! | 2    | Usage error (bad arguments, bad `--set` value)            |
//! | 3    | Invalid run config                                        |
//! | 4    | Runtime error (unreadable or malformed snapshot)          |
//! | 5    | `--check`: actionable outcomes are pending                |
//! | 6    | Commit applied items but the store could not be saved     |
//! | 7    | Commit finished with per-item failures                    |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Snapshot or store file missing, unreadable, or not valid JSON.
pub const EXIT_RECON_RUNTIME: u8 = 4;

/// `run --check` found outcomes that would change the store.
pub const EXIT_RECON_PENDING: u8 = 5;

/// Items were applied in memory but writing the store file failed.
pub const EXIT_RECON_SAVE: u8 = 6;

/// At least one item failed to apply (missing entity, store error).
pub const EXIT_RECON_COMMIT_FAILURES: u8 = 7;
