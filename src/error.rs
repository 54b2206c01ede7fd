//! Top-level errors for the `ixfrd` binary.

use std::fmt;

/// An error that causes the process to exit with a non-zero status.
///
/// Every component error the binary touches (configuration, logging setup,
/// the engine's own error families) is wrapped into this one enum so `main`
/// has a single place to print a message and choose an exit code, matching
/// the host project's convention of a small top-level `ExitError`.
#[derive(Debug)]
pub enum ExitError {
    /// The configuration file could not be read or parsed.
    Config(String),

    /// The logging subsystem could not be initialized.
    Logging(String),

    /// A persistence operation (reading or writing the IXFR file family)
    /// failed.
    Persist(ixfrd_engine::error::PersistError),
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(message) => write!(f, "configuration error: {message}"),
            Self::Logging(message) => write!(f, "logging error: {message}"),
            Self::Persist(error) => write!(f, "persistence error: {error}"),
        }
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persist(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ixfrd_engine::error::PersistError> for ExitError {
    fn from(error: ixfrd_engine::error::PersistError) -> Self {
        Self::Persist(error)
    }
}
