//! Error types for the IXFR engine.
//!
//! Every component family gets its own plain enum rather than a single
//! catch-all, so that the error-handling taxonomy maps onto match arms: a
//! caller that only cares about fallback-to-AXFR doesn't need to know about
//! persistence's rename failures, and vice versa.

use std::fmt;
use std::io;

//----------- WalkError ----------------------------------------------------

/// A failure while measuring the length of an RR inside a byte run.
#[derive(Debug)]
pub enum WalkError {
    /// A label length byte had its top two bits set (a compression pointer).
    CompressedName,

    /// The buffer ended before a complete name, fixed header, or rdata could
    /// be read.
    Truncated,
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompressedName => f.write_str("owner name uses a compression pointer"),
            Self::Truncated => f.write_str("buffer ends before the RR is complete"),
        }
    }
}

impl std::error::Error for WalkError {}

//----------- BuildError ----------------------------------------------------

/// A reason a [`crate::builder::SegmentBuilder`] gave up on a segment.
///
/// None of these are surfaced to the peer: a cancelled builder just means the
/// server keeps one fewer history entry, per the error-handling policy that
/// cancellation never raises upward.
#[derive(Debug)]
pub enum BuildError {
    /// The zone's configuration disables IXFR storage (`ixfr_number == 0`).
    StorageDisabled,

    /// An SOA RDATA could not be parsed into its seven fields.
    MalformedSoa,

    /// A parsed SOA's serial did not match the serial the segment expected
    /// (`old_serial` for `set_old_soa`, `new_serial` for `set_new_soa`).
    UnexpectedSoaSerial,

    /// A record was shorter than the walker expects.
    Walk(WalkError),

    /// There is no room for the candidate segment even after evicting every
    /// other segment in the chain.
    OutOfBudget,

    /// `finish` was called without both a new-SOA and an old-SOA set.
    MissingSoa,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageDisabled => f.write_str("IXFR storage is disabled for this zone"),
            Self::MalformedSoa => f.write_str("SOA record data is malformed"),
            Self::UnexpectedSoaSerial => f.write_str("SOA serial does not match the expected chain serial"),
            Self::Walk(_) => f.write_str("a record in the incoming transfer was malformed"),
            Self::OutOfBudget => f.write_str("segment does not fit under the configured budget"),
            Self::MissingSoa => f.write_str("segment is missing an old-SOA or new-SOA"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Walk(error) => Some(error),
            _ => None,
        }
    }
}

impl From<WalkError> for BuildError {
    fn from(error: WalkError) -> Self {
        Self::Walk(error)
    }
}

//----------- SelectError ---------------------------------------------------

/// Why the connector/selector could not serve an IXFR and fell back to AXFR.
///
/// This is never an error shown to the peer; degrading to AXFR is a valid
/// IXFR response per RFC 1995.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// The zone has no chain at all.
    NoChain,

    /// No segment starts at the requested serial.
    UnknownSerial,

    /// The chain from the requested serial to the zone's current serial has
    /// a gap somewhere.
    BrokenChain,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChain => f.write_str("zone has no stored IXFR history"),
            Self::UnknownSerial => f.write_str("requested serial is not the start of any segment"),
            Self::BrokenChain => f.write_str("chain from the requested serial does not reach the current serial"),
        }
    }
}

impl std::error::Error for SelectError {}

//----------- PersistError ---------------------------------------------------

/// A failure while writing or reading the on-disk IXFR file family.
#[derive(Debug)]
pub enum PersistError {
    /// The underlying filesystem operation failed.
    Io(io::Error),

    /// A zone file path has no parent directory to derive `.ixfr` names from.
    NoParentDirectory,

    /// A configured zone file path would place IXFR files outside the zone's
    /// own directory.
    UnsafeDirectory,

    /// A persisted file's header or body did not parse as expected.
    Malformed { file_index: usize, reason: &'static str },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "I/O error: {error}"),
            Self::NoParentDirectory => f.write_str("zone file path has no parent directory"),
            Self::UnsafeDirectory => {
                f.write_str("IXFR file would be placed outside the zone file's directory")
            }
            Self::Malformed { file_index, reason } => {
                write!(f, "malformed IXFR file #{file_index}: {reason}")
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

//----------- QueryError -----------------------------------------------------

/// A protocol-level error surfaced in the response RCODE (§7, taxonomy 1).
///
/// Unlike [`BuildError`] and [`SelectError`], these three are the only
/// failures that are ever visible to the querying peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// The query did not have exactly one question, or its authority section
    /// did not contain a leading SOA record.
    Format,

    /// The queried zone is not served by this instance.
    NotAuthoritative,

    /// The zone is authoritative but has no current SOA to compare against.
    NoSoa,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => f.write_str("malformed IXFR query"),
            Self::NotAuthoritative => f.write_str("zone is not served here"),
            Self::NoSoa => f.write_str("zone has no SOA record"),
        }
    }
}

impl std::error::Error for QueryError {}
