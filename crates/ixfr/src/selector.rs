//! Deciding whether a query can be served incrementally, and from where.

use domain::base::Serial;

use crate::chain::VersionChain;
use crate::error::SelectError;
use crate::segment::Segment;

/// The outcome of checking a query's serial against a zone's chain.
pub enum Selection<'c> {
    /// The peer already has the current version; reply with a bare SOA.
    UpToDate,

    /// Serve an IXFR starting at this segment and walking `next()` until the
    /// chain's terminal segment.
    Serve(&'c Segment),

    /// The incremental answer is impossible; fall back to AXFR.
    Fallback(SelectError),
}

/// Apply the connector/selector rules of §4E.
///
/// `query_serial` is the serial carried by the authority-section SOA of the
/// inbound query; `current_serial` is the zone's live SOA serial.
pub fn select<'c>(chain: &'c VersionChain, query_serial: Serial, current_serial: Serial) -> Selection<'c> {
    // RFC 1982 comparison: is the zone's current serial equal to or newer
    // than what the client already has?
    if current_serial == query_serial || current_serial.gt(query_serial) {
        return Selection::UpToDate;
    }

    if chain.is_empty() {
        return Selection::Fallback(SelectError::NoChain);
    }

    let Some(start) = chain.find(query_serial) else {
        return Selection::Fallback(SelectError::UnknownSerial);
    };

    if !chain.is_connected_through_from(start, current_serial) {
        return Selection::Fallback(SelectError::BrokenChain);
    }

    Selection::Serve(start)
}
