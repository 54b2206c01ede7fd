//! Entry point for an inbound IXFR query: validation and dispatch.
//!
//! Message parsing proper (name decompression, header field access) is the
//! host's wire codec's job; this module only validates the *shape* the IXFR
//! protocol requires (one question, an authority SOA) and decides which of
//! the three outcomes in §4E applies.

use domain::base::Serial;

use crate::chain::VersionChain;
use crate::error::QueryError;
use crate::selector::{select, Selection};
use crate::streamer::Streamer;

/// The minimal shape of an inbound IXFR query the entry handler needs.
///
/// `question_count` and `authority_soa_serial` are expected to already be
/// extracted by the host's message parser; this type exists so the
/// validation in [`handle`] is exercised independent of any particular wire
/// decoder.
pub struct IxfrQuery {
    pub question_count: u16,
    pub authority_soa_serial: Option<Serial>,
}

/// What the entry handler decided to do with a validated query.
pub enum Outcome<'c> {
    /// Reply with a single SOA carrying the zone's current serial.
    UpToDate { current_serial: Serial },

    /// Degrade to a full zone transfer.
    AxfrFallback,

    /// Stream the response; `streamer` is primed on the first segment.
    Stream(Streamer<'c>),
}

/// Drive the query entry handler's validation and dispatch rules.
///
/// `zone_found` should be `true` iff the queried zone is served by this
/// instance; `current_serial` is that zone's live SOA serial. Returns a
/// protocol error for the handful of cases that are visible to the peer, or
/// an `Outcome` otherwise.
pub fn handle<'c>(
    query: &IxfrQuery,
    zone_found: bool,
    current_serial: Option<Serial>,
    chain: &'c VersionChain,
    peer_max: usize,
    datagram: bool,
) -> Result<Outcome<'c>, QueryError> {
    if query.question_count != 1 {
        return Err(QueryError::Format);
    }

    let query_serial = query.authority_soa_serial.ok_or(QueryError::Format)?;

    if !zone_found {
        return Err(QueryError::NotAuthoritative);
    }

    let current_serial = current_serial.ok_or(QueryError::NoSoa)?;

    match select(chain, query_serial, current_serial) {
        Selection::UpToDate => Ok(Outcome::UpToDate { current_serial }),
        Selection::Fallback(_) => Ok(Outcome::AxfrFallback),
        Selection::Serve(start) => {
            let mut segments = vec![start];
            let mut current = start;
            while let Some(next) = chain.next(current) {
                segments.push(next);
                current = next;
            }
            Ok(Outcome::Stream(Streamer::new(segments, peer_max, datagram)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{ByteRun, Segment};

    fn segment(old: u32, new: u32) -> Segment {
        let mut soa = ByteRun::new();
        soa.append(&[0, 0, 6, 0, 1, 0, 0, 0x0e, 0x10, 0, 0]);
        Segment {
            old_serial: Serial::from(old),
            new_serial: Serial::from(new),
            old_soa_bytes: soa.clone(),
            new_soa_bytes: soa,
            deleted_bytes: ByteRun::new(),
            added_bytes: ByteRun::new(),
            log_line: None,
            file_index: 0,
        }
    }

    #[test]
    fn malformed_question_count_is_a_format_error() {
        let chain = VersionChain::new();
        let query = IxfrQuery { question_count: 0, authority_soa_serial: Some(Serial::from(10)) };
        assert!(matches!(
            handle(&query, true, Some(Serial::from(10)), &chain, 512, true),
            Err(QueryError::Format)
        ));
    }

    #[test]
    fn missing_authority_soa_is_a_format_error() {
        let chain = VersionChain::new();
        let query = IxfrQuery { question_count: 1, authority_soa_serial: None };
        assert!(matches!(
            handle(&query, true, Some(Serial::from(10)), &chain, 512, true),
            Err(QueryError::Format)
        ));
    }

    #[test]
    fn unknown_zone_is_not_authoritative() {
        let chain = VersionChain::new();
        let query = IxfrQuery { question_count: 1, authority_soa_serial: Some(Serial::from(10)) };
        assert!(matches!(
            handle(&query, false, None, &chain, 512, true),
            Err(QueryError::NotAuthoritative)
        ));
    }

    #[test]
    fn up_to_date_client_gets_a_bare_soa_outcome() {
        let chain = VersionChain::new();
        let query = IxfrQuery { question_count: 1, authority_soa_serial: Some(Serial::from(100)) };
        let outcome = handle(&query, true, Some(Serial::from(100)), &chain, 512, true).unwrap();
        assert!(matches!(outcome, Outcome::UpToDate { current_serial } if current_serial == Serial::from(100)));
    }

    #[test]
    fn connected_chain_yields_a_stream_outcome() {
        let mut chain = VersionChain::new();
        chain.insert(segment(10, 20));
        let query = IxfrQuery { question_count: 1, authority_soa_serial: Some(Serial::from(10)) };
        let outcome = handle(&query, true, Some(Serial::from(20)), &chain, 16384, false).unwrap();
        assert!(matches!(outcome, Outcome::Stream(_)));
    }
}
