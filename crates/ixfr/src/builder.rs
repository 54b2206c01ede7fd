//! Accumulating an incoming diff stream into a committed segment.
//!
//! The incoming-transfer applier drives a [`SegmentBuilder`] through a fixed
//! protocol: `begin`, then any mix of `set_new_soa`/`set_old_soa`/
//! `add_deleted`/`add_added`, then either `cancel` or `finish`. This mirrors
//! how the host project's zone builders are driven by callbacks from a
//! reviewer pipeline, one record at a time, committing only at the end.

use bytes::Bytes;
use domain::base::Serial;
use domain::base::Ttl;
use domain::base::iana::Rtype;
use domain::rdata::Soa;
use domain::zonetree::StoredName;

use crate::chain::{ChainBudget, VersionChain};
use crate::error::BuildError;
use crate::segment::{ByteRun, Segment};
use crate::walker::{name_len, rr_len};

/// A record as seen by the builder: an already-uncompressed wire-form RR.
///
/// `rtype` is inspected only to decide whether to skip SOA records (the
/// builder appends its own section-end SOAs at `finish`); the bytes are
/// otherwise opaque and re-emitted verbatim.
pub struct IncomingRr<'a> {
    pub rtype: Rtype,
    pub wire: &'a [u8],
}

/// State for one in-progress segment.
///
/// `begin` allocates this; `finish` consumes it into a committed [`Segment`],
/// `cancel` discards it. Both `finish` and `cancel` are idempotent from the
/// caller's perspective because [`SegmentBuilder`] itself is consumed by
/// either — there is no way to call them twice on the same instance.
pub struct SegmentBuilder {
    apex: StoredName,
    old_serial: Serial,
    new_serial: Serial,
    old_soa_bytes: ByteRun,
    new_soa_bytes: ByteRun,
    deleted_bytes: ByteRun,
    added_bytes: ByteRun,
    budget: ChainBudget,
}

impl SegmentBuilder {
    /// Begin building a segment for a transfer moving `apex` from
    /// `old_serial` to `new_serial`. Returns `None` immediately if the zone's
    /// configuration disables storage (`max_count == 0`), since no
    /// allocation is ever worth doing in that case.
    pub fn begin(apex: StoredName, old_serial: Serial, new_serial: Serial, budget: ChainBudget) -> Option<Self> {
        if !budget.storage_enabled() {
            return None;
        }

        Some(Self {
            apex,
            old_serial,
            new_serial,
            old_soa_bytes: ByteRun::new(),
            new_soa_bytes: ByteRun::new(),
            deleted_bytes: ByteRun::new(),
            added_bytes: ByteRun::new(),
            budget,
        })
    }

    /// Record the new-SOA: the SOA that will frame the whole reply when this
    /// segment is served. Replaying this call overwrites any prior value.
    ///
    /// Per §4C, `soa_wire` is parsed into its seven fields, its serial is
    /// checked against `new_serial`, and the segment keeps the canonical
    /// re-encoding (zone apex as owner, uncompressed mname/rname) rather than
    /// the bytes as received.
    pub fn set_new_soa(&mut self, soa_wire: &[u8]) -> Result<(), BuildError> {
        let canonical = canonicalize_soa(&self.apex, soa_wire, self.new_serial)?;
        self.new_soa_bytes = ByteRun::new();
        self.new_soa_bytes.append(&canonical);
        Ok(())
    }

    /// Record the old-SOA and run a pre-emptive budget check against the
    /// chain this segment would land in: only at this point can the builder
    /// be sure this transfer produces an IXFR rather than an AXFR.
    ///
    /// `soa_wire` is parsed and canonicalized exactly as [`Self::set_new_soa`]
    /// does, checked against `old_serial`.
    pub fn set_old_soa(&mut self, soa_wire: &[u8], chain: &mut VersionChain) -> Result<(), BuildError> {
        let canonical = canonicalize_soa(&self.apex, soa_wire, self.old_serial)?;
        self.old_soa_bytes = ByteRun::new();
        self.old_soa_bytes.append(&canonical);

        if !chain.make_space(self.current_size(), self.budget) {
            tracing::debug!(
                old_serial = %self.old_serial,
                new_serial = %self.new_serial,
                "cancelling segment: out of budget after recording the old-SOA"
            );
            return Err(BuildError::OutOfBudget);
        }
        Ok(())
    }

    /// Append a deleted RR. SOA records are skipped; the section-end SOA is
    /// appended automatically at `finish`.
    pub fn add_deleted(&mut self, rr: IncomingRr<'_>, chain: &mut VersionChain) -> Result<(), BuildError> {
        self.add_to(Section::Deleted, rr, chain)
    }

    /// Append an added RR. SOA records are skipped; the section-end SOA is
    /// appended automatically at `finish`.
    pub fn add_added(&mut self, rr: IncomingRr<'_>, chain: &mut VersionChain) -> Result<(), BuildError> {
        self.add_to(Section::Added, rr, chain)
    }

    fn add_to(&mut self, section: Section, rr: IncomingRr<'_>, chain: &mut VersionChain) -> Result<(), BuildError> {
        if rr.rtype == Rtype::SOA {
            return Ok(());
        }

        rr_len(rr.wire, 0).map_err(BuildError::from)?;

        match section {
            Section::Deleted => self.deleted_bytes.append(rr.wire),
            Section::Added => self.added_bytes.append(rr.wire),
        }

        if !chain.make_space(self.current_size(), self.budget) {
            tracing::debug!(
                old_serial = %self.old_serial,
                new_serial = %self.new_serial,
                section = section.as_str(),
                "cancelling segment: out of budget while appending an RR"
            );
            return Err(BuildError::OutOfBudget);
        }
        Ok(())
    }

    /// Release any partial buffers. Idempotent by construction: once called,
    /// `self` is consumed and there is nothing left to cancel again.
    pub fn cancel(self) {
        // Dropping `self` frees every `ByteRun`.
    }

    /// Seal the segment: append the section-end SOAs, trim buffers to their
    /// final length, and commit to `chain`.
    ///
    /// Per the observed behaviour of the reference implementation (see
    /// `DESIGN.md`), the *new*-SOA terminates both the deleted and added
    /// runs, not the old-SOA for the deleted run as RFC 1995's prose alone
    /// would suggest.
    pub fn finish(mut self, log_line: Option<String>, chain: &mut VersionChain) -> Result<(), BuildError> {
        if self.old_soa_bytes.is_empty() || self.new_soa_bytes.is_empty() {
            return Err(BuildError::MissingSoa);
        }

        let new_soa_copy = self.new_soa_bytes.as_slice().to_vec();
        self.deleted_bytes.append(&new_soa_copy);
        self.added_bytes.append(&new_soa_copy);

        self.deleted_bytes.trim();
        self.added_bytes.trim();
        self.old_soa_bytes.trim();
        self.new_soa_bytes.trim();

        let segment = Segment {
            old_serial: self.old_serial,
            new_serial: self.new_serial,
            old_soa_bytes: self.old_soa_bytes,
            new_soa_bytes: self.new_soa_bytes,
            deleted_bytes: self.deleted_bytes,
            added_bytes: self.added_bytes,
            log_line,
            file_index: 0,
        };

        if !chain.make_space(segment.data_size(), self.budget) {
            tracing::warn!(
                old_serial = %segment.old_serial,
                new_serial = %segment.new_serial,
                size = segment.data_size(),
                "discarding completed segment: no room for it even after evicting the rest of the chain"
            );
            return Err(BuildError::OutOfBudget);
        }

        chain.insert(segment);
        Ok(())
    }

    fn current_size(&self) -> usize {
        crate::segment::SEGMENT_HEADER_SIZE
            + self.new_soa_bytes.len()
            + self.old_soa_bytes.len()
            + self.deleted_bytes.len()
            + self.added_bytes.len()
    }
}

enum Section {
    Deleted,
    Added,
}

impl Section {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Added => "added",
        }
    }
}

/// Parse an SOA RR's wire bytes into its seven RDATA fields, verify its
/// serial equals `expected_serial`, and re-emit it in canonical form: `apex`
/// as an uncompressed owner name, with the original CLASS and TTL preserved.
///
/// This is the parse-and-re-emit step §4C calls for: the bytes a segment
/// stores are never the SOA as received off the wire, since a peer's owner
/// name may be compressed or simply not match the zone apex we serve under.
fn canonicalize_soa(apex: &StoredName, soa_wire: &[u8], expected_serial: Serial) -> Result<Vec<u8>, BuildError> {
    let total_len = rr_len(soa_wire, 0).map_err(BuildError::from)?;
    if total_len != soa_wire.len() {
        return Err(BuildError::MalformedSoa);
    }

    let name_end = name_len(soa_wire, 0).map_err(BuildError::from)?;
    // header is TYPE(2) CLASS(2) TTL(4), already bounds-checked by `rr_len` above.
    let header = soa_wire
        .get(name_end..name_end + 8)
        .ok_or(BuildError::MalformedSoa)?;
    let class = u16::from_be_bytes([header[2], header[3]]);
    let ttl = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let rdata_start = name_end + 10; // + RDLENGTH(2)
    let rdata = &soa_wire[rdata_start..];

    let mname_end = name_len(rdata, 0).map_err(|_| BuildError::MalformedSoa)?;
    let mname = StoredName::from_octets(Bytes::copy_from_slice(&rdata[..mname_end]))
        .map_err(|_| BuildError::MalformedSoa)?;

    let rname_end = name_len(rdata, mname_end).map_err(|_| BuildError::MalformedSoa)?;
    let rname = StoredName::from_octets(Bytes::copy_from_slice(&rdata[mname_end..rname_end]))
        .map_err(|_| BuildError::MalformedSoa)?;

    let tail = rdata.get(rname_end..rname_end + 20).ok_or(BuildError::MalformedSoa)?;
    let serial = Serial::from(u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]));
    let refresh = Ttl::from_secs(u32::from_be_bytes([tail[4], tail[5], tail[6], tail[7]]));
    let retry = Ttl::from_secs(u32::from_be_bytes([tail[8], tail[9], tail[10], tail[11]]));
    let expire = Ttl::from_secs(u32::from_be_bytes([tail[12], tail[13], tail[14], tail[15]]));
    let minimum = Ttl::from_secs(u32::from_be_bytes([tail[16], tail[17], tail[18], tail[19]]));

    if serial != expected_serial {
        return Err(BuildError::UnexpectedSoaSerial);
    }

    let soa = Soa::new(mname, rname, serial, refresh, retry, expire, minimum);

    let mut rdata_out = Vec::new();
    rdata_out.extend_from_slice(soa.mname().as_slice());
    rdata_out.extend_from_slice(soa.rname().as_slice());
    rdata_out.extend_from_slice(&soa.serial().into_int().to_be_bytes());
    rdata_out.extend_from_slice(&soa.refresh().as_secs().to_be_bytes());
    rdata_out.extend_from_slice(&soa.retry().as_secs().to_be_bytes());
    rdata_out.extend_from_slice(&soa.expire().as_secs().to_be_bytes());
    rdata_out.extend_from_slice(&soa.minimum().as_secs().to_be_bytes());

    let mut out = Vec::with_capacity(apex.as_slice().len() + 10 + rdata_out.len());
    out.extend_from_slice(apex.as_slice());
    out.extend_from_slice(&6u16.to_be_bytes()); // SOA
    out.extend_from_slice(&class.to_be_bytes());
    out.extend_from_slice(&ttl.to_be_bytes());
    out.extend_from_slice(&(rdata_out.len() as u16).to_be_bytes());
    out.extend_from_slice(&rdata_out);
    Ok(out)
}
