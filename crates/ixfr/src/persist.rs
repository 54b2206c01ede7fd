//! Serialising segments to a numbered file family, and reading them back.
//!
//! The actual RR text encoding ("print this wire-form RR as a master-file
//! line" / "parse this line back into wire form") is delegated to
//! [`RrTextFormat`], an interface the host zone parser/printer implements;
//! this module only owns the file layout, the header comments, and the
//! rename/rewrite choreography that keeps the on-disk set a clean prefix of
//! the in-memory chain.

use std::fs;

use camino::Utf8Path;
use domain::base::Serial;

use crate::chain::{ChainBudget, VersionChain};
use crate::error::PersistError;
use crate::segment::{ByteRun, Segment};
use crate::util::{check_persist_path_is_safe, file_exists, ixfr_file_path, target_file_count};

/// The host's zone parser/printer, as seen from the persistence layer.
///
/// `print_rr` never fails: any RR it doesn't otherwise know how to render
/// falls back to the generic `\#` unknown-type form, per §4H.
pub trait RrTextFormat {
    fn print_rr(&self, rr: &[u8]) -> String;
    fn parse_rr(&self, line: &str) -> Result<Vec<u8>, PersistError>;
}

/// A conservative [`RrTextFormat`] that only ever uses the generic `\#`
/// unknown-type form (RFC 3597). Always round-trips any wire-form RR, and is
/// what this crate falls back to when no zone-aware printer is wired in.
pub struct GenericRrTextFormat;

impl RrTextFormat for GenericRrTextFormat {
    fn print_rr(&self, rr: &[u8]) -> String {
        let len = rr.len();
        let mut out = format!("\\# {len}");
        for byte in rr {
            out.push(' ');
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    fn parse_rr(&self, line: &str) -> Result<Vec<u8>, PersistError> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("\\#") {
            return Err(PersistError::Malformed { file_index: 0, reason: "expected generic RR marker" });
        }
        let len: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(PersistError::Malformed { file_index: 0, reason: "missing byte count" })?;

        let mut bytes = Vec::with_capacity(len);
        for hex in parts {
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| PersistError::Malformed { file_index: 0, reason: "invalid hex byte" })?;
            bytes.push(byte);
        }
        if bytes.len() != len {
            return Err(PersistError::Malformed { file_index: 0, reason: "byte count mismatch" });
        }
        Ok(bytes)
    }
}

/// Report whether an already-framed RR's TYPE field is SOA (6).
///
/// Bounds-checked via [`crate::walker::name_len`]: a malformed owner name or
/// a TYPE field running past the buffer is reported rather than panicking.
fn is_soa_rr(rr: &[u8]) -> Result<bool, PersistError> {
    let name_end = crate::walker::name_len(rr, 0)
        .map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed RR owner name" })?;
    let type_bytes = rr
        .get(name_end..name_end + 2)
        .ok_or(PersistError::Malformed { file_index: 0, reason: "truncated RR header" })?;
    Ok(u16::from_be_bytes([type_bytes[0], type_bytes[1]]) == 6)
}

/// Extract the 32-bit serial out of an already-validated SOA RR's rdata.
///
/// Mirrors the minimal SOA-rdata reading the segment builder already does;
/// duplicated here rather than shared because the persistence layer reads
/// from freshly-parsed text, not from a live transfer stream. Every walk is
/// bounds-checked so a caller that passes a non-SOA or malformed RR gets
/// `Malformed` back rather than a panic.
fn soa_serial(rr: &[u8]) -> Result<Serial, PersistError> {
    let len = crate::walker::rr_len(rr, 0)
        .map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed SOA RR" })?;
    if len != rr.len() {
        return Err(PersistError::Malformed { file_index: 0, reason: "trailing bytes after SOA RR" });
    }

    let name_end = crate::walker::name_len(rr, 0)
        .map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed SOA owner name" })?;
    let rdata_start = name_end
        .checked_add(2 + 2 + 4 + 2)
        .filter(|&end| end <= rr.len())
        .ok_or(PersistError::Malformed { file_index: 0, reason: "truncated SOA header" })?;
    let rdata = &rr[rdata_start..];

    // SOA rdata: mname, rname, then serial(4), refresh(4), retry(4), expire(4), minimum(4).
    let mut pos = 0;
    for _ in 0..2 {
        pos = crate::walker::name_len(rdata, pos)
            .map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed SOA rdata name" })?;
    }

    let serial_bytes = rdata
        .get(pos..pos + 4)
        .ok_or(PersistError::Malformed { file_index: 0, reason: "truncated SOA rdata" })?;
    Ok(Serial::from(u32::from_be_bytes([
        serial_bytes[0],
        serial_bytes[1],
        serial_bytes[2],
        serial_bytes[3],
    ])))
}

/// Write `chain` to the numbered file family rooted at `zone_file`, per the
/// write path in §4H: compute the target count, drop superfluous files,
/// evict excess in-memory segments, reposition already-persisted segments,
/// then write out anything new.
pub fn write_to_file(
    chain: &mut VersionChain,
    zone_file: &Utf8Path,
    budget: ChainBudget,
    zone_name: &str,
    format: &dyn RrTextFormat,
) -> Result<(), PersistError> {
    check_persist_path_is_safe(zone_file)?;

    let target = target_file_count(chain.len(), budget.max_count);

    // Step 1: delete files beyond the new target, probing upward until one
    // is missing.
    let mut probe = target + 1;
    loop {
        let path = ixfr_file_path(zone_file, probe);
        if !file_exists(&path) {
            break;
        }
        fs::remove_file(path.as_std_path())?;
        probe += 1;
    }

    // Step 2: evict oldest segments until the in-memory count matches.
    while chain.len() > target {
        chain.remove_oldest();
    }

    // Oldest-first snapshot of the surviving segments. Oldest maps to the
    // largest destination number; newest maps to 1.
    let keys: Vec<u32> = {
        let mut k = Vec::with_capacity(chain.len());
        let mut cursor = chain.first();
        while let Some(segment) = cursor {
            k.push(segment.old_serial.into_int());
            cursor = chain.next(segment);
        }
        k
    };

    // Step 3: reposition segments that are already on disk but in the wrong
    // slot.
    for (idx, key) in keys.iter().enumerate() {
        let dest = target - idx;
        let Some(segment) = chain.find_mut(*key) else { continue };
        if segment.file_index != 0 && segment.file_index != dest {
            let dest_path = ixfr_file_path(zone_file, dest);
            if file_exists(&dest_path) {
                fs::remove_file(dest_path.as_std_path())?;
            }
            let src_path = ixfr_file_path(zone_file, segment.file_index);
            if let Err(error) = fs::rename(src_path.as_std_path(), dest_path.as_std_path()) {
                tracing::warn!(
                    %error,
                    from = %src_path,
                    to = %dest_path,
                    "failed to reposition persisted IXFR file; rolling back file family"
                );
                cleanup_from(zone_file, 1, target);
                return Err(error.into());
            }
            segment.file_index = dest;
        }
    }

    // Step 4: write out segments that have never been persisted, newest
    // first, into whatever destination slots they were assigned above.
    for (idx, key) in keys.iter().enumerate().rev() {
        let dest = target - idx;
        let Some(segment) = chain.find_by_key(*key) else { continue };
        if segment.file_index != 0 {
            continue;
        }
        let path = ixfr_file_path(zone_file, dest);
        if let Err(error) = write_one_file(&path, segment, zone_name, format) {
            tracing::warn!(%error, file = %path, "failed to write IXFR file; rolling back file family");
            cleanup_from(zone_file, dest, target);
            return Err(error);
        }
        // Re-borrow mutably now that the immutable borrow above has ended.
        if let Some(segment) = chain.find_mut(*key) {
            segment.file_index = dest;
        }
    }

    Ok(())
}

/// Delete files `from..=through`, used to restore the prefix invariant after
/// a rename or write failure partway through the file family.
fn cleanup_from(zone_file: &Utf8Path, from: usize, through: usize) {
    for k in from..=through {
        let path = ixfr_file_path(zone_file, k);
        if let Err(error) = fs::remove_file(path.as_std_path()) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(%error, file = %path, "cleanup after a persistence failure could not remove a file");
            }
        }
    }
}

fn write_one_file(
    path: &Utf8Path,
    segment: &Segment,
    zone_name: &str,
    format: &dyn RrTextFormat,
) -> Result<(), PersistError> {
    let mut out = String::new();
    out.push_str("; IXFR data file\n");
    out.push_str(&format!("; zone {zone_name}\n"));
    out.push_str(&format!("; from_serial {}\n", segment.old_serial));
    out.push_str(&format!("; to_serial {}\n", segment.new_serial));
    if let Some(log_line) = &segment.log_line {
        out.push_str(&format!("; {log_line}\n"));
    }

    out.push_str(&format.print_rr(segment.new_soa_bytes.as_slice()));
    out.push('\n');
    out.push_str(&format.print_rr(segment.old_soa_bytes.as_slice()));
    out.push('\n');
    for rr in segment.deleted_bytes.rrs() {
        let rr = rr.map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed deleted RR" })?;
        out.push_str(&format.print_rr(rr));
        out.push('\n');
    }
    for rr in segment.added_bytes.rrs() {
        let rr = rr.map_err(|_| PersistError::Malformed { file_index: 0, reason: "malformed added RR" })?;
        out.push_str(&format.print_rr(rr));
        out.push('\n');
    }

    crate::atomic_write(path, out.as_bytes())?;
    Ok(())
}

/// Read the numbered file family back into `chain`, per the read path in
/// §4H. Clears `chain` first. Stops at the first missing file, at the first
/// parse failure (keeping everything read so far), or once `budget` is
/// exhausted.
pub fn read_from_file(
    chain: &mut VersionChain,
    zone_file: &Utf8Path,
    budget: ChainBudget,
    current_serial: Serial,
    format: &dyn RrTextFormat,
) -> Result<(), PersistError> {
    chain.clear();

    let mut expect_to_serial = current_serial;
    let mut k = 1usize;

    loop {
        if budget.max_count > 0 && chain.len() >= budget.max_count {
            break;
        }

        let path = ixfr_file_path(zone_file, k);
        if !file_exists(&path) {
            break;
        }

        let contents = match fs::read_to_string(path.as_std_path()) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::warn!(%error, file = %path, "failed to read persisted IXFR file; stopping at the prefix read so far");
                break;
            }
        };

        match read_one_file(&contents, expect_to_serial, format) {
            Ok(mut segment) => {
                if budget.max_bytes > 0 && chain.total_size() + segment.data_size() > budget.max_bytes {
                    break;
                }
                segment.file_index = k;
                expect_to_serial = segment.old_serial;
                chain.insert(segment);
                k += 1;
            }
            Err(error) => {
                tracing::warn!(%error, file = %path, "malformed persisted IXFR file; stopping at the prefix read so far");
                break;
            }
        }
    }

    Ok(())
}

fn read_one_file(contents: &str, expect_to_serial: Serial, format: &dyn RrTextFormat) -> Result<Segment, PersistError> {
    let mut lines = contents.lines().filter(|line| !line.starts_with(';') && !line.trim().is_empty());

    let new_soa_line = lines.next().ok_or(PersistError::Malformed { file_index: 0, reason: "missing new-SOA line" })?;
    let new_soa = format.parse_rr(new_soa_line)?;
    let new_serial = soa_serial(&new_soa)?;
    if new_serial != expect_to_serial {
        return Err(PersistError::Malformed { file_index: 0, reason: "new-SOA serial does not match chain" });
    }

    let old_soa_line = lines.next().ok_or(PersistError::Malformed { file_index: 0, reason: "missing old-SOA line" })?;
    let old_soa = format.parse_rr(old_soa_line)?;
    let old_serial = soa_serial(&old_soa)?;

    let mut deleted = ByteRun::new();
    for line in lines.by_ref() {
        let rr = format.parse_rr(line)?;
        let is_section_end = is_soa_rr(&rr)? && soa_serial(&rr).ok() == Some(new_serial);
        deleted.append(&rr);
        if is_section_end {
            break;
        }
    }

    let mut added = ByteRun::new();
    for line in lines {
        let rr = format.parse_rr(line)?;
        let is_section_end = is_soa_rr(&rr)? && soa_serial(&rr).ok() == Some(new_serial);
        added.append(&rr);
        if is_section_end {
            break;
        }
    }

    Ok(Segment {
        old_serial,
        new_serial,
        old_soa_bytes: byte_run(old_soa),
        new_soa_bytes: byte_run(new_soa),
        deleted_bytes: deleted,
        added_bytes: added,
        log_line: None,
        file_index: 0,
    })
}

fn byte_run(bytes: Vec<u8>) -> ByteRun {
    let mut run = ByteRun::new();
    run.append(&bytes);
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn soa(serial: u32) -> Vec<u8> {
        let mut buf = vec![0]; // root owner
        buf.extend_from_slice(&6u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&3600u32.to_be_bytes());
        let mut rdata = vec![0, 0]; // mname = root
        rdata.extend_from_slice(&serial.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        rdata.extend_from_slice(&3600u32.to_be_bytes());
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
        buf
    }

    fn segment(old: u32, new: u32) -> Segment {
        let mut old_soa = ByteRun::new();
        old_soa.append(&soa(old));
        let mut new_soa = ByteRun::new();
        new_soa.append(&soa(new));
        let mut deleted = ByteRun::new();
        deleted.append(&soa(new)); // trailing new-SOA, per the resolved open question
        let mut added = ByteRun::new();
        added.append(&soa(new));

        Segment {
            old_serial: Serial::from(old),
            new_serial: Serial::from(new),
            old_soa_bytes: old_soa,
            new_soa_bytes: new_soa,
            deleted_bytes: deleted,
            added_bytes: added,
            log_line: None,
            file_index: 0,
        }
    }

    #[test]
    fn soa_serial_reads_back_the_encoded_value() {
        assert_eq!(soa_serial(&soa(42)).unwrap(), Serial::from(42));
    }

    #[test]
    fn write_then_read_round_trips_a_chain() {
        let dir = tempfile::tempdir().unwrap();
        let zone_file = Utf8PathBuf::from_path_buf(dir.path().join("example.com.zone")).unwrap();

        let mut chain = VersionChain::new();
        chain.insert(segment(10, 20));
        chain.insert(segment(20, 30));

        let budget = ChainBudget { max_count: 10, max_bytes: 0 };
        write_to_file(&mut chain, &zone_file, budget, "example.com", &GenericRrTextFormat).unwrap();

        assert!(file_exists(&ixfr_file_path(&zone_file, 1)));
        assert!(file_exists(&ixfr_file_path(&zone_file, 2)));
        assert!(!file_exists(&ixfr_file_path(&zone_file, 3)));

        let mut read_chain = VersionChain::new();
        read_from_file(&mut read_chain, &zone_file, budget, Serial::from(30), &GenericRrTextFormat).unwrap();

        assert_eq!(read_chain.len(), 2);
        assert_eq!(read_chain.find(Serial::from(10)).unwrap().new_serial, Serial::from(20));
        assert_eq!(read_chain.find(Serial::from(20)).unwrap().new_serial, Serial::from(30));
    }

    #[test]
    fn write_evicts_and_prunes_superfluous_files() {
        let dir = tempfile::tempdir().unwrap();
        let zone_file = Utf8PathBuf::from_path_buf(dir.path().join("example.com.zone")).unwrap();

        let mut chain = VersionChain::new();
        chain.insert(segment(10, 20));
        chain.insert(segment(20, 30));
        chain.insert(segment(30, 40));

        let roomy = ChainBudget { max_count: 10, max_bytes: 0 };
        write_to_file(&mut chain, &zone_file, roomy, "example.com", &GenericRrTextFormat).unwrap();
        assert!(file_exists(&ixfr_file_path(&zone_file, 3)));

        let tight = ChainBudget { max_count: 2, max_bytes: 0 };
        write_to_file(&mut chain, &zone_file, tight, "example.com", &GenericRrTextFormat).unwrap();

        assert_eq!(chain.len(), 2);
        assert!(file_exists(&ixfr_file_path(&zone_file, 1)));
        assert!(file_exists(&ixfr_file_path(&zone_file, 2)));
        assert!(!file_exists(&ixfr_file_path(&zone_file, 3)));
    }
}
