//! Small glue helpers shared by the persistence layer (component I).

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::PersistError;

/// The on-disk path for IXFR file number `k` (1-based; 1 is newest) derived
/// from a zone file's own path `Z`.
///
/// File 1 is named `Z.ixfr`; file `k >= 2` is `Z.ixfr.k`.
pub fn ixfr_file_path(zone_file: &Utf8Path, k: usize) -> Utf8PathBuf {
    debug_assert!(k >= 1);
    if k == 1 {
        Utf8PathBuf::from(format!("{zone_file}.ixfr"))
    } else {
        Utf8PathBuf::from(format!("{zone_file}.ixfr.{k}"))
    }
}

/// How many files should exist on disk for a chain holding `in_memory_count`
/// segments under a `max_count` budget.
///
/// `max_count == 0` always yields 0: nothing is ever persisted for a zone
/// with IXFR storage disabled.
pub fn target_file_count(in_memory_count: usize, max_count: usize) -> usize {
    in_memory_count.min(max_count)
}

/// Refuse to derive IXFR file names for a zone file path with no parent
/// directory, or where doing so would implicitly escape that directory.
///
/// The derived path always shares the zone file's own directory by
/// construction (it's a literal suffix appended to the same path), so this
/// is really a check that the zone file path itself is well-formed; it
/// exists as a named guard so misconfiguration fails loudly instead of
/// writing files to a surprising place.
pub fn check_persist_path_is_safe(zone_file: &Utf8Path) -> Result<(), PersistError> {
    let parent = zone_file.parent().ok_or(PersistError::NoParentDirectory)?;
    let candidate = ixfr_file_path(zone_file, 1);
    match candidate.parent() {
        Some(candidate_parent) if candidate_parent == parent => Ok(()),
        _ => Err(PersistError::UnsafeDirectory),
    }
}

/// Whether a path currently exists on disk.
pub fn file_exists(path: &Utf8Path) -> bool {
    path.as_std_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_one_has_no_numeric_suffix() {
        let path = ixfr_file_path(Utf8Path::new("/var/db/zones/example.com.zone"), 1);
        assert_eq!(path.as_str(), "/var/db/zones/example.com.zone.ixfr");
    }

    #[test]
    fn file_three_has_a_numeric_suffix() {
        let path = ixfr_file_path(Utf8Path::new("/var/db/zones/example.com.zone"), 3);
        assert_eq!(path.as_str(), "/var/db/zones/example.com.zone.ixfr.3");
    }

    #[test]
    fn target_count_never_exceeds_max_count() {
        assert_eq!(target_file_count(10, 3), 3);
        assert_eq!(target_file_count(1, 3), 1);
        assert_eq!(target_file_count(10, 0), 0);
    }

    #[test]
    fn root_path_has_no_parent_and_is_rejected() {
        assert!(check_persist_path_is_safe(Utf8Path::new("/")).is_err());
    }

    #[test]
    fn ordinary_path_is_accepted() {
        assert!(check_persist_path_is_safe(Utf8Path::new("/var/db/zones/example.com.zone")).is_ok());
    }
}
