//! The per-zone version chain: an ordered collection of committed segments.

use std::collections::BTreeMap;

use domain::base::Serial;

use crate::segment::Segment;

/// Per-zone budget on how much IXFR history to retain.
///
/// `max_count == 0` disables storage entirely: the chain never holds a
/// segment and every builder call cancels immediately. `max_bytes == 0`
/// means "no byte cap" — eviction is driven by `max_count` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBudget {
    pub max_count: usize,
    pub max_bytes: usize,
}

impl ChainBudget {
    pub const fn disabled() -> Self {
        Self { max_count: 0, max_bytes: 0 }
    }

    pub const fn storage_enabled(&self) -> bool {
        self.max_count > 0
    }
}

/// A per-zone ordered collection of [`Segment`]s, keyed by `old_serial`.
///
/// The key is compared as a plain, non-wrapping `u32`: neighbouring segments
/// in one zone's chain are always inserted in increasing numeric order, so
/// there is never a wraparound to reason about inside the chain itself.
/// RFC 1982 wraparound-aware comparison belongs to the connector/selector's
/// "is this zone up to date" check, not to chain ordering — see
/// [`crate::selector`].
#[derive(Debug, Default)]
pub struct VersionChain {
    by_old_serial: BTreeMap<u32, Segment>,
    total_size: usize,
}

impl VersionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_old_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_old_serial.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Remove every segment, freeing their byte buffers. Used when a zone is
    /// reloaded.
    pub fn clear(&mut self) {
        self.by_old_serial.clear();
        self.total_size = 0;
    }

    /// Exact match on `old_serial`.
    pub fn find(&self, old_serial: Serial) -> Option<&Segment> {
        self.by_old_serial.get(&old_serial.into_int())
    }

    /// Exact match on `old_serial`, by `u32` key directly (used by the
    /// persistence layer, which already walks the chain by key).
    pub fn find_by_key(&self, key: u32) -> Option<&Segment> {
        self.by_old_serial.get(&key)
    }

    /// Mutable exact match on a raw `old_serial` key.
    pub fn find_mut(&mut self, key: u32) -> Option<&mut Segment> {
        self.by_old_serial.get_mut(&key)
    }

    pub fn first(&self) -> Option<&Segment> {
        self.by_old_serial.values().next()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.by_old_serial.values().next_back()
    }

    /// The segment whose `old_serial` equals `segment.new_serial`, i.e. the
    /// next step in the chain after `segment`.
    pub fn next(&self, segment: &Segment) -> Option<&Segment> {
        self.find(segment.new_serial)
    }

    /// Insert a freshly committed segment. The key (`old_serial`) must not
    /// already be present; a duplicate is a programmer error, since the
    /// connector/selector is expected to have already rejected any request
    /// that would create one.
    pub fn insert(&mut self, segment: Segment) {
        let key = segment.old_serial.into_int();
        self.total_size += segment.data_size();
        let previous = self.by_old_serial.insert(key, segment);
        debug_assert!(previous.is_none(), "duplicate old_serial inserted into chain");
    }

    /// Remove and return the oldest segment, if any.
    pub fn remove_oldest(&mut self) -> Option<Segment> {
        let key = *self.by_old_serial.keys().next()?;
        let segment = self.by_old_serial.remove(&key)?;
        self.total_size -= segment.data_size();
        Some(segment)
    }

    /// Whether, starting from `start` and walking `next()`, every adjacent
    /// pair is connected and the walk terminates exactly at `current_serial`.
    ///
    /// Per §4E, connectivity is judged from the segment the query actually
    /// resumes from, not from the chain's oldest member: a gap *before*
    /// `start` must not cause an otherwise-servable request to fall back to
    /// AXFR.
    pub fn is_connected_through_from(&self, start: &Segment, current_serial: Serial) -> bool {
        let mut segment = start;
        loop {
            match self.next(segment) {
                Some(next) => segment = next,
                None => return segment.new_serial == current_serial,
            }
        }
    }

    /// Evict oldest-first until `candidate_size` plus the remaining
    /// aggregate fits under `budget`, and the remaining count (plus the
    /// incoming candidate) is strictly under `budget.max_count`.
    ///
    /// Returns `true` if the candidate now has room, `false` if even an
    /// empty chain cannot fit it (the caller should cancel the build).
    pub fn make_space(&mut self, candidate_size: usize, budget: ChainBudget) -> bool {
        if !budget.storage_enabled() {
            return false;
        }

        loop {
            let count_ok = self.len() < budget.max_count;
            let size_ok = budget.max_bytes == 0 || self.total_size + candidate_size <= budget.max_bytes;

            if count_ok && size_ok {
                return true;
            }

            if self.remove_oldest().is_none() {
                // Chain is empty and it still doesn't fit.
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::ByteRun;

    fn segment(old: u32, new: u32, added_len: usize) -> Segment {
        let mut added = ByteRun::new();
        added.append(&vec![0u8; added_len]);
        Segment {
            old_serial: Serial::from(old),
            new_serial: Serial::from(new),
            old_soa_bytes: ByteRun::new(),
            new_soa_bytes: ByteRun::new(),
            deleted_bytes: ByteRun::new(),
            added_bytes: added,
            log_line: None,
            file_index: 0,
        }
    }

    #[test]
    fn chain_stays_sorted_and_connected() {
        let mut chain = VersionChain::new();
        chain.insert(segment(10, 20, 0));
        chain.insert(segment(20, 30, 0));
        chain.insert(segment(30, 40, 0));

        assert_eq!(chain.first().unwrap().old_serial, Serial::from(10));
        assert_eq!(chain.last().unwrap().old_serial, Serial::from(30));
        let start = chain.first().unwrap();
        assert!(chain.is_connected_through_from(start, Serial::from(40)));
    }

    #[test]
    fn broken_chain_is_detected() {
        let mut chain = VersionChain::new();
        chain.insert(segment(10, 20, 0));
        chain.insert(segment(30, 40, 0));

        let start = chain.first().unwrap();
        assert!(!chain.is_connected_through_from(start, Serial::from(40)));
    }

    #[test]
    fn gap_before_the_requested_start_does_not_block_a_connected_tail() {
        // A broken link sits *before* the segment the query resumes from;
        // per §4E only the walk from `start` onward matters.
        let mut chain = VersionChain::new();
        chain.insert(segment(1, 5, 0)); // disconnected from what follows
        chain.insert(segment(10, 20, 0));
        chain.insert(segment(20, 30, 0));

        let start = chain.find(Serial::from(10)).unwrap();
        assert!(chain.is_connected_through_from(start, Serial::from(30)));
    }

    #[test]
    fn make_space_evicts_oldest_first() {
        let mut chain = VersionChain::new();
        let budget = ChainBudget { max_count: 2, max_bytes: 0 };

        for (old, new) in [(10, 20), (20, 30), (30, 40)] {
            assert!(chain.make_space(SEGMENT_SIZE_HINT, budget));
            chain.insert(segment(old, new, 0));
        }

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.first().unwrap().old_serial, Serial::from(20));
        assert_eq!(chain.last().unwrap().old_serial, Serial::from(30));
    }

    #[test]
    fn zero_max_count_disables_storage() {
        let mut chain = VersionChain::new();
        let budget = ChainBudget::disabled();
        assert!(!chain.make_space(0, budget));
    }

    #[test]
    fn zero_max_bytes_means_no_byte_cap() {
        let mut chain = VersionChain::new();
        let budget = ChainBudget { max_count: 100, max_bytes: 0 };
        chain.insert(segment(10, 20, 1_000_000));
        assert!(chain.make_space(1_000_000, budget));
    }

    const SEGMENT_SIZE_HINT: usize = crate::segment::SEGMENT_HEADER_SIZE;
}
