//! Resumable emission of a segment chain into size-capped response packets.
//!
//! The streamer itself never touches transport framing or message headers
//! (that's the host's wire codec, out of scope here per §1); it only decides,
//! given a size budget, which RR bytes go into the next packet and when the
//! whole reply is done.

use crate::segment::Segment;

/// The compression-offset cap from §4F: no packet may exceed this length.
pub const MAX_COMPRESSION_OFFSET: usize = 16384;

/// Which byte run inside the current segment the streamer is progressing
/// through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    OldSoa,
    Deleted,
    NewSoa,
    Added,
}

/// One packet's worth of output: the RRs to place in the answer section, plus
/// framing flags the host's wire codec needs to apply.
#[derive(Debug, Default)]
pub struct Packet {
    /// Answer-section RRs, in order, already in wire form.
    pub rrs: Vec<Vec<u8>>,

    /// Whether the TC bit must be set on this packet.
    pub truncated: bool,

    /// Whether this packet should be TSIG-signed (first + last, by default).
    pub sign: bool,
}

impl Packet {
    pub fn ancount(&self) -> u16 {
        self.rrs.len() as u16
    }
}

/// Per-query streaming state, re-entered once per outgoing packet.
pub struct Streamer<'c> {
    /// The full chain walked, oldest (starting) segment first.
    chain: Vec<&'c Segment>,
    segment_index: usize,
    cursor: Cursor,
    offset: usize,
    opening_soa_written: bool,
    first_packet: bool,
    done: bool,
    /// The maximum wire length of any one packet, `min(peer_max, 16384)`.
    max_len: usize,
    /// Whether this query is being answered over a connectionless transport;
    /// governs the truncate-to-one-SOA behaviour.
    datagram: bool,
}

impl<'c> Streamer<'c> {
    /// Begin streaming `chain`, a sequence of segments in serial order
    /// starting at the segment matching the query's `from_serial` and ending
    /// at the zone's current serial. `peer_max` is the negotiated maximum
    /// message size (EDNS or 512 for classic UDP); `datagram` marks whether
    /// truncation (rather than TCP continuation) applies if the reply
    /// doesn't fit.
    pub fn new(chain: Vec<&'c Segment>, peer_max: usize, datagram: bool) -> Self {
        Self {
            chain,
            segment_index: 0,
            cursor: Cursor::OldSoa,
            offset: 0,
            opening_soa_written: false,
            first_packet: true,
            done: false,
            max_len: peer_max.min(MAX_COMPRESSION_OFFSET),
            datagram,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Produce the next packet's worth of RRs.
    pub fn next_packet(&mut self) -> Packet {
        // Whether this call is producing the stream's very first packet.
        // Captured and consumed immediately: every other path below is an
        // early return, and `self.first_packet` must already read `false` on
        // the next call regardless of which path this one takes, or a packet
        // that merely filled up mid-stream would be mistaken for the first
        // packet again and get signed a second time.
        let is_first = self.first_packet;
        self.first_packet = false;

        let mut packet = Packet { sign: is_first, ..Packet::default() };
        let mut used = 0usize;

        if !self.opening_soa_written {
            let opening = self.final_new_soa();
            // The opening SOA is always written even if it alone would not
            // fit under `max_len` with strict margin; there is nothing
            // smaller to fall back to.
            used += opening.len();
            packet.rrs.push(opening.to_vec());
            self.opening_soa_written = true;

            if self.datagram && !self.fits_rest(used) {
                // Truncate to just the opening SOA, per §4F.
                packet.truncated = true;
                self.done = true;
                return packet;
            }
        }

        'outer: while self.segment_index < self.chain.len() {
            let segment = self.chain[self.segment_index];

            loop {
                let (rr, advance_cursor) = match self.cursor {
                    Cursor::OldSoa => (segment.old_soa_bytes.as_slice(), Cursor::Deleted),
                    Cursor::Deleted => {
                        if let Some(next) = next_rr_in(segment.deleted_bytes.as_slice(), self.offset) {
                            (next, Cursor::Deleted)
                        } else {
                            self.offset = 0;
                            self.cursor = Cursor::NewSoa;
                            continue;
                        }
                    }
                    Cursor::NewSoa => (segment.new_soa_bytes.as_slice(), Cursor::Added),
                    Cursor::Added => {
                        if let Some(next) = next_rr_in(segment.added_bytes.as_slice(), self.offset) {
                            (next, Cursor::Added)
                        } else {
                            // This segment is fully emitted; advance.
                            self.offset = 0;
                            self.cursor = Cursor::OldSoa;
                            self.segment_index += 1;
                            continue 'outer;
                        }
                    }
                };

                if used + rr.len() >= self.max_len {
                    // No room for this RR; return what we have so far.
                    return packet;
                }

                used += rr.len();
                packet.rrs.push(rr.to_vec());

                match self.cursor {
                    Cursor::OldSoa | Cursor::NewSoa => {
                        self.cursor = advance_cursor;
                        self.offset = 0;
                    }
                    Cursor::Deleted | Cursor::Added => {
                        self.offset += rr.len();
                    }
                }
            }
        }

        self.done = true;
        packet.sign = is_first || self.done;
        packet
    }

    fn final_new_soa(&self) -> &'c [u8] {
        self.chain
            .last()
            .expect("streamer constructed with an empty chain")
            .new_soa_bytes
            .as_slice()
    }

    /// Rough check for whether the remainder of the reply could possibly fit
    /// in one packet — used only to decide whether UDP truncation kicks in
    /// immediately after the opening SOA.
    fn fits_rest(&self, used_so_far: usize) -> bool {
        let mut total = used_so_far;
        for segment in &self.chain {
            total += segment.old_soa_bytes.len()
                + segment.deleted_bytes.len()
                + segment.new_soa_bytes.len()
                + segment.added_bytes.len();
            if total >= self.max_len {
                return false;
            }
        }
        true
    }
}

/// Pull the next whole RR out of `buf` starting at `offset`, or `None` if the
/// buffer is exhausted. RR framing is delegated to the byte walker so
/// malformed bytes never silently desync the cursor.
fn next_rr_in(buf: &[u8], offset: usize) -> Option<&[u8]> {
    if offset >= buf.len() {
        return None;
    }
    let len = crate::walker::rr_len(buf, offset).expect("segment bytes are pre-validated");
    Some(&buf[offset..offset + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::ByteRun;
    use domain::base::Serial;

    fn rr(tag: u8, len: usize) -> Vec<u8> {
        let mut buf = vec![0]; // root owner
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&(len as u16).to_be_bytes());
        buf.extend(std::iter::repeat(tag).take(len));
        buf
    }

    fn segment(old: u32, new: u32) -> Segment {
        let mut deleted = ByteRun::new();
        deleted.append(&rr(1, 4));
        deleted.append(&rr(2, 4));
        let mut added = ByteRun::new();
        added.append(&rr(3, 4));

        let mut old_soa = ByteRun::new();
        old_soa.append(&rr(9, 20));
        let mut new_soa = ByteRun::new();
        new_soa.append(&rr(8, 20));

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
    fn single_segment_streams_to_completion_in_one_packet() {
        let segment = segment(10, 20);
        let mut streamer = Streamer::new(vec![&segment], 16384, false);
        let packet = streamer.next_packet();
        assert!(streamer.is_done());
        // opening SOA, old-SOA, 2 deleted, new-SOA (section end), 1 added.
        assert_eq!(packet.rrs.len(), 1 + 1 + 2 + 1 + 1);
    }

    #[test]
    fn multi_segment_chain_streams_all_segments() {
        let a = segment(10, 20);
        let b = segment(20, 30);
        let mut streamer = Streamer::new(vec![&a, &b], 16384, false);
        let packet = streamer.next_packet();
        assert!(streamer.is_done());
        // opening SOA + 2 * (old-SOA + 2 deleted + new-SOA + 1 added)
        assert_eq!(packet.rrs.len(), 1 + 2 * (1 + 2 + 1 + 1));
    }

    #[test]
    fn oversized_reply_over_tcp_spans_multiple_packets() {
        let segment = segment(10, 20);
        let mut streamer = Streamer::new(vec![&segment], 40, false);
        let mut packets = Vec::new();
        loop {
            let packet = streamer.next_packet();
            let done = streamer.is_done();
            packets.push(packet);
            if done {
                break;
            }
        }
        assert!(packets.len() > 1);
    }

    #[test]
    fn only_the_first_and_last_packet_of_a_multi_packet_stream_are_signed() {
        let segment = segment(10, 20);
        let mut streamer = Streamer::new(vec![&segment], 40, false);
        let mut packets = Vec::new();
        loop {
            let packet = streamer.next_packet();
            let done = streamer.is_done();
            packets.push(packet);
            if done {
                break;
            }
        }
        assert!(packets.len() > 2, "test needs at least one unsigned middle packet");
        assert!(packets.first().unwrap().sign);
        assert!(packets.last().unwrap().sign);
        for packet in &packets[1..packets.len() - 1] {
            assert!(!packet.sign);
        }
    }

    #[test]
    fn oversized_reply_over_udp_truncates_to_opening_soa() {
        let segment = segment(10, 20);
        let mut streamer = Streamer::new(vec![&segment], 40, true);
        let packet = streamer.next_packet();
        assert!(streamer.is_done());
        assert!(packet.truncated);
        assert_eq!(packet.ancount(), 1);
    }
}
