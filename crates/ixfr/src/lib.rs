//! Incremental zone transfer engine.
//!
//! This crate implements the three subsystems that make answering IXFR
//! queries (RFC 1995) possible: a per-zone [`chain::VersionChain`] of
//! difference [`segment::Segment`]s under a byte/count budget
//! ([`chain::ChainBudget`]), a [`streamer::Streamer`] that serialises a
//! selected run of segments into size-capped response packets, and a
//! [`persist`] module that keeps an on-disk file family in sync with the
//! in-memory chain. [`builder::SegmentBuilder`] is how an incoming transfer
//! turns into a committed segment; [`query`] ties the pieces together for an
//! inbound query.
//!
//! What this crate does *not* do: parse or encode whole DNS messages, apply
//! an incoming transfer to the zone's actual record tree, or sign outgoing
//! packets. Those are the host server's job; this crate consumes small,
//! explicit interfaces for them instead ([`persist::RrTextFormat`] for the
//! zone-format RR printer/parser, plain `Serial`/byte slices everywhere
//! else).

use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;

pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod persist;
pub mod query;
pub mod segment;
pub mod selector;
pub mod streamer;
pub mod util;
pub mod walker;

/// Atomically replace the contents of `path` with `contents`.
///
/// Writes to a temporary file in the same directory first, then renames it
/// into place, so a reader never observes a partially written file. Used by
/// [`persist::write_to_file`] for each IXFR file it produces.
pub(crate) fn atomic_write(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .expect("persistence paths are always validated to have a parent");
    fs::create_dir_all(dir)?;

    let mut tmp_file = tempfile::Builder::new().tempfile_in(dir)?;
    tmp_file.as_file_mut().write_all(contents)?;
    let _ = tmp_file.persist(path)?;

    Ok(())
}
