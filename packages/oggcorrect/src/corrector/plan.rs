//! The owned packet list the Plan Builder assembles, and the block-marking
//! pass that partitions it into contiguous re-timing units.
//!
//! The original tool holds this as a singly-linked list mutated in place
//! during two passes. Here it is a plain `Vec<Packet>` with block
//! boundaries recorded as indices, which lets the re-timer walk backward
//! for the leading-silence trim without any pointer bookkeeping.

/// One packet's flags: a small, independent set of booleans rather than a
/// bitmask, since Rust has no use for the original's bit-flag encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags {
	/// First packet of a block.
	pub begin: bool,
	/// Last packet of a block.
	pub end: bool,
	/// Classified as silence.
	pub silent: bool,
	/// Marked for removal by the re-timer; never emitted.
	pub drop: bool
}

/// One packet collected from `keep_stream_no`'s data pages.
#[derive(Debug, Clone)]
pub struct Packet {
	/// This packet's flags, set by block marking and mutated once by the
	/// re-timer.
	pub flags: PacketFlags,
	/// Number of audio frames this packet encodes.
	pub frames_in_packet: u32,
	/// Samples per frame at 48 kHz.
	pub frame_size: u32,
	/// Count of synthetic zero packets to emit before this one, assigned by
	/// the re-timer.
	pub pre_skip: u64,
	/// Observed granule position, already corrected for `granule_offset`.
	pub input_granule_pos: u64,
	/// Assigned granule position in the output time base, filled in by the
	/// re-timer.
	pub output_granule_pos: u64,
	/// The packet's payload bytes, with any VAD prefix already stripped.
	pub payload: Vec<u8>
}

impl Packet {
	/// Total duration of this packet, in samples at 48 kHz.
	pub(super) fn duration(&self) -> u64 {
		u64::from(self.frames_in_packet) * u64::from(self.frame_size)
	}
}

/// Samples per Opus frame at the nominal 20 ms frame time; the unit the
/// re-timer's gap and drift thresholds are expressed in.
pub(super) const PACKET_TIME: u64 = 960;

/// Marks `BEGIN`/`END` block boundaries over `packets`, front to back.
///
/// A block is a maximal run of non-silent packets whose consecutive input
/// granule positions are within `25 * PACKET_TIME` of each other, or a
/// maximal run of silent packets. See `SPEC_FULL.md` §4.4.
pub(super) fn mark_blocks(packets: &mut [Packet]) {
	if packets.is_empty() {
		return;
	}

	let gap_threshold = 25 * PACKET_TIME;
	let mut i = 0;

	// The very first packet always starts its block by the voiced-run
	// rule, even when it is itself silent: `oggcorrect.c`'s outer loop only
	// ever tests the *next* packet's SILENT flag when deciding whether to
	// extend a block, never the current one's, and every later "fresh"
	// starting point is reached only after closing out a contiguous run
	// (so it is never itself silent there). The one place this shows up is
	// right here: a silent first packet gets marked as a singleton block by
	// itself, and the rest of its silent run becomes a separate block
	// below, rather than the whole run merging into one.
	if packets[0].flags.silent {
		packets[0].flags.begin = true;
		packets[0].flags.end = true;
		i = 1;
	}

	while i < packets.len() {
		packets[i].flags.begin = true;

		if packets[i].flags.silent {
			// A silent block: absorb contiguous silent neighbors.
			let mut j = i;
			while j + 1 < packets.len() && packets[j + 1].flags.silent {
				j += 1;
			}
			packets[j].flags.end = true;
			i = j + 1;
		} else {
			// A voiced block: absorb contiguous non-silent packets within
			// the gap threshold of the previous one.
			let mut j = i;
			while j + 1 < packets.len()
				&& !packets[j + 1].flags.silent
				&& packets[j + 1].input_granule_pos.saturating_sub(packets[j].input_granule_pos) <= gap_threshold
			{
				j += 1;
			}
			packets[j].flags.end = true;
			i = j + 1;
		}
	}
}
