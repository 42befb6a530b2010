//! The re-timer: walks the blocks marked by [`super::plan::mark_blocks`] and
//! assigns each retained packet an output granule position, inserting gap
//! `pre_skip` counts or dropping packets as needed to keep real time
//! aligned with intended time.

use super::plan::{Packet, PACKET_TIME};

const GAP_THRESHOLD: u64 = 25 * PACKET_TIME;

/// Collects `(start, end)` index ranges for each block marked in `packets`.
fn block_ranges(packets: &[Packet]) -> Vec<(usize, usize)> {
	let mut ranges = Vec::new();
	let mut start = None;

	for (i, packet) in packets.iter().enumerate() {
		if packet.flags.begin {
			start = Some(i);
		}
		if packet.flags.end {
			if let Some(start) = start.take() {
				ranges.push((start, i));
			}
		}
	}

	ranges
}

/// Runs the re-timer over `packets`, which must already have block
/// boundaries marked. Assigns `pre_skip`, `output_granule_pos` and `drop`
/// flags in place.
pub(super) fn retime(packets: &mut [Packet]) {
	let ranges = block_ranges(packets);
	let mut granule_pos: u64 = 0;

	for &(start, end) in &ranges {
		close_inter_block_gap(packets, start, &mut granule_pos);
		trim_leading_silence(packets, start, end, &mut granule_pos);
		assign_block(packets, start, end, &mut granule_pos);
	}
}

/// If the block starting at `start` begins further ahead than `granule_pos`
/// has reached, inserts a `pre_skip` on its first packet to close the gap.
/// This is the same rule the very first block's initial `pre_skip` follows,
/// since `granule_pos` starts at zero.
fn close_inter_block_gap(packets: &mut [Packet], start: usize, granule_pos: &mut u64) {
	let first_input = packets[start].input_granule_pos;
	if first_input > *granule_pos {
		let diff = first_input - *granule_pos;
		let pre_skip = diff / PACKET_TIME;
		packets[start].pre_skip = pre_skip;
		*granule_pos += pre_skip * PACKET_TIME;
	}
}

/// For a silent block whose actual granule span falls short of what was
/// expected, first gives back the block's leading `pre_skip`, then drops
/// leading packets, until the shortfall is absorbed or there is nothing
/// left to trim.
///
/// Giving back one unit of `pre_skip` also rolls `granule_pos` back by the
/// block's leading packet's `frame_size` (clamped at zero), matching the
/// original source exactly: note that this is `frame_size`, not
/// `PACKET_TIME`, even though `pre_skip` itself was accumulated in
/// `PACKET_TIME` units by [`close_inter_block_gap`] -- a quirk of the
/// original this reimplementation preserves rather than "fixes", since nothing
/// in this system's invariants depends on the two units matching and
/// silent-block leading packets are conventionally nominal 20 ms packets
/// anyway (`frame_size == PACKET_TIME`).
fn trim_leading_silence(packets: &mut [Packet], start: usize, end: usize, granule_pos: &mut u64) {
	if !packets[start].flags.silent {
		return;
	}

	let ct: u64 = packets[start..=end].iter().map(|p| u64::from(p.frames_in_packet)).sum();
	let mut expected = *granule_pos + ct * PACKET_TIME;
	let last = &packets[end];
	let actual = last.input_granule_pos + last.duration();

	if actual >= expected {
		return;
	}

	let mut slack = expected - actual;
	let mut idx = start;

	while slack > 0 {
		if packets[start].pre_skip > 0 {
			packets[start].pre_skip -= 1;
			let step = u64::from(packets[start].frame_size);
			expected = expected.saturating_sub(step);
			*granule_pos = granule_pos.saturating_sub(step);
			slack = slack.saturating_sub(step);
		} else if idx <= end {
			packets[idx].flags.drop = true;
			let dur = packets[idx].duration();
			expected = expected.saturating_sub(dur);
			slack = slack.saturating_sub(dur);
			idx += 1;
		} else {
			break;
		}
	}
}

/// Assigns `output_granule_pos` (or `drop`) to every non-dropped packet in
/// the block, advancing `granule_pos` as it goes.
fn assign_block(packets: &mut [Packet], start: usize, end: usize, granule_pos: &mut u64) {
	for i in start..=end {
		if packets[i].flags.drop {
			continue;
		}

		let input = packets[i].input_granule_pos;

		if *granule_pos + GAP_THRESHOLD < input {
			// Too little data has been emitted so far: open a gap.
			let diff = input - *granule_pos;
			let pre_skip = diff / PACKET_TIME;
			packets[i].pre_skip = pre_skip;
			*granule_pos += pre_skip * PACKET_TIME;
			packets[i].output_granule_pos = *granule_pos;
			*granule_pos += u64::from(packets[i].frames_in_packet) * PACKET_TIME;
		} else if *granule_pos > input + 25 * u64::from(packets[i].frame_size) {
			// Too much data has been emitted so far: drop this packet.
			packets[i].flags.drop = true;
		} else {
			packets[i].output_granule_pos = *granule_pos;
			*granule_pos += packets[i].duration();
		}
	}
}

/// Rescales every assigned `output_granule_pos` from the 48 kHz wire
/// granule clock to 44.1 kHz, for streams where `flac_rate == 44100`.
pub(super) fn apply_flac_44k_rescale(packets: &mut [Packet]) {
	for packet in packets {
		packet.output_granule_pos = packet.output_granule_pos * 147 / 160;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::corrector::plan::{mark_blocks, PacketFlags};

	fn voiced(input_granule_pos: u64) -> Packet {
		Packet {
			flags: PacketFlags::default(),
			frames_in_packet: 1,
			frame_size: 960,
			pre_skip: 0,
			input_granule_pos,
			output_granule_pos: 0,
			payload: Vec::new()
		}
	}

	#[test_log::test]
	fn perfectly_paced_stream_keeps_input_granules() {
		let mut packets = vec![voiced(960), voiced(1920), voiced(2880)];
		mark_blocks(&mut packets);
		retime(&mut packets);

		assert_eq!(packets[0].output_granule_pos, 960);
		assert_eq!(packets[1].output_granule_pos, 1920);
		assert_eq!(packets[2].output_granule_pos, 2880);
		assert_eq!(packets[0].pre_skip, 0);
	}

	#[test_log::test]
	fn large_gap_opens_a_pre_skip_on_the_following_packet() {
		// Matches the worked example in SPEC_FULL.md §8, scenario 2.
		let mut packets = vec![voiced(960), voiced(960 + 96_000)];
		mark_blocks(&mut packets);
		retime(&mut packets);

		assert_eq!(packets[0].output_granule_pos, 960);
		assert_eq!(packets[1].pre_skip, 99);
		assert_eq!(packets[1].output_granule_pos, 96_960);
	}

	#[test_log::test]
	fn gap_branch_advances_granule_pos_by_frames_times_packet_time() {
		// A packet with a non-nominal frame size (60 ms, 2 frames) landing
		// after a gap large enough to open the "too little data" branch.
		// Advancing by `frames_in_packet * frame_size` here instead of
		// `frames_in_packet * PACKET_TIME` would make the clock run ahead
		// of real time for any frame size other than the nominal 20 ms one.
		let mut packets = vec![Packet {
			flags: PacketFlags {
				begin: true,
				end: true,
				..Default::default()
			},
			frames_in_packet: 2,
			frame_size: 2880,
			pre_skip: 0,
			input_granule_pos: 100_000,
			output_granule_pos: 0,
			payload: Vec::new()
		}];
		let mut granule_pos = 0u64;

		assign_block(&mut packets, 0, 0, &mut granule_pos);

		assert!(packets[0].pre_skip > 0);
		assert_eq!(granule_pos, packets[0].output_granule_pos + 2 * PACKET_TIME);
	}

	#[test_log::test]
	fn flac_44k_rescale_applies_147_over_160() {
		let mut packets = vec![voiced(960)];
		mark_blocks(&mut packets);
		retime(&mut packets);
		apply_flac_44k_rescale(&mut packets);

		assert_eq!(packets[0].output_granule_pos, 960 * 147 / 160);
	}

	fn silent(input_granule_pos: u64, pre_skip: u64) -> Packet {
		Packet {
			flags: PacketFlags {
				silent: true,
				..Default::default()
			},
			frames_in_packet: 1,
			frame_size: 960,
			pre_skip,
			input_granule_pos,
			output_granule_pos: 0,
			payload: Vec::new()
		}
	}

	#[test_log::test]
	fn leading_silence_trim_gives_back_pre_skip_before_dropping() {
		// A 3-packet silent block whose last packet's actual granule span
		// (1960) falls 1920 samples short of what 3 full 20 ms packets
		// starting at granule_pos 1000 would expect (3880). With 2 units of
		// pre_skip to give back, the shortfall is fully absorbed without
		// dropping any packet.
		let mut packets = vec![silent(1_000, 5), silent(1_000, 0), silent(1_000, 0)];
		let mut granule_pos = 1_000u64;

		trim_leading_silence(&mut packets, 0, 2, &mut granule_pos);

		assert_eq!(packets[0].pre_skip, 3);
		assert_eq!(granule_pos, 0);
		assert!(!packets.iter().any(|p| p.flags.drop));
	}

	#[test_log::test]
	fn leading_silence_trim_drops_leading_packets_when_no_pre_skip_remains() {
		// Same shortfall as above, but the leading packet has no pre_skip to
		// give back: the shortfall is instead absorbed by dropping leading
		// packets, and granule_pos is left untouched (only the pre_skip
		// give-back branch rolls it back).
		let mut packets = vec![silent(1_000, 0), silent(1_000, 0), silent(1_000, 0)];
		let mut granule_pos = 1_000u64;

		trim_leading_silence(&mut packets, 0, 2, &mut granule_pos);

		assert!(packets[0].flags.drop);
		assert!(packets[1].flags.drop);
		assert!(!packets[2].flags.drop);
		assert_eq!(granule_pos, 1_000);
	}
}
