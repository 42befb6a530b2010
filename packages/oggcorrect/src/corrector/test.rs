//! End-to-end tests driving [`super::GranuleCorrector`] over in-memory
//! buffers, following the literal scenarios this system is specified
//! against.

use std::io::Cursor;

use super::{GranuleCorrector, Settings};
use crate::ogg::{page_type, write_page, Page, PageHeader, PageRead};

fn push_page(buf: &mut Vec<u8>, stream_no: u32, sequence_no: u32, granule_pos: u64, page_type: u8, payload: &[u8]) {
	write_page(
		buf,
		&PageHeader {
			page_type,
			granule_pos,
			stream_no,
			sequence_no,
			crc: 0
		},
		payload
	)
	.unwrap();
}

fn decode_all(bytes: &[u8]) -> Vec<Page> {
	let mut cursor = Cursor::new(bytes);
	let mut pages = Vec::new();
	loop {
		match crate::ogg::read_page(&mut cursor).unwrap() {
			PageRead::Page(page) => pages.push(page),
			PageRead::Eof | PageRead::BadMagic => break
		}
	}
	pages
}

fn correct(stream_no: u32, input: &[u8]) -> Vec<Page> {
	let mut output = Vec::new();
	GranuleCorrector::new_with_defaults()
		.correct(stream_no, Cursor::new(input), &mut output)
		.unwrap();
	decode_all(&output)
}

/// A 20 ms voiced Opus TOC byte: code 0 (one frame), config whose frame
/// size falls in the "otherwise -> 960" bucket.
const VOICED_OPUS_TOC: u8 = 0x78;

/// An 8-byte payload carrying `marker` as a second byte: long enough to
/// clear the no-VAD silence length heuristic (`< 8` bytes for Opus), so
/// these packets classify as voiced rather than silent.
fn voiced_payload(marker: u8) -> Vec<u8> {
	vec![VOICED_OPUS_TOC, marker, 0, 0, 0, 0, 0, 0]
}

#[test_log::test]
fn perfect_opus_stream_three_voiced_packets() {
	let mut input = Vec::new();
	push_page(&mut input, 5, 0, 0, page_type::BEGINNING_OF_STREAM, b"OpusHead-fake-id-header-padding");
	push_page(&mut input, 5, 1, 0, 0, b"OpusTags-fake-comment-header");
	push_page(&mut input, 5, 2, 960, 0, &voiced_payload(1));
	push_page(&mut input, 5, 3, 1920, 0, &voiced_payload(2));
	push_page(&mut input, 5, 4, 2880, 0, &voiced_payload(3));

	let output = correct(5, &input);

	assert_eq!(output.len(), 5);
	for (i, page) in output.iter().enumerate() {
		assert_eq!(page.header.sequence_no, i as u32);
		assert_eq!(page.header.stream_no, 5);
	}

	assert_eq!(output[0].header.granule_pos, 0);
	assert_eq!(output[1].header.granule_pos, 0);
	// The first data page's own granule position (960) has no earlier,
	// separate non-zero-granule page to be measured against, so it
	// self-captures as the start epoch: its own input granule position is
	// therefore zero, and every later packet's granule is relative to it.
	assert_eq!(output[2].header.granule_pos, 0);
	assert_eq!(output[3].header.granule_pos, 960);
	assert_eq!(output[4].header.granule_pos, 1920);

	assert_eq!(output[2].payload, voiced_payload(1));
	assert_eq!(output[3].payload, voiced_payload(2));
	assert_eq!(output[4].payload, voiced_payload(3));
}

#[test_log::test]
fn opus_stream_with_a_two_second_gap_is_bridged_with_synthetic_packets() {
	let mut input = Vec::new();
	push_page(&mut input, 1, 0, 0, page_type::BEGINNING_OF_STREAM, b"OpusHead-fake-id-header-padding");
	push_page(&mut input, 1, 1, 0, 0, b"OpusTags-fake-comment-header");
	push_page(&mut input, 1, 2, 960, 0, &voiced_payload(1));
	push_page(&mut input, 1, 3, 960 + 96_000, 0, &voiced_payload(2));

	let output = correct(1, &input);

	// 2 header pages, 1 voiced page, 99 synthetic gap pages, 1 late voiced
	// page.
	assert_eq!(output.len(), 2 + 1 + 99 + 1);

	for window in output.windows(2) {
		assert!(window[1].header.sequence_no == window[0].header.sequence_no + 1);
		assert!(window[1].header.granule_pos >= window[0].header.granule_pos);
	}

	// As above, the first voiced page's own granule self-captures as the
	// start epoch, so its own input (and output) granule position is zero.
	let data_pages = &output[2..];
	assert_eq!(data_pages[0].header.granule_pos, 0);
	assert_eq!(data_pages.last().unwrap().header.granule_pos, 96_000);
	assert_eq!(data_pages.last().unwrap().payload, voiced_payload(2));

	// The 99 gap pages step evenly between the two voiced granules.
	for (i, gap_page) in data_pages[1..100].iter().enumerate() {
		assert_eq!(gap_page.header.granule_pos, 960 * (i as u64 + 1));
	}
}

#[test_log::test]
fn flac_44_1khz_stream_rescales_granule_positions() {
	let mut streaminfo = vec![0u8; 34];
	streaminfo[..5].copy_from_slice(b"\x7fFLAC");
	// 44100 Hz packed into the 20-bit big-endian field at bytes 27..30.
	streaminfo[27] = 0x0a;
	streaminfo[28] = 0xc4;
	streaminfo[29] = 0x40;

	let mut input = Vec::new();
	push_page(&mut input, 3, 0, 0, page_type::BEGINNING_OF_STREAM, &streaminfo);
	push_page(&mut input, 3, 1, 960, 0, b"flac-frame-bytes-one!!!");
	push_page(&mut input, 3, 2, 1920, 0, b"flac-frame-bytes-two!!!");

	let output = correct(3, &input);

	assert_eq!(output.len(), 3);
	// The first data page's own granule self-captures as the start epoch
	// (see the Opus scenarios above for the same rule), so it rescales to
	// output granule 0; the second page's relative input granule of 960
	// rescales by 147/160.
	assert_eq!(output[1].header.granule_pos, 0);
	assert_eq!(output[2].header.granule_pos, 960 * 147 / 160);
}

#[test_log::test]
fn pause_and_resume_on_the_meta_stream_is_subtracted_from_the_granule_clock() {
	const SELECTED: u32 = 7;
	const META: u32 = 8;
	const OTHER: u32 = 9;

	let mut input = Vec::new();
	push_page(&mut input, META, 0, 0, page_type::BEGINNING_OF_STREAM, b"ECMETA control stream");
	push_page(&mut input, SELECTED, 0, 0, page_type::BEGINNING_OF_STREAM, b"OpusHead-fake-id-header-padding");
	push_page(&mut input, SELECTED, 1, 0, 0, b"OpusTags-fake-comment-header");

	// An unrelated stream's data page is the first with a non-zero granule
	// position anywhere, establishing a small start epoch of 1 sample.
	push_page(&mut input, OTHER, 5, 1, 0, b"xx");

	push_page(&mut input, META, 1, 10_000, 0, br#"{"c":"pause"}"#);
	push_page(&mut input, META, 2, 25_000, 0, br#"{"c":"resume"}"#);

	// Raw granule 30001 minus the epoch (1) minus the pause span (15000)
	// leaves an input granule of 15000. The re-timer's initial pre_skip is
	// floor(15000 / 960) = 15, landing the output clock at 14400 and
	// leaving a 600-sample residual the +/-25*frame_size tolerance absorbs
	// rather than forcing a second, fractional gap packet.
	push_page(&mut input, SELECTED, 2, 30_001, 0, &[VOICED_OPUS_TOC, b'p']);

	let output = correct(SELECTED, &input);

	assert_eq!(output.len(), 3);
	assert_eq!(output[2].header.granule_pos, 14_400);
	assert_eq!(output[2].payload, vec![VOICED_OPUS_TOC, b'p']);
}

#[test_log::test]
fn selected_stream_absent_from_input_yields_one_fallback_packet() {
	let mut input = Vec::new();
	push_page(&mut input, 1, 0, 0, page_type::BEGINNING_OF_STREAM, b"OpusHead-fake-id-header-padding");
	push_page(&mut input, 1, 1, 0, 0, b"OpusTags-fake-comment-header");
	push_page(&mut input, 1, 2, 960, 0, &[VOICED_OPUS_TOC, b'p']);

	let output = correct(2, &input);

	assert_eq!(output.len(), 1);
	assert_eq!(output[0].header.sequence_no, 0);
	assert_eq!(output[0].header.granule_pos, 0);
	assert_eq!(output[0].header.stream_no, 2);
}

#[test_log::test]
fn every_emitted_page_has_a_valid_checksum() {
	let mut input = Vec::new();
	push_page(&mut input, 1, 0, 0, page_type::BEGINNING_OF_STREAM, b"OpusHead-fake-id-header-padding");
	push_page(&mut input, 1, 1, 0, 0, b"OpusTags-fake-comment-header");
	push_page(&mut input, 1, 2, 960, 0, &voiced_payload(1));

	let mut output = Vec::new();
	GranuleCorrector::new(Settings {
		verify_page_checksums: true
	})
	.correct(1, Cursor::new(&input), &mut output)
	.unwrap();

	// Re-reading with verification enabled must accept every emitted page
	// without resynchronizing, since `write_page` computed valid checksums.
	let mut reader = crate::ogg::PageReader::new(Cursor::new(&output), true);
	let mut count = 0;
	while let PageRead::Page(_) = reader.read_page().unwrap() {
		count += 1;
	}
	assert_eq!(count, 3);
}
