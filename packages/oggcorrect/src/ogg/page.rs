//! Reading and writing single Ogg pages.
//!
//! Only the subset of RFC 3533 this system's upstream recorder actually
//! produces is supported: exactly one packet per page, no packets spanning
//! page boundaries. [`read_page`] and [`write_page`] are the two halves of
//! the codec; [`PageReader`] adds optional checksum verification with
//! resynchronization on top of [`read_page`].

use std::io::{self, Read, Write};

use log::warn;

use super::crc::crc32;

/// Page header `type` bit flags.
pub mod page_type {
	/// This page continues a packet from the previous page.
	pub const CONTINUED: u8 = 0x01;
	/// This is the first page of a logical bitstream.
	pub const BEGINNING_OF_STREAM: u8 = 0x02;
	/// This is the last page of a logical bitstream.
	pub const END_OF_STREAM: u8 = 0x04;
}

/// The fixed-size fields of an Ogg page header, excluding the capture
/// pattern, version and segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
	/// Bitwise-or of the [`page_type`] flags.
	pub page_type: u8,
	/// The granule position: a codec-defined time coordinate.
	pub granule_pos: u64,
	/// The logical bitstream serial number.
	pub stream_no: u32,
	/// The page sequence number within its logical bitstream.
	pub sequence_no: u32,
	/// The page checksum, as read from (or to be written to) the stream.
	pub crc: u32
}

/// A fully-decoded Ogg page: its header plus its single packet's payload
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
	/// This page's header fields.
	pub header: PageHeader,
	/// The packet payload carried by this page.
	pub payload: Vec<u8>
}

/// The outcome of attempting to read one page from a source.
#[derive(Debug)]
pub enum PageRead {
	/// A page was read in full.
	Page(Page),
	/// The source is at a clean end of stream: either no more bytes were
	/// available, or fewer bytes than a complete page were available. Per
	/// this system's error handling design, both are treated identically:
	/// clean termination of the current phase.
	Eof,
	/// Bytes were available but did not begin with the Ogg capture pattern.
	/// Callers that are not resynchronizing should treat this the same as
	/// [`PageRead::Eof`]: stop consuming, and use whatever was collected so
	/// far.
	BadMagic
}

const CAPTURE_PATTERN: &[u8; 5] = b"OggS\0";
const HEADER_LEN: usize = 21;

/// Reads zero or more bytes into `buf`, retrying until it is either full or
/// the source is exhausted.
///
/// Returns `Ok(true)` if `buf` was filled completely, `Ok(false)` if the
/// source ran out partway through (including immediately, with zero bytes
/// read) -- both cases the caller should treat as a short read / clean EOF.
fn fill_or_eof<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<bool> {
	let mut filled = 0;
	while filled < buf.len() {
		let read = src.read(&mut buf[filled..])?;
		if read == 0 {
			return Ok(false);
		}
		filled += read;
	}
	Ok(true)
}

/// Reads one page from `src`, assuming the next bytes in the stream are
/// either the start of a page or the end of the stream.
///
/// Does not attempt to resynchronize on a bad capture pattern; see
/// [`PageReader`] for that.
pub fn read_page<R: Read>(src: &mut R) -> io::Result<PageRead> {
	let mut magic = [0u8; 5];
	if !fill_or_eof(src, &mut magic)? {
		return Ok(PageRead::Eof);
	}
	if &magic != CAPTURE_PATTERN {
		return Ok(PageRead::BadMagic);
	}

	read_page_body(src)
}

/// Reads the header, segment table and payload of a page whose capture
/// pattern has already been consumed and verified.
fn read_page_body<R: Read>(src: &mut R) -> io::Result<PageRead> {
	let mut header_bytes = [0u8; HEADER_LEN];
	if !fill_or_eof(src, &mut header_bytes)? {
		return Ok(PageRead::Eof);
	}

	let header = decode_header(&header_bytes);

	let mut segment_count = [0u8; 1];
	if !fill_or_eof(src, &mut segment_count)? {
		return Ok(PageRead::Eof);
	}

	let mut lacing = vec![0u8; segment_count[0] as usize];
	if !lacing.is_empty() && !fill_or_eof(src, &mut lacing)? {
		return Ok(PageRead::Eof);
	}

	let payload_len: usize = lacing.iter().map(|&b| b as usize).sum();
	let mut payload = vec![0u8; payload_len];
	if !payload.is_empty() && !fill_or_eof(src, &mut payload)? {
		return Ok(PageRead::Eof);
	}

	Ok(PageRead::Page(Page { header, payload }))
}

fn decode_header(bytes: &[u8; HEADER_LEN]) -> PageHeader {
	PageHeader {
		page_type: bytes[0],
		granule_pos: u64::from_le_bytes(bytes[1..9].try_into().unwrap()),
		stream_no: u32::from_le_bytes(bytes[9..13].try_into().unwrap()),
		sequence_no: u32::from_le_bytes(bytes[13..17].try_into().unwrap()),
		crc: u32::from_le_bytes(bytes[17..21].try_into().unwrap())
	}
}

fn encode_header(header: &PageHeader) -> [u8; HEADER_LEN] {
	let mut bytes = [0u8; HEADER_LEN];
	bytes[0] = header.page_type;
	bytes[1..9].copy_from_slice(&header.granule_pos.to_le_bytes());
	bytes[9..13].copy_from_slice(&header.stream_no.to_le_bytes());
	bytes[13..17].copy_from_slice(&header.sequence_no.to_le_bytes());
	bytes[17..21].copy_from_slice(&header.crc.to_le_bytes());
	bytes
}

/// Builds the lacing (segment table) bytes for a packet of `payload_len`
/// bytes.
///
/// Always ends in a byte less than 255, even when `payload_len` is an exact
/// multiple of 255 -- unlike the upstream recorder, which omits the
/// terminating zero in that case. See `SPEC_FULL.md` / `DESIGN.md` for why
/// this is a deliberate fix rather than a faithful bug-for-bug port.
fn build_lacing(payload_len: usize) -> Vec<u8> {
	let mut lacing = vec![255u8; payload_len / 255];
	lacing.push((payload_len % 255) as u8);
	lacing
}

/// Writes one page to `dst`, computing its segment table and CRC.
///
/// `header.crc` is ignored on input; the correct checksum is computed and
/// written in its place.
pub fn write_page<W: Write>(dst: &mut W, header: &PageHeader, payload: &[u8]) -> io::Result<()> {
	let lacing = build_lacing(payload.len());
	let segment_count = [lacing.len() as u8];

	let mut zeroed_header = *header;
	zeroed_header.crc = 0;
	let header_bytes = encode_header(&zeroed_header);

	let mut crc = crc32(0, CAPTURE_PATTERN);
	crc = crc32(crc, &header_bytes);
	crc = crc32(crc, &segment_count);
	crc = crc32(crc, &lacing);
	crc = crc32(crc, payload);

	let mut final_header = *header;
	final_header.crc = crc;
	let final_header_bytes = encode_header(&final_header);

	dst.write_all(CAPTURE_PATTERN)?;
	dst.write_all(&final_header_bytes)?;
	dst.write_all(&segment_count)?;
	dst.write_all(&lacing)?;
	dst.write_all(payload)?;

	Ok(())
}

/// Recomputes a decoded page's CRC and compares it against the stored
/// value.
fn crc_is_valid(page: &Page) -> bool {
	let lacing = build_lacing(page.payload.len());
	let segment_count = [lacing.len() as u8];

	let mut zeroed_header = page.header;
	zeroed_header.crc = 0;
	let header_bytes = encode_header(&zeroed_header);

	let mut crc = crc32(0, CAPTURE_PATTERN);
	crc = crc32(crc, &header_bytes);
	crc = crc32(crc, &segment_count);
	crc = crc32(crc, &lacing);
	crc = crc32(crc, &page.payload);

	crc == page.header.crc
}

/// Scans `src` byte by byte for the next occurrence of the Ogg capture
/// pattern, discarding everything before it.
///
/// Returns `Ok(true)` if the pattern was found, `Ok(false)` on end of
/// stream.
fn resync<R: Read>(src: &mut R) -> io::Result<bool> {
	let mut window = [0u8; 5];
	let mut filled = 0usize;
	let mut byte = [0u8; 1];

	loop {
		if src.read(&mut byte)? == 0 {
			return Ok(false);
		}

		if filled < window.len() {
			window[filled] = byte[0];
			filled += 1;
		} else {
			window.copy_within(1.., 0);
			*window.last_mut().unwrap() = byte[0];
		}

		if filled == window.len() && &window == CAPTURE_PATTERN {
			return Ok(true);
		}
	}
}

/// A page reader that optionally verifies page checksums, resynchronizing
/// on the raw byte stream when a checksum does not match.
///
/// Grounded in the teacher lineage's `verify_ogg_page_checksums` setting:
/// disabled by default, since the upstream recorder's captures are assumed
/// intact, but available for inputs of uncertain provenance.
pub struct PageReader<R> {
	inner: R,
	verify_crc: bool
}

impl<R: Read> PageReader<R> {
	/// Wraps `inner`, optionally verifying every page's checksum.
	pub fn new(inner: R, verify_crc: bool) -> Self {
		Self { inner, verify_crc }
	}

	/// Reads the next page, transparently resynchronizing past any page
	/// that fails checksum verification when that is enabled.
	pub fn read_page(&mut self) -> io::Result<PageRead> {
		loop {
			match read_page(&mut self.inner)? {
				PageRead::Page(page) => {
					if self.verify_crc && !crc_is_valid(&page) {
						warn!(
							"page for stream {} sequence {} failed CRC verification, \
							 resynchronizing",
							page.header.stream_no, page.header.sequence_no
						);
						if !resync(&mut self.inner)? {
							return Ok(PageRead::Eof);
						}
						match read_page_body(&mut self.inner)? {
							PageRead::Page(page) if !crc_is_valid(&page) => continue,
							other => return Ok(other)
						}
					} else {
						return Ok(PageRead::Page(page));
					}
				}
				other => return Ok(other)
			}
		}
	}
}
