//! Per-packet classification: Opus TOC decoding, FLAC STREAMINFO parsing,
//! and recognition of the recorder's sideband wrappers.

/// Which audio codec a logical stream carries.
///
/// A tagged dispatch rather than a trait hierarchy: there are exactly two
/// codecs this system ever sees, and the difference between them is a
/// handful of constants (frame size, silence threshold, zero-packet
/// template), not behavior worth a vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
	/// Opus audio; granule time base is always 48 kHz.
	Opus,
	/// FLAC audio at the given sample rate (typically 44100 or 48000). The
	/// granule time base on the wire is always 48 kHz regardless of `rate`;
	/// see [`super::retime`] for the 44.1 kHz rescaling this implies.
	Flac {
		/// Sample rate read from STREAMINFO.
		rate: u32
	}
}

impl Default for Codec {
	/// Opus is the common case, and the only one known without having seen
	/// a FLAC STREAMINFO header.
	fn default() -> Self {
		Self::Opus
	}
}

/// The result of classifying one data packet's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
	/// Number of audio frames this packet encodes (Opus: 1-48; FLAC: 1).
	pub frames_in_packet: u32,
	/// Samples per frame at 48 kHz.
	pub frame_size: u32,
	/// Whether this packet should be treated as silence for block-boundary
	/// purposes.
	pub silent: bool
}

/// Decodes an Opus TOC byte into `(frames_in_packet, frame_size)`, per
/// [RFC 6716] section 3.1.
///
/// Returns `None` if `payload` is empty.
///
/// [RFC 6716]: https://www.rfc-editor.org/rfc/rfc6716
fn decode_opus_toc(payload: &[u8]) -> Option<(u32, u32)> {
	let toc = *payload.first()?;

	let frames_in_packet = match toc & 0x3 {
		0 => 1,
		1 | 2 => 2,
		// Code 3: the next byte's low 6 bits give the frame count. A
		// missing continuation byte is treated as a single frame rather
		// than rejecting the packet outright, matching this system's
		// general policy of tolerating malformed input in place.
		_ => u32::from(payload.get(1).copied().unwrap_or(1) & 0x3f).max(1)
	};

	let frame_size = match toc >> 3 {
		0 | 4 | 8 | 12 | 14 | 18 | 22 | 26 | 30 => 480,
		2 | 6 | 10 => 1920,
		3 | 7 | 11 => 2880,
		17 | 21 | 25 | 29 => 240,
		16 | 20 | 24 | 28 => 120,
		_ => 960
	};

	Some((frames_in_packet, frame_size))
}

/// Extracts the sample rate from a FLAC STREAMINFO header payload, if
/// `payload` looks like one.
pub(super) fn parse_flac_streaminfo_rate(payload: &[u8]) -> Option<u32> {
	if payload.len() >= 30 && payload.starts_with(b"\x7fFLAC") {
		Some((u32::from(payload[27]) << 12) | (u32::from(payload[28]) << 4) | (u32::from(payload[29]) >> 4))
	} else {
		None
	}
}

/// Returns whether `payload` begins with a recognized codec header magic:
/// `"Opus"` (covers both `OpusHead` and `OpusTags`), FLAC's `"\x7fFLAC"`, or
/// the recorder's `"\x04\x00\x00\x41"` marker.
///
/// Used only to decide whether a header page is worth re-emitting; a
/// mismatch is tolerated, not an error (see `SPEC_FULL.md` §7).
pub(super) fn looks_like_codec_header(payload: &[u8]) -> bool {
	payload.starts_with(b"Opus") || payload.starts_with(b"\x7fFLAC") || payload.starts_with(&[0x04, 0x00, 0x00, 0x41])
}

/// A recognized sideband wrapper applied by the upstream recorder to a
/// stream's data pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct VadWrapper {
	/// Number of leading bytes of the *header page's* payload to strip to
	/// reach the real codec header.
	pub skip: usize,
	/// VAD threshold: a data page's prefix byte strictly below this value
	/// is silence.
	pub threshold: u8
}

/// Detects an `"ECVADD"` wrapper on a header page's payload.
pub(super) fn detect_ecvadd(payload: &[u8]) -> Option<VadWrapper> {
	if payload.len() >= 11 && payload.starts_with(b"ECVADD") {
		let extra = u16::from_le_bytes([payload[6], payload[7]]);
		Some(VadWrapper {
			skip: 8 + usize::from(extra),
			threshold: payload[10]
		})
	} else {
		None
	}
}

/// Detects the `"ECMETA"` marker that identifies the meta/control stream.
pub(super) fn is_meta_stream_header(payload: &[u8]) -> bool {
	payload.starts_with(b"ECMETA")
}

/// Detects the `"STREAMNOTE"` marker. Note streams are handled by a
/// separate, out-of-scope tool; this system only needs to recognize and
/// ignore them.
pub(super) fn is_note_stream_header(payload: &[u8]) -> bool {
	payload.starts_with(b"STREAMNOTE")
}

/// Classifies one data packet's payload (with any VAD prefix already
/// stripped by the caller).
///
/// `vad` is `Some((byte, threshold))` when the stream carries a VAD prefix;
/// `byte` is that packet's prefix value. Without VAD information, silence
/// is inferred from payload length alone, per `SPEC_FULL.md` §4.3.
pub(super) fn classify_packet(codec: Codec, payload: &[u8], vad: Option<(u8, u8)>) -> Classification {
	let (frames_in_packet, frame_size) = match codec {
		Codec::Opus => decode_opus_toc(payload).unwrap_or((1, 960)),
		Codec::Flac { .. } => (1, 960)
	};

	let silent = match vad {
		Some((byte, threshold)) => byte < threshold,
		None => {
			let silence_threshold = if matches!(codec, Codec::Flac { .. }) { 16 } else { 8 };
			payload.len() < silence_threshold
		}
	};

	Classification {
		frames_in_packet,
		frame_size,
		silent
	}
}
