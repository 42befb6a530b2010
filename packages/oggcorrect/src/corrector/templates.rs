//! Payload templates for synthetic "zero" (silent) packets, keyed by codec.

use super::classify::Codec;

/// A minimal silent Opus packet: TOC byte `0xF8` (SILK NB, 20 ms, code 0),
/// with no further bytes.
pub(super) const ZERO_PACKET_OPUS: &[u8] = &[0xf8, 0xff, 0xfe];

/// A minimal silent FLAC frame at 48 kHz, matching the upstream recorder's
/// fixed-blocksize silent-frame template.
pub(super) const ZERO_PACKET_FLAC_48K: &[u8] =
	&[0xff, 0xf8, 0x7a, 0x0c, 0x00, 0x03, 0xbf, 0x94, 0x00, 0x00, 0x00, 0x00, 0xb1, 0xca];

/// The same, rescaled for a 44.1 kHz FLAC stream.
pub(super) const ZERO_PACKET_FLAC_44K: &[u8] =
	&[0xff, 0xf8, 0x79, 0x0c, 0x00, 0x03, 0x71, 0x56, 0x00, 0x00, 0x00, 0x00, 0x63, 0xc5];

/// Picks the right zero-packet template for `codec`.
pub(super) fn zero_packet_for(codec: Codec) -> &'static [u8] {
	match codec {
		Codec::Opus => ZERO_PACKET_OPUS,
		Codec::Flac { rate: 44_100 } => ZERO_PACKET_FLAC_44K,
		Codec::Flac { .. } => ZERO_PACKET_FLAC_48K
	}
}
