//! Interprets the sideband meta/control stream's pause and resume markers.

const PAUSE_MARKER: &[u8] = br#"{"c":"pause"}"#;
const RESUME_MARKER: &[u8] = br#"{"c":"resume"}"#;

/// Tracks the in-flight pause, if any, on the meta stream.
///
/// The accumulated `granule_offset` itself is owned by the caller (it
/// starts life as the header region's "start epoch" and is only ever added
/// to from there), so this type mutates it in place rather than keeping its
/// own copy.
///
/// Exact string match only, no JSON parser: this mirrors the recorder's own
/// minimal marker format, and a permissive prefix match is preserved
/// deliberately (see `SPEC_FULL.md` / `DESIGN.md` open questions) since it
/// is unclear whether the recorder ever emits payloads that merely begin
/// with one of these markers.
#[derive(Debug, Default)]
pub(super) struct MetaTrack {
	pause_time: Option<u64>
}

impl MetaTrack {
	/// Feeds one meta-stream page's payload at the given granule position,
	/// adding any completed pause/resume span to `granule_offset`.
	///
	/// Malformed markers (anything that isn't a pause or resume match) are
	/// silently ignored, per `SPEC_FULL.md` §4.7. A pause that never
	/// resumes simply leaves `granule_offset` at its last value.
	pub(super) fn observe(&mut self, payload: &[u8], granule_pos: u64, granule_offset: &mut u64) {
		if payload.starts_with(PAUSE_MARKER) {
			self.pause_time = Some(granule_pos);
		} else if payload.starts_with(RESUME_MARKER) {
			if let Some(pause_time) = self.pause_time.take() {
				*granule_offset += granule_pos.saturating_sub(pause_time);
			}
		}
	}
}
