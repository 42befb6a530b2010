//! `oggcorrect` is a Rust library implementing the timestamp-correction and
//! gap-filling engine for a single selected logical stream inside a
//! multi-track Ogg recording (each logical stream carrying Opus or FLAC
//! audio packets, optionally alongside application-specific metadata).
//!
//! It reassembles a selected stream's data pages, repairs drifted or
//! missing timestamps, and fills real silence gaps with synthetic packets,
//! so that downstream transcoders observe monotonic, gap-free Ogg data
//! suitable for synchronous mixing with other tracks from the same
//! recording.
//!
//! # Entry point
//!
//! [`GranuleCorrector`] is the only entry point this crate exposes at the
//! top level. It reads a concatenation of Ogg pages from any
//! [`std::io::Read`] and writes the selected stream's corrected pages to
//! any [`std::io::Write`]; see its documentation for the full contract.
//!
//! The building blocks it is assembled from -- the [`ogg`] page codec, and
//! the packet classifier, plan builder, re-timer and meta-track
//! interpreter inside [`corrector`] -- are also exposed, for callers that
//! want to reuse just one piece (for example, a future compatibility-mode
//! binary implementing the simpler per-packet drift corrector described in
//! `SPEC_FULL.md`'s open questions).
//!
//! # What this does not do
//!
//! This crate does not decode audio, resample PCM, or understand any codec
//! beyond the bytes needed to derive packet durations and recognize
//! silence. It does not support Ogg streams whose packets span multiple
//! pages, multiplexed containers holding more than the handful of
//! recognized logical stream roles, or big-endian hosts.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://crates.io/crates/log) crate for
//! logging status and diagnostic messages to any interested consumer.
//! Executables can customize the verbosity of this logging, and even
//! compile it out, [as explained in the `log` crate
//! documentation](https://docs.rs/log/0.4/log).
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use oggcorrect::GranuleCorrector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let captured_ogg_bytes: Vec<u8> = Vec::new();
//! let mut source = Cursor::new(captured_ogg_bytes);
//! let mut sink = Vec::new();
//!
//! GranuleCorrector::new_with_defaults().correct(0, &mut source, &mut sink)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![deny(non_ascii_idents)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unimplemented)]
#![warn(explicit_outlives_requirements)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(unused_import_braces)]
#![warn(unused_qualifications)]
#![warn(variant_size_differences)]
#![warn(clippy::empty_enum)]
#![warn(clippy::enum_glob_use)]
#![warn(clippy::float_cmp_const)]
#![warn(clippy::invalid_upcast_comparisons)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::use_self)]
#![warn(clippy::used_underscore_binding)]
#![warn(clippy::redundant_feature_names)]

pub use corrector::{Codec, CorrectError, GranuleCorrector, Packet, PacketFlags, Settings};

pub mod corrector;
pub mod ogg;
