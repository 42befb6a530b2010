//! The `oggcorrect` stream filter: reads a concatenation of Ogg pages on
//! standard input, corrects and gap-fills the selected logical stream's
//! timestamps, and writes that stream's pages to standard output.
//!
//! Per the external interface this tool implements, the command line
//! accepts exactly one positional argument -- the decimal stream number to
//! keep -- and no other flags. This is a deliberate departure from
//! `optivorbis_cli`'s `getopts` surface: this tool is one stage of a larger
//! shell pipeline that always invokes it the same way, so there is no
//! ergonomic benefit to a flag parser, only a wider contract to keep
//! literal.

use std::io::{stdin, stdout, BufReader, BufWriter, Write};
use std::process::exit;
use std::{env, io};

use log::info;
use oggcorrect::GranuleCorrector;
use stderrlog::ColorChoice;

fn main() {
	exit(match run() {
		Ok(()) => 0,
		Err(err) => {
			eprintln!("{err}");
			1
		}
	})
}

fn run() -> Result<(), String> {
	init_logging();

	let stream_no = parse_stream_no(env::args().skip(1))?;

	info!("correcting stream {stream_no}");

	let source = BufReader::new(stdin().lock());
	let mut sink = BufWriter::new(stdout().lock());

	GranuleCorrector::new_with_defaults()
		.correct(stream_no, source, &mut sink)
		.map_err(|err| format!("error while correcting stream {stream_no}: {err}"))?;

	// `BufWriter` swallows flush errors on an unchecked drop; flush
	// explicitly so a failed final write is reported and turned into exit
	// code 1, per this tool's error handling design.
	sink.flush().map_err(|err: io::Error| format!("error flushing output: {err}"))
}

/// Parses the single required `<stream_no>` positional argument.
///
/// Any other argument count, or an argument that is not a valid decimal
/// `u32`, is a usage error.
fn parse_stream_no(mut args: impl Iterator<Item = String>) -> Result<u32, String> {
	let (first, rest) = (args.next(), args.next());

	match (first, rest) {
		(Some(arg), None) => arg.parse::<u32>().map_err(|_| usage_error(&format!("not a valid stream number: {arg}"))),
		_ => Err(usage_error("expected exactly one argument: <stream_no>"))
	}
}

fn usage_error(detail: &str) -> String {
	format!("{detail}\nUsage: {} <stream_no>", env!("CARGO_BIN_NAME"))
}

/// Wires up `stderrlog` to print this crate's and `oggcorrect`'s `log`
/// messages to standard error only, leaving standard output reserved for
/// the corrected Ogg page bytes, following `optivorbis_cli`'s
/// `init_logging` pattern.
fn init_logging() {
	stderrlog::new()
		.module("oggcorrect")
		.verbosity(2)
		.show_level(false)
		.color(ColorChoice::Never)
		.init()
		.unwrap();
}

#[cfg(test)]
mod test {
	use super::parse_stream_no;

	#[test]
	fn accepts_a_single_decimal_argument() {
		assert_eq!(parse_stream_no(["5".to_string()].into_iter()), Ok(5));
	}

	#[test]
	fn rejects_missing_argument() {
		assert!(parse_stream_no(std::iter::empty()).is_err());
	}

	#[test]
	fn rejects_extra_arguments() {
		assert!(parse_stream_no(["5".to_string(), "extra".to_string()].into_iter()).is_err());
	}

	#[test]
	fn rejects_non_numeric_argument() {
		assert!(parse_stream_no(["not-a-number".to_string()].into_iter()).is_err());
	}
}
