use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PcimemError {
	#[error("{0}")]
	Usage(String),

	#[error("Invalid {field} \"{input}\": expected an integer (0x.. hex, 0.. octal or decimal)")]
	InvalidNumber { field: &'static str, input: String },

	#[error("Illegal data type '{0}'.")]
	IllegalType(char),

	#[error("Item count must be at least 1")]
	ZeroCount,

	#[error("Offset 0x{offset:X} with {count} item(s) of {width} byte(s) overflows the address range")]
	RangeOverflow { offset: u64, count: usize, width: usize },

	#[error("Can't open file {path}; reason: {}", os_reason(.source))]
	ResourceUnavailable { path: PathBuf, source: io::Error },

	#[error("mmap error; reason: {}", os_reason(.source))]
	MappingFailed { source: io::Error },

	#[error("Access of {width} byte(s) at 0x{offset:X} is outside the {len} byte mapping")]
	OutOfBounds { offset: usize, width: usize, len: usize },

	#[error("Failed to write report: {0}")]
	Report(#[from] io::Error),

	#[error("error with munmap; reason: {}", os_reason(.source))]
	TeardownFailed { source: io::Error },
}

impl PcimemError {
	pub const fn exit_code(&self) -> u8 {
		match self {
			Self::IllegalType(_) => 2,
			Self::Usage(_)
			| Self::InvalidNumber { .. }
			| Self::ZeroCount
			| Self::RangeOverflow { .. }
			| Self::ResourceUnavailable { .. }
			| Self::MappingFailed { .. }
			| Self::OutOfBounds { .. }
			| Self::Report(_)
			| Self::TeardownFailed { .. } => 1,
		}
	}
}

/// Renders an OS error as `(errno) [description]`.
pub fn os_reason(err: &io::Error) -> String {
	match err.raw_os_error() {
		Some(code) => {
			let text = io::Error::from_raw_os_error(code).to_string();
			let description = text.split(" (os error").next().unwrap_or(&text);
			format!("({code}) [{description}]")
		}
		None => format!("(-) [{err}]"),
	}
}

pub type Result<T> = std::result::Result<T, PcimemError>;
