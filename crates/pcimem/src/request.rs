use std::fmt;
use std::path::PathBuf;

use crate::config::Cli;
use crate::error::{PcimemError, Result};

/// Width of a single register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
	Byte,
	Half,
	Word,
	Double,
}

impl AccessWidth {
	pub fn from_char(c: char) -> Result<Self> {
		match c.to_ascii_lowercase() {
			'b' => Ok(Self::Byte),
			'h' => Ok(Self::Half),
			'w' => Ok(Self::Word),
			'd' => Ok(Self::Double),
			_ => Err(PcimemError::IllegalType(c)),
		}
	}

	pub const fn bytes(self) -> usize {
		match self {
			Self::Byte => 1,
			Self::Half => 2,
			Self::Word => 4,
			Self::Double => 8,
		}
	}

	/// Hex digits needed to print a full value of this width.
	pub const fn hex_digits(self) -> usize {
		self.bytes() * 2
	}

	pub const fn mask(self) -> u64 {
		match self {
			Self::Double => u64::MAX,
			_ => (1u64 << (8 * self.bytes())) - 1,
		}
	}
}

impl fmt::Display for AccessWidth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let c = match self {
			Self::Byte => 'b',
			Self::Half => 'h',
			Self::Word => 'w',
			Self::Double => 'd',
		};
		write!(f, "{c}")
	}
}

/// One invocation's worth of input, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRequest {
	pub file_path: PathBuf,
	pub target_offset: u64,
	pub width: AccessWidth,
	pub item_count: usize,
	pub write_value: Option<u64>,
}

impl MappingRequest {
	pub fn new(file_path: impl Into<PathBuf>, target_offset: u64, width: AccessWidth) -> Self {
		Self {
			file_path: file_path.into(),
			target_offset,
			width,
			item_count: 1,
			write_value: None,
		}
	}

	#[must_use]
	pub fn with_count(mut self, item_count: usize) -> Self {
		self.item_count = item_count;
		self
	}

	#[must_use]
	pub fn with_write(mut self, value: u64) -> Self {
		self.write_value = Some(value);
		self
	}
}

impl TryFrom<&Cli> for MappingRequest {
	type Error = PcimemError;

	fn try_from(cli: &Cli) -> Result<Self> {
		let target_offset = parse_int(&cli.offset, "offset")?;
		let (width, item_count) = match cli.access.as_deref() {
			Some(spec) => parse_type_spec(spec)?,
			None => (AccessWidth::Word, 1),
		};
		let write_value = cli.data.as_deref().map(|data| parse_int(data, "data")).transpose()?;

		Ok(Self {
			file_path: cli.sys_file.clone(),
			target_offset,
			width,
			item_count,
			write_value,
		})
	}
}

/// Parses `<type>[*<count>]`. Characters after the type that are not a `*` suffix are ignored.
pub fn parse_type_spec(spec: &str) -> Result<(AccessWidth, usize)> {
	let mut chars = spec.chars();
	let first = chars.next().ok_or_else(|| PcimemError::Usage("Empty access type".to_string()))?;
	let width = AccessWidth::from_char(first)?;

	let rest = chars.as_str();
	let count = match rest.strip_prefix('*') {
		Some(count) => {
			let n = parse_int(count, "count")?;
			let n = usize::try_from(n).map_err(|_| PcimemError::InvalidNumber {
				field: "count",
				input: count.to_string(),
			})?;
			if n == 0 {
				return Err(PcimemError::ZeroCount);
			}
			n
		}
		None => 1,
	};

	Ok((width, count))
}

/// Parses an unsigned integer with C-style base detection: `0x` hex, leading `0` octal, else decimal.
pub fn parse_int(input: &str, field: &'static str) -> Result<u64> {
	let s = input.trim();
	let invalid = || PcimemError::InvalidNumber {
		field,
		input: input.to_string(),
	};

	let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
		(hex, 16)
	} else if s.len() > 1 && s.starts_with('0') {
		(&s[1..], 8)
	} else {
		(s, 10)
	};

	if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
		return Err(invalid());
	}
	u64::from_str_radix(digits, radix).map_err(|_| invalid())
}
