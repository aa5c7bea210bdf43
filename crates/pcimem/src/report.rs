use std::io::Write;

use crate::access::{AccessResult, WriteResult};
use crate::error::Result;
use crate::request::AccessWidth;

pub const REPEAT_MARKER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
	/// Consecutive repeats collapse into a single `...` line.
	#[default]
	Compact,
	/// Every item, with its mapped address.
	Verbose,
}

/// Writes read results and the write/readback line to a sink.
pub struct Reporter<W: Write> {
	out: W,
	width: AccessWidth,
	mode: ReportMode,
	previous: Option<u64>,
	repeating: bool,
}

impl<W: Write> Reporter<W> {
	pub const fn new(out: W, width: AccessWidth, mode: ReportMode) -> Self {
		Self {
			out,
			width,
			mode,
			previous: None,
			repeating: false,
		}
	}

	pub fn record(&mut self, result: &AccessResult) -> Result<()> {
		let digits = self.width.hex_digits();
		match self.mode {
			ReportMode::Verbose => {
				writeln!(self.out, "Value at offset 0x{:X} ({:p}): 0x{:0digits$X}", result.offset, result.address, result.value)?;
			}
			ReportMode::Compact => {
				if self.previous == Some(result.value) {
					if !self.repeating {
						writeln!(self.out, "{REPEAT_MARKER}")?;
					}
					self.repeating = true;
				} else {
					writeln!(self.out, "0x{:04X}: 0x{:0digits$X}", result.offset, result.value)?;
					self.repeating = false;
				}
			}
		}
		self.previous = Some(result.value);
		Ok(())
	}

	pub fn written(&mut self, result: &WriteResult) -> Result<()> {
		let digits = self.width.hex_digits();
		writeln!(self.out, "Written 0x{:0digits$X}; readback 0x{:0digits$X}", result.written, result.readback)?;
		Ok(())
	}

	pub fn finish(mut self) -> Result<W> {
		self.out.flush()?;
		Ok(self.out)
	}
}
