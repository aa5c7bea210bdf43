use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::MappingLayout;
use crate::region::MappedRegion;

/// One width-typed read, widened to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessResult {
	/// Device offset the value was read from.
	pub offset: u64,
	/// Virtual address inside the mapping.
	pub address: *const u8,
	pub value: u64,
}

/// Outcome of the single store and the hardware readback that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
	pub offset: u64,
	/// The value as stored, truncated to the access width.
	pub written: u64,
	pub readback: u64,
}

pub struct Accessor<'a> {
	region: &'a MappedRegion,
	layout: &'a MappingLayout,
}

impl<'a> Accessor<'a> {
	pub const fn new(region: &'a MappedRegion, layout: &'a MappingLayout) -> Self {
		Self { region, layout }
	}

	pub fn read(&self, index: usize) -> Result<AccessResult> {
		let at = self.layout.item_offset(index);
		let value = self.region.load(at, self.layout.width)?;
		Ok(AccessResult {
			offset: self.layout.device_offset(index),
			address: self.region.address_of(at),
			value,
		})
	}

	/// Reads every item in order.
	pub fn read_all(&self) -> impl Iterator<Item = Result<AccessResult>> + '_ {
		(0..self.layout.item_count).map(move |i| self.read(i))
	}

	/// Stores `value` at item `index` and reads the register back.
	///
	/// The readback is whatever the device returns; read-only, masked or
	/// self-clearing registers will not echo the stored value.
	pub fn write_and_readback(&self, index: usize, value: u64) -> Result<WriteResult> {
		let width = self.layout.width;
		let written = value & width.mask();
		if written != value {
			warn!("Value 0x{value:X} does not fit in {} byte(s); writing 0x{written:0w$X}", width.bytes(), w = width.hex_digits());
		}

		let at = self.layout.item_offset(index);
		self.region.store(at, width, written)?;
		let readback = self.region.load(at, width)?;
		debug!(offset = self.layout.device_offset(index), written, readback, "store completed");

		Ok(WriteResult {
			offset: self.layout.device_offset(index),
			written,
			readback,
		})
	}
}
