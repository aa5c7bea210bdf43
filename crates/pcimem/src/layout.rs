//! Page alignment arithmetic for a mapping request.
//!
//! `mmap` only accepts page-aligned file offsets, so the window starts at the page
//! holding the target and the bytes between that page boundary and the target
//! (the lead) are part of the mapping.

use crate::error::{PcimemError, Result};
use crate::request::{AccessWidth, MappingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingLayout {
	pub page_size: u64,
	pub target_offset: u64,
	pub aligned_offset: u64,
	pub length: usize,
	pub width: AccessWidth,
	pub item_count: usize,
}

impl MappingLayout {
	/// `page_size` must be a power of two.
	pub fn new(target_offset: u64, width: AccessWidth, item_count: usize, page_size: u64) -> Result<Self> {
		debug_assert!(page_size.is_power_of_two());
		let overflow = || PcimemError::RangeOverflow {
			offset: target_offset,
			count: item_count,
			width: width.bytes(),
		};

		let aligned_offset = target_offset & !(page_size - 1);
		let lead = target_offset - aligned_offset;
		let span = u64::try_from(item_count).ok().and_then(|n| n.checked_mul(width.bytes() as u64)).ok_or_else(overflow)?;
		// The window must also end inside the u64 file offset space.
		target_offset.checked_add(span).ok_or_else(overflow)?;
		let needed = lead.checked_add(span).ok_or_else(overflow)?;
		let length = usize::try_from(needed.max(page_size)).map_err(|_| overflow())?;

		Ok(Self {
			page_size,
			target_offset,
			aligned_offset,
			length,
			width,
			item_count,
		})
	}

	pub fn for_request(request: &MappingRequest, page_size: u64) -> Result<Self> {
		Self::new(request.target_offset, request.width, request.item_count, page_size)
	}

	/// Distance from the start of the mapping to the target.
	pub const fn lead(&self) -> usize {
		// lead < page_size <= length, which fits usize
		(self.target_offset - self.aligned_offset) as usize
	}

	/// Offset of item `index` within the mapping.
	pub const fn item_offset(&self, index: usize) -> usize {
		self.lead() + index * self.width.bytes()
	}

	/// Device offset of item `index`, as reported to the user.
	pub const fn device_offset(&self, index: usize) -> u64 {
		self.target_offset + (index * self.width.bytes()) as u64
	}

	pub const fn last_index(&self) -> usize {
		self.item_count - 1
	}
}
