//! Opening a resource file and mapping a window of it.
//!
//! `MappedRegion` owns both the file handle and the mapping. `release` unmaps and
//! closes and reports `munmap` failures; dropping an unreleased region does the same
//! on error paths but can only log the failure.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr::NonNull;
use tracing::{debug, info, warn};

use crate::error::{os_reason, PcimemError, Result};
use crate::layout::MappingLayout;
use crate::request::AccessWidth;

/// System page size, as reported by `sysconf(_SC_PAGESIZE)`.
pub fn page_size() -> Result<u64> {
	// SAFETY: sysconf has no preconditions.
	let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
	if size == -1 {
		let err = io::Error::last_os_error();
		// sysconf may fail without setting errno
		if err.raw_os_error().is_some_and(|code| code != 0) {
			return Err(PcimemError::MappingFailed { source: err });
		}
	}
	checked_page_size(size)
}

fn checked_page_size(size: libc::c_long) -> Result<u64> {
	u64::try_from(size)
		.ok()
		.filter(|s| s.is_power_of_two())
		.ok_or_else(|| PcimemError::MappingFailed {
			source: io::Error::from_raw_os_error(libc::EINVAL),
		})
}

/// Opens `path` read/write with `O_SYNC` so stores are not delayed.
pub fn open_resource(path: &Path) -> Result<File> {
	let file = OpenOptions::new()
		.read(true)
		.write(true)
		.custom_flags(libc::O_SYNC)
		.open(path)
		.map_err(|source| PcimemError::ResourceUnavailable {
			path: path.to_path_buf(),
			source,
		})?;
	info!("{} opened.", path.display());
	Ok(file)
}

pub struct MappedRegion {
	file: Option<File>,
	base: NonNull<u8>,
	len: usize,
	aligned_offset: u64,
}

impl MappedRegion {
	/// Maps `layout.length` bytes of `file` starting at `layout.aligned_offset`, shared and read-write.
	pub fn map(file: File, layout: &MappingLayout) -> Result<Self> {
		let offset = libc::off_t::try_from(layout.aligned_offset).map_err(|_| PcimemError::MappingFailed {
			source: io::Error::from_raw_os_error(libc::EOVERFLOW),
		})?;
		let prot = libc::PROT_READ | libc::PROT_WRITE;
		info!(
			"mmap({}, {}, 0x{:x}, 0x{:x}, {}, 0x{:x})",
			0,
			layout.length,
			prot,
			libc::MAP_SHARED,
			file.as_raw_fd(),
			layout.aligned_offset
		);

		// SAFETY: a fresh mapping at a kernel-chosen address; the fd stays open for the lifetime of the region.
		let ptr = unsafe { libc::mmap(std::ptr::null_mut(), layout.length, prot, libc::MAP_SHARED, file.as_raw_fd(), offset) };
		if ptr == libc::MAP_FAILED {
			return Err(PcimemError::MappingFailed { source: io::Error::last_os_error() });
		}
		let base = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| PcimemError::MappingFailed {
			source: io::Error::from_raw_os_error(libc::EFAULT),
		})?;
		info!("Memory mapped to address {:p}.", base.as_ptr());

		Ok(Self {
			file: Some(file),
			base,
			len: layout.length,
			aligned_offset: layout.aligned_offset,
		})
	}

	pub const fn len(&self) -> usize {
		self.len
	}

	pub const fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub const fn aligned_offset(&self) -> u64 {
		self.aligned_offset
	}

	/// Virtual address of byte `offset` in the window, for reporting.
	pub fn address_of(&self, offset: usize) -> *const u8 {
		self.base.as_ptr().wrapping_add(offset)
	}

	fn checked_ptr(&self, offset: usize, width: AccessWidth) -> Result<(*mut u8, bool)> {
		let out_of_bounds = || PcimemError::OutOfBounds {
			offset,
			width: width.bytes(),
			len: self.len,
		};
		let end = offset.checked_add(width.bytes()).ok_or_else(out_of_bounds)?;
		if end > self.len {
			return Err(out_of_bounds());
		}
		let ptr = self.base.as_ptr().wrapping_add(offset);
		let aligned = (ptr as usize) % width.bytes() == 0;
		if !aligned {
			warn!("Unaligned {}-byte access at {:p}", width.bytes(), ptr);
		}
		Ok((ptr, aligned))
	}

	/// Load of `width` bytes at `offset`, widened to 64 bits. Aligned addresses use a
	/// single volatile access; unaligned ones fall back to an unaligned typed load.
	pub fn load(&self, offset: usize, width: AccessWidth) -> Result<u64> {
		let (ptr, aligned) = self.checked_ptr(offset, width)?;
		// SAFETY: ptr..ptr+width lies inside the live mapping (checked above). The volatile
		// reads are only used when ptr is aligned for the width.
		let value = unsafe {
			match (width, aligned) {
				(AccessWidth::Byte, _) => u64::from(ptr.read_volatile()),
				(AccessWidth::Half, true) => u64::from(ptr.cast::<u16>().read_volatile()),
				(AccessWidth::Half, false) => u64::from(ptr.cast::<u16>().read_unaligned()),
				(AccessWidth::Word, true) => u64::from(ptr.cast::<u32>().read_volatile()),
				(AccessWidth::Word, false) => u64::from(ptr.cast::<u32>().read_unaligned()),
				(AccessWidth::Double, true) => ptr.cast::<u64>().read_volatile(),
				(AccessWidth::Double, false) => ptr.cast::<u64>().read_unaligned(),
			}
		};
		Ok(value)
	}

	/// Store of the low `width` bytes of `value` at `offset`, volatile when aligned.
	#[allow(clippy::cast_possible_truncation)]
	pub fn store(&self, offset: usize, width: AccessWidth, value: u64) -> Result<()> {
		let (ptr, aligned) = self.checked_ptr(offset, width)?;
		// SAFETY: ptr..ptr+width lies inside the live, writable mapping (checked above). The
		// volatile writes are only used when ptr is aligned for the width.
		unsafe {
			match (width, aligned) {
				(AccessWidth::Byte, _) => ptr.write_volatile(value as u8),
				(AccessWidth::Half, true) => ptr.cast::<u16>().write_volatile(value as u16),
				(AccessWidth::Half, false) => ptr.cast::<u16>().write_unaligned(value as u16),
				(AccessWidth::Word, true) => ptr.cast::<u32>().write_volatile(value as u32),
				(AccessWidth::Word, false) => ptr.cast::<u32>().write_unaligned(value as u32),
				(AccessWidth::Double, true) => ptr.cast::<u64>().write_volatile(value),
				(AccessWidth::Double, false) => ptr.cast::<u64>().write_unaligned(value),
			}
		}
		Ok(())
	}

	/// Unmaps the window and closes the file.
	pub fn release(mut self) -> Result<()> {
		let result = self.unmap();
		// Drop closes the file; the mapping is already gone.
		self.file.take();
		result
	}

	fn unmap(&mut self) -> Result<()> {
		if self.len == 0 {
			return Ok(());
		}
		// SAFETY: base/len describe the mapping created in `map`, unmapped at most once (len is zeroed below).
		let rc = unsafe { libc::munmap(self.base.as_ptr().cast::<libc::c_void>(), self.len) };
		self.len = 0;
		if rc == -1 {
			return Err(PcimemError::TeardownFailed { source: io::Error::last_os_error() });
		}
		debug!("Mapping released");
		Ok(())
	}
}

impl Drop for MappedRegion {
	fn drop(&mut self) {
		if let Err(PcimemError::TeardownFailed { source }) = self.unmap() {
			warn!("error with munmap during cleanup; reason: {}", os_reason(&source));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	fn backing_file(size: usize) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(&vec![0u8; size]).unwrap();
		file.flush().unwrap();
		file
	}

	#[test]
	fn page_size_is_a_power_of_two() {
		assert!(page_size().unwrap().is_power_of_two());
	}

	#[test]
	fn bogus_page_size_carries_einval() {
		for size in [0, 3, 4097, -4096] {
			match checked_page_size(size).unwrap_err() {
				PcimemError::MappingFailed { source } => assert_eq!(source.raw_os_error(), Some(libc::EINVAL)),
				other => panic!("unexpected error {other:?}"),
			}
		}
		assert_eq!(checked_page_size(16384).unwrap(), 16384);
	}

	#[test]
	fn unaligned_accesses_pass_through() {
		let page = page_size().unwrap();
		let backing = backing_file(usize::try_from(page).unwrap());
		let layout = MappingLayout::new(0, AccessWidth::Byte, 1, page).unwrap();
		let region = MappedRegion::map(open_resource(backing.path()).unwrap(), &layout).unwrap();

		region.store(0x11, AccessWidth::Word, 0x0403_0201).unwrap();
		region.store(0x23, AccessWidth::Double, 0x1817_1615_1413_1211).unwrap();
		region.store(0x31, AccessWidth::Half, 0xBEEF).unwrap();
		assert_eq!(region.load(0x11, AccessWidth::Word).unwrap(), 0x0403_0201);
		assert_eq!(region.load(0x23, AccessWidth::Double).unwrap(), 0x1817_1615_1413_1211);
		assert_eq!(region.load(0x31, AccessWidth::Half).unwrap(), 0xBEEF);
		region.release().unwrap();

		let contents = std::fs::read(backing.path()).unwrap();
		assert_eq!(&contents[0x11..0x15], &0x0403_0201u32.to_ne_bytes());
		assert_eq!(&contents[0x23..0x2B], &0x1817_1615_1413_1211u64.to_ne_bytes());
	}

	#[test]
	fn missing_file_is_resource_unavailable() {
		let err = open_resource(Path::new("/definitely/not/a/resource0")).unwrap_err();
		match err {
			PcimemError::ResourceUnavailable { source, .. } => assert_eq!(source.raw_os_error(), Some(libc::ENOENT)),
			other => panic!("unexpected error {other:?}"),
		}
	}

	#[test]
	fn loads_and_stores_hit_the_file() {
		let page = page_size().unwrap();
		let backing = backing_file(usize::try_from(page).unwrap() * 2);
		let layout = MappingLayout::new(page + 0x20, AccessWidth::Word, 1, page).unwrap();

		let region = MappedRegion::map(open_resource(backing.path()).unwrap(), &layout).unwrap();
		assert_eq!(region.aligned_offset(), page);
		region.store(layout.item_offset(0), AccessWidth::Word, 0xDEAD_BEEF).unwrap();
		assert_eq!(region.load(layout.item_offset(0), AccessWidth::Word).unwrap(), 0xDEAD_BEEF);
		region.release().unwrap();

		let contents = std::fs::read(backing.path()).unwrap();
		let at = usize::try_from(page).unwrap() + 0x20;
		assert_eq!(&contents[at..at + 4], &0xDEAD_BEEFu32.to_ne_bytes());
	}

	#[test]
	fn access_past_the_window_is_refused() {
		let page = page_size().unwrap();
		let backing = backing_file(usize::try_from(page).unwrap());
		let layout = MappingLayout::new(0, AccessWidth::Byte, 1, page).unwrap();
		let region = MappedRegion::map(open_resource(backing.path()).unwrap(), &layout).unwrap();

		let err = region.load(region.len() - 4, AccessWidth::Double).unwrap_err();
		assert!(matches!(err, PcimemError::OutOfBounds { width: 8, .. }));
		assert!(region.store(usize::MAX, AccessWidth::Byte, 1).is_err());
	}

	#[test]
	fn dropping_an_unreleased_region_unmaps() {
		let page = page_size().unwrap();
		let backing = backing_file(usize::try_from(page).unwrap());
		let layout = MappingLayout::new(8, AccessWidth::Double, 1, page).unwrap();
		let region = MappedRegion::map(open_resource(backing.path()).unwrap(), &layout).unwrap();
		region.store(8, AccessWidth::Double, 42).unwrap();
		drop(region);

		let contents = std::fs::read(backing.path()).unwrap();
		assert_eq!(&contents[8..16], &42u64.to_ne_bytes());
	}
}
