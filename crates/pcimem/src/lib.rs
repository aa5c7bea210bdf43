pub mod access;
pub mod config;
pub mod error;
pub mod layout;
pub mod region;
pub mod report;
pub mod request;

use std::io::Write;
use tracing::{error, info};

pub use crate::access::{AccessResult, Accessor, WriteResult};
pub use crate::config::Cli;
pub use crate::error::{PcimemError, Result};
pub use crate::layout::MappingLayout;
pub use crate::region::MappedRegion;
pub use crate::report::{ReportMode, Reporter};
pub use crate::request::{AccessWidth, MappingRequest};

/// Opens the resource, maps the window, reads every item, applies the optional
/// write to the last item and reports to `out`. The region is unmapped on every
/// path once the mapping exists.
pub fn run<W: Write>(request: &MappingRequest, mode: ReportMode, out: W) -> Result<W> {
	let page_size = region::page_size()?;
	let layout = MappingLayout::for_request(request, page_size)?;

	let file = region::open_resource(&request.file_path)?;
	info!("Target offset is 0x{:x}, page size is {}", request.target_offset, page_size);
	let region = MappedRegion::map(file, &layout)?;

	let outcome = access_and_report(&region, &layout, request.write_value, mode, out);
	let teardown = region.release();

	settle(outcome, teardown)
}

/// Combines the access outcome with the teardown result. An earlier failure keeps
/// its exit status; a teardown failure after a clean run still fails the run.
fn settle<W>(outcome: Result<W>, teardown: Result<()>) -> Result<W> {
	match (outcome, teardown) {
		(Ok(out), Ok(())) => Ok(out),
		(Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
		(Err(e), Err(teardown)) => {
			error!("{teardown}");
			Err(e)
		}
	}
}

fn access_and_report<W: Write>(region: &MappedRegion, layout: &MappingLayout, write_value: Option<u64>, mode: ReportMode, out: W) -> Result<W> {
	let accessor = Accessor::new(region, layout);
	let mut reporter = Reporter::new(out, layout.width, mode);

	for result in accessor.read_all() {
		reporter.record(&result?)?;
	}

	// A write targets the final item of the read loop.
	if let Some(value) = write_value {
		let result = accessor.write_and_readback(layout.last_index(), value)?;
		reporter.written(&result)?;
	}

	reporter.finish()
}
