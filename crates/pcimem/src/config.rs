use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
	filter::EnvFilter,
	fmt::{format::JsonFields, writer::MakeWriterExt},
	layer::SubscriberExt,
	util::SubscriberInitExt,
	Layer,
};

use crate::error::{PcimemError, Result};

const ABOUT: &str = "Read and write a memory-mapped device region (e.g. a PCI BAR resource file) from userspace";

const LONG_ABOUT: &str = "Read and write a memory-mapped device region (e.g. a PCI BAR resource file) from userspace.

  sys file : sysfs file for the pci resource to act on
  offset   : offset into pci memory region to act upon
  type     : access operation type : [b]yte, [h]alfword, [w]ord, [d]ouble-word
  *count   : number of items to read:  w*100 will dump 100 words
  data     : data to be written

Example: pcimem /sys/bus/pci/devices/0001:00:07.0/resource0 0x100 w 0x00";

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
	/// Resource file exposing the raw memory region
	#[arg(value_name = "SYS-FILE")]
	pub sys_file: PathBuf,

	/// Offset into the memory region (0x.. hex, 0.. octal or decimal)
	#[arg(value_name = "OFFSET")]
	pub offset: String,

	/// Access type b, h, w or d, optionally followed by *count
	#[arg(value_name = "TYPE[*COUNT]")]
	pub access: Option<String>,

	/// Value to write at the final item's address
	#[arg(value_name = "DATA")]
	pub data: Option<String>,

	/// Print every item with its mapped address instead of compressing repeats
	#[arg(short, long)]
	pub verbose: bool,

	/// Log filter directive, e.g. `info`, `debug` or `pcimem=trace`
	#[arg(long, default_value = "info")]
	pub log_level: String,

	/// Emit log lines as JSON
	#[arg(long)]
	pub log_json: bool,
}

/// Installs the global subscriber. Warnings and errors go to stderr, the rest to stdout.
pub fn init_tracing(cli: &Cli) -> Result<()> {
	let filter = EnvFilter::try_new(&cli.log_level).map_err(|e| PcimemError::Usage(format!("Invalid --log-level \"{}\": {e}", cli.log_level)))?;
	let writer = std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout);

	tracing_subscriber::registry()
		.with(if cli.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.with_writer(writer)
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_file(true)
					.with_line_number(true)
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(
				tracing_subscriber::fmt::layer()
					.with_writer(writer)
					.with_ansi(ansi_enabled(std::io::stdout().is_terminal(), std::io::stderr().is_terminal()))
					.with_target(false)
					.with_file(true)
					.with_line_number(true)
					.with_filter(filter),
			)
		})
		.try_init()
		.map_err(|e| PcimemError::Usage(format!("Failed to install logger: {e}")))
}

/// One layer feeds both streams, so colour is only safe when both are terminals.
const fn ansi_enabled(stdout_is_tty: bool, stderr_is_tty: bool) -> bool {
	stdout_is_tty && stderr_is_tty
}
