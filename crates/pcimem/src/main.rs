use clap::{error::ErrorKind, Parser};
use pcimem::{config::init_tracing, Cli, MappingRequest, PcimemError, ReportMode};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(e) => {
			// The exit code below is all that is left to report if stderr is closed.
			let _ = e.print();
			return match e.kind() {
				ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
				_ => ExitCode::from(1),
			};
		}
	};

	if let Err(e) = init_tracing(&cli) {
		eprintln!("{e}");
		return ExitCode::from(e.exit_code());
	}

	match execute(&cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{e}");
			ExitCode::from(e.exit_code())
		}
	}
}

fn execute(cli: &Cli) -> Result<(), PcimemError> {
	let request = MappingRequest::try_from(cli)?;
	let mode = if cli.verbose { ReportMode::Verbose } else { ReportMode::Compact };
	pcimem::run(&request, mode, std::io::stdout().lock())?;
	Ok(())
}
