mod cli;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let command_line_interface = cli::CommandLineInterface::load();

    let default_level = if command_line_interface.verbose { "xform_typeck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let failed = command_line_interface.run()?;
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
