use clap::Parser;
use flowdev_cli::cli::Cli;
use flowdev_cli::output::{self, CommandError, OutputFormat, ResultBuilder};
use flowdev_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli, format).await {
		handle_error(command, &err, format);
		std::process::exit(1);
	}
}

fn handle_error(command: &str, err: &anyhow::Error, format: OutputFormat) {
	let error = CommandError {
		code: commands::error_code(err),
		message: format!("{err:#}"),
	};

	output::print_error_stderr(&error);

	// Machine-readable formats also get the envelope on stdout
	if format != OutputFormat::Text {
		let result: output::CommandResult<()> = ResultBuilder::new(command).error(error.code, error.message).build();
		output::print_result(&result, format);
	}
}
