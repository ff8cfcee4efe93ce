//! UDF runner CLI
//!
//! Entry point for `udf-run`. Parses CLI arguments, sets up logging and
//! delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use udf_cli::json::{self, from_value};
use udf_cli::{Cli, CliError, CliResult, Command, Runtime};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Validation(err)) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let runtime = Runtime::new(cli.module_config()?)?;

    match &cli.command {
        Command::Validate { file } => {
            runtime.validate_file(file)?;
            println!("{}: ok", file.display());
        }
        Command::Record {
            file,
            function,
            record,
            repeat,
            args,
        } => {
            let record = json::parse_record(record)?;
            let args = json::parse_args(args);
            let runtime = runtime.with_repeat(*repeat);
            let result = runtime.apply_record(file, function, &record, &args)?;
            println!("{}", from_value(&result));
            println!("{}", json::record_to_json(record.as_ref()));
            print_logs(&runtime);
            if cli.stats {
                print_stats(&runtime, file)?;
            }
        }
        Command::Stream {
            file,
            function,
            input,
            args,
        } => {
            let input = json::parse_stream(input)?;
            let args = json::parse_args(args);
            let output = runtime.apply_stream(file, function, input, &args)?;
            for value in &output {
                println!("{}", from_value(value));
            }
            print_logs(&runtime);
            if cli.stats {
                print_stats(&runtime, file)?;
            }
        }
    }
    Ok(())
}

fn print_logs(runtime: &Runtime) {
    for (level, message) in runtime.logs() {
        eprintln!("[{}] {}", level, message);
    }
}

fn print_stats(runtime: &Runtime, file: &std::path::Path) -> CliResult<()> {
    eprintln!("engine: {}", serde_json::to_string(&runtime.module().stats())?);
    let name = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if let Some(pool) = runtime.module().pool_stats(name) {
        eprintln!(
            "pool: capacity={} queued={} calls={} misses={}",
            pool.capacity, pool.queued, pool.calls, pool.misses
        );
    }
    Ok(())
}
