//! termpilot binary: thin front-end over the engine library.
//!
//! Runs a command under the headless terminal and speaks the JSON-lines
//! protocol on stdio. Also hosts the `wait-exit` rendezvous helper invoked
//! by the spawn wrapper.

use std::path::PathBuf;
use std::process::ExitCode;
use termpilot::config::EngineConfig;
use termpilot::error::EngineError;
use termpilot::logging::{init_logging, LoggingConfig};
use termpilot::protocol::stdio;
use termpilot::session::{wait_exit, Session};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // The helper subcommand runs without a runtime or logging; it must stay
    // silent on the child's stdio.
    if args.get(1).map(String::as_str) == Some("wait-exit") {
        let Some(path) = args.get(2) else {
            eprintln!("wait-exit requires a FIFO path");
            return ExitCode::from(2);
        };
        return match wait_exit(&PathBuf::from(path)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("wait-exit failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            print_usage(&args[0]);
            return ExitCode::from(2);
        }
    };

    init_logging(&LoggingConfig::default());

    match run_engine(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(EngineError::Pty(e)) => {
            eprintln!("termpilot: {e}");
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("termpilot: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run_engine(config: EngineConfig) -> termpilot::error::Result<()> {
    let session = Session::spawn(config)?;
    let handle = session.handle();
    stdio::run(handle).await?;
    session.join().await
}

fn parse_args(args: &[String]) -> Result<EngineConfig, String> {
    let mut config = EngineConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(&args[0]);
                std::process::exit(0);
            }
            "--size" => {
                i += 1;
                let value = args.get(i).ok_or("--size requires a value")?;
                let (cols, rows) = parse_size(value)?;
                config.cols = cols;
                config.rows = rows;
            }
            "--start-on-output" => {
                i += 1;
                let value = args.get(i).ok_or("--start-on-output requires a value")?;
                config.start_on_output = value
                    .parse()
                    .map_err(|_| format!("invalid boolean: {value}"))?;
            }
            "--" => {
                if i + 1 < args.len() {
                    config.command = args[i + 1..].to_vec();
                }
                break;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}"));
            }
            _ => {
                config.command = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    Ok(config)
}

fn parse_size(value: &str) -> Result<(u16, u16), String> {
    let (cols, rows) = value
        .split_once('x')
        .ok_or_else(|| format!("invalid size format: {value} (expected COLSxROWS)"))?;
    let cols = cols
        .parse()
        .map_err(|_| format!("invalid column count: {cols}"))?;
    let rows = rows
        .parse()
        .map_err(|_| format!("invalid row count: {rows}"))?;
    Ok((cols, rows))
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [OPTIONS] [--] [COMMAND]...");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  wait-exit <PATH>  Rendezvous helper used by the spawn wrapper");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [COMMAND]...  Command to run inside the terminal [default: bash]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("      --size <COLSxROWS>        Terminal size [default: 120x40]");
    eprintln!("      --start-on-output <BOOL>  Mark Running only after first output [default: true]");
    eprintln!("  -h, --help                    Print help");
}
