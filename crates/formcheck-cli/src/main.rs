mod cmd_check;
mod cmd_path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "formcheck")]
#[command(about = "Check JSON documents against formcheck validation schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log engine activity to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a JSON document against a schema
    Check {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Input file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Only test the node at this accessor path, e.g. "person.emails[0]"
        #[arg(long)]
        field: Option<String>,
    },
    /// Compile accessor paths and read values with them
    Path {
        #[command(subcommand)]
        op: cmd_path::PathOp,
    },
}

pub(crate) fn format_output<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check { schema, input, field } => {
            let valid = cmd_check::run(&schema, &input, field.as_deref(), cli.pretty)?;
            Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Path { op } => {
            cmd_path::run(op, cli.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_output_pretty_and_compact() {
        let value = serde_json::json!({ "valid": true });
        assert_eq!(format_output(&value, false).unwrap(), r#"{"valid":true}"#);
        assert!(format_output(&value, true).unwrap().contains("\n"));
    }

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from([
            "formcheck", "--pretty", "check", "-s", "schema.json", "-i", "-", "--field", "a.b",
        ])
        .unwrap();
        assert!(cli.pretty);
        match cli.command {
            Commands::Check { schema, input, field } => {
                assert_eq!(schema, PathBuf::from("schema.json"));
                assert_eq!(input, PathBuf::from("-"));
                assert_eq!(field.as_deref(), Some("a.b"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_path_get() {
        let cli = Cli::try_parse_from(["formcheck", "path", "get", "-i", "doc.json", "a[0]", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Path { op: cmd_path::PathOp::Get { .. } }));
    }
}
