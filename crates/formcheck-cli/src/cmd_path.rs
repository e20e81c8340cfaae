use anyhow::{Result, anyhow};
use clap::Subcommand;
use formcheck::{compile_path, path};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum PathOp {
    /// Compile an accessor expression into its keys
    Compile {
        /// Accessor expression, e.g. "item['field'].data[0]"
        expr: String,
    },
    /// Print the value found at an accessor expression
    Get {
        /// Input file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Accessor expression
        expr: String,
    },
}

pub fn run(op: PathOp, pretty: bool) -> Result<()> {
    let output = match op {
        PathOp::Compile { expr } => crate::format_output(&compile_path(&expr), pretty)?,
        PathOp::Get { input, expr } => {
            let doc = crate::cmd_check::read_json(&input)?;
            crate::format_output(lookup(&doc, &expr)?, pretty)?
        }
    };
    println!("{}", output);
    Ok(())
}

fn lookup<'a>(doc: &'a Value, expr: &str) -> Result<&'a Value> {
    path::get(doc, &compile_path(expr)).ok_or_else(|| anyhow!("Nothing at {:?}", expr))
}
