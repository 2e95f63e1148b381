use anyhow::{anyhow, Result};
use blockscript_core::cli::Args;
use clap::Parser;

fn main() -> Result<()> {
    let args = Args::parse();
    blockscript_core::logging::init(args.verbose).map_err(|e| anyhow!("Failed to initialise logging: {}", e))?;
    blockscript_core::run_cli(&args)
}
