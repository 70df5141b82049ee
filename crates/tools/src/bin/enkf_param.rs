//! enkf-param
//!
//! Create ensemble cases, sample MULTFLT parameters from their priors,
//! inspect and truncate them, and export the simulator keyword.
//!
//! Usage: `enkf-param <command> <case> --config multflt.json ...`

use std::io::{self, Write};
use std::process;

use clap::Parser;
use enkf_tools::commands::{run, ParamCommand};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "enkf-param")]
#[command(about = "Manage ensemble parameter cases")]
struct Cli {
    #[command(subcommand)]
    command: ParamCommand,
}

fn main() {
    enkf_tools::init_logging();

    let cli = Cli::parse();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = run(cli.command, &mut out).and_then(|()| Ok(out.flush()?));

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
}
