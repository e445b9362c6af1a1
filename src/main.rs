//! stackreg CLI — compose multi-stack deployments through a parameter registry.

use clap::Parser;
use stackreg::cli::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = stackreg::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
