mod bootstrap;
mod cli;
mod inspect;
mod run;

use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    let args = cli::parse();
    run::run(args)
}
