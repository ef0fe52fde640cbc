use clap::Parser;
use sigscan::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
