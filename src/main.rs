use clap::Parser;
use structshift::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    structshift::logging::init();
    run(Cli::parse())
}
