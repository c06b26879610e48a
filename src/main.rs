use clap::Parser;
use hedgebot::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
