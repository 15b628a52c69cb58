//! Fundus Screening CLI Tool
//!
//! Screens fundus photographs against the optic-disc inference service and
//! reports DDLS stage and clinical status.

use clap::Parser;
use fundus_screen::cli::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}
