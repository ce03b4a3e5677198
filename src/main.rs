//! todo - a local-first task tracker

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = todo_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
