//! `image-sync` entry point
//!
//! Per-image and per-repository failures are reported and the process still exits 0. Only an
//! invalid configuration or a failed enumeration of the source repositories exits 1.

use image_sync::cli::{Args, Runner};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args().from_env();

    let runner = match Runner::new(&args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runner.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Sync aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
