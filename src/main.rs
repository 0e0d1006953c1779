//! # media-store CLI
//!
//! Command-line interface for the media store engine.
//!
//! ## Usage
//! ```bash
//! media-store ingest ~/Downloads/*.jpg
//! media-store backup /mnt/usb/library.zip --parts 4
//! RUST_LOG=media_store=debug media-store restore /mnt/usb/library.zip.manifest.json ~/Restored
//! ```

mod cli;

use console::style;
use media_store::error::ErrorReport;
use std::process::ExitCode;

fn main() -> ExitCode {
    media_store::init_tracing();

    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = ErrorReport::from(&e);
            eprintln!(
                "{} {}",
                style(format!("error[{:?}]:", report.kind)).red().bold(),
                report.message
            );
            ExitCode::FAILURE
        }
    }
}
