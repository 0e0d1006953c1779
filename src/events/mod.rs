//! # Events Module
//!
//! Event-driven progress reporting for ingest, backup and restore.
//!
//! ## Design
//! The engine emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Backup(BackupEvent::Progress(p)) = event {
//!             println!("{}% ({}/{} bytes)", p.percent, p.bytes_processed, p.total_bytes);
//!         }
//!     }
//! });
//!
//! store.backup_with_events(&dest, 4, &snapshot, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
