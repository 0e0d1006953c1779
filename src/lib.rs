//! # Media Store Engine
//!
//! A local media library: ingest photos and videos into a date-sharded tree,
//! derive thumbnails, back the whole library up into (optionally split) ZIP
//! archives, restore them, and find near-duplicate images.
//!
//! ## Core Philosophy
//! - **Copy, never move** - Ingestion leaves the source untouched
//! - **Soft previews** - A missing thumbnail is a placeholder, not a failure
//! - **Byte-exact backups** - Restores reproduce every file and the metadata blob
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - The media store engine
//! - `config` - Engine settings
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - User-friendly error types with a stable taxonomy

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::StoreConfig;
pub use self::core::MediaStore;
pub use error::{ErrorKind, MediaStoreError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global tracing subscriber: {}", e);
    }
}
