//! # CLI Module
//!
//! Command-line interface for the media store engine.
//!
//! ## Usage
//! ```bash
//! # Ingest files into the default library
//! media-store ingest ~/Downloads/IMG_0001.jpg ~/Downloads/clip.mp4
//!
//! # Back up into four parts with a metadata snapshot
//! media-store backup /mnt/usb/library.zip --parts 4 --metadata db.json
//!
//! # Restore from any part or the manifest
//! media-store restore /mnt/usb/library.zip.part01 ~/Restored --metadata-out db.json
//!
//! # Near-duplicates as JSON
//! media-store dupes --threshold 92 --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_store::config::StoreConfig;
use media_store::core::archive::BackupManifest;
use media_store::core::thumbnail::ThumbnailOutcome;
use media_store::core::MediaStore;
use media_store::error::{MediaStoreError, Result};
use media_store::events::{BackupEvent, Event, EventChannel, EventReceiver, RestoreEvent};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Media Store - a local photo and video library
#[derive(Parser, Debug)]
#[command(name = "media-store")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Library root (defaults to <Pictures>/MediaLibrary)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    /// Configuration file (defaults to <config dir>/media-store/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy files into the library and derive thumbnails
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Derive (or re-derive) the thumbnail for one file
    Thumb {
        /// File to preview
        file: PathBuf,
    },

    /// Back up the library into a ZIP archive
    Backup {
        /// Destination archive
        dest: PathBuf,

        /// Split the archive into this many parts (1-99)
        #[arg(short, long, default_value = "1")]
        parts: usize,

        /// Metadata snapshot stored inside the archive
        #[arg(short, long)]
        metadata: Option<PathBuf>,
    },

    /// Restore a backup from its archive, any part, or its manifest
    Restore {
        /// Archive, part or manifest
        archive: PathBuf,

        /// Directory to restore into
        target: PathBuf,

        /// Write the restored metadata snapshot here
        #[arg(short, long)]
        metadata_out: Option<PathBuf>,
    },

    /// Find near-duplicate images in the library
    Dupes {
        /// Minimum similarity to report (0-100)
        #[arg(short, long)]
        threshold: Option<u32>,
    },

    /// List media in the library
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(StoreConfig::default_path);
    let config = StoreConfig::load(&config_path)?;
    let library = cli.library.unwrap_or_else(default_library);
    let store = MediaStore::open(library, config)?;
    let output = cli.output;

    match cli.command {
        Commands::Ingest { files } => run_ingest(&store, &files, output),
        Commands::Thumb { file } => run_thumb(&store, &file, output),
        Commands::Backup {
            dest,
            parts,
            metadata,
        } => run_backup(&store, &dest, parts, metadata.as_deref(), output),
        Commands::Restore {
            archive,
            target,
            metadata_out,
        } => run_restore(&store, &archive, &target, metadata_out.as_deref(), output),
        Commands::Dupes { threshold } => run_dupes(&store, threshold, output),
        Commands::List => run_list(&store, output),
    }
}

fn default_library() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MediaLibrary")
}

fn run_ingest(store: &MediaStore, files: &[PathBuf], output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    let mut results = Vec::with_capacity(files.len());

    for file in files {
        let result = store.ingest(file, None)?;
        if matches!(output, OutputFormat::Pretty) {
            term.write_line(&format!(
                "{} {} {}",
                style("✓").green().bold(),
                result.item.path.display(),
                thumbnail_note(&result.thumbnail)
            ))
            .ok();
        }
        results.push(result);
    }

    if matches!(output, OutputFormat::Json) {
        print_json(&results);
    }
    Ok(())
}

fn run_thumb(store: &MediaStore, file: &Path, output: OutputFormat) -> Result<()> {
    let outcome = store.derive_thumbnail(file)?;

    match output {
        OutputFormat::Pretty => {
            Term::stderr()
                .write_line(&format!(
                    "{} {}",
                    outcome.path().display(),
                    thumbnail_note(&outcome)
                ))
                .ok();
        }
        OutputFormat::Json => print_json(&outcome),
    }
    Ok(())
}

fn run_backup(
    store: &MediaStore,
    dest: &Path,
    parts: usize,
    metadata: Option<&Path>,
    output: OutputFormat,
) -> Result<()> {
    let blob = match metadata {
        Some(path) => fs::read(path).map_err(|e| {
            MediaStoreError::Config(format!("Cannot read metadata {}: {}", path.display(), e))
        })?,
        None => b"{}".to_vec(),
    };

    let (sender, receiver) = EventChannel::new();
    let progress = progress_bar(output);
    let event_thread = spawn_progress(receiver, progress.clone());

    let result = store.backup_with_events(dest, parts, &blob, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let manifest = result?;
    match output {
        OutputFormat::Pretty => print_manifest(&manifest),
        OutputFormat::Json => print_json(&manifest),
    }
    Ok(())
}

fn run_restore(
    store: &MediaStore,
    archive: &Path,
    target: &Path,
    metadata_out: Option<&Path>,
    output: OutputFormat,
) -> Result<()> {
    let (sender, receiver) = EventChannel::new();
    let progress = progress_bar(output);
    let event_thread = spawn_progress(receiver, progress.clone());

    let result = store.restore_with_events(archive, target, &sender);

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let blob = result?;
    if let Some(path) = metadata_out {
        fs::write(path, &blob).map_err(|e| {
            MediaStoreError::Config(format!("Cannot write metadata {}: {}", path.display(), e))
        })?;
    }

    match output {
        OutputFormat::Pretty => {
            Term::stderr()
                .write_line(&format!(
                    "{} Restored into {} ({} metadata)",
                    style("✓").green().bold(),
                    style(target.display()).cyan(),
                    format_bytes(blob.len() as u64)
                ))
                .ok();
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "target": target,
            "metadata_bytes": blob.len(),
        })),
    }
    Ok(())
}

fn run_dupes(store: &MediaStore, threshold: Option<u32>, output: OutputFormat) -> Result<()> {
    let threshold = threshold.unwrap_or(store.config().duplicate_threshold);
    let items = store.list_items()?;
    let scan_items = store.load_scan_items(&items)?;

    let progress = progress_bar(output);
    let pairs = store.find_duplicates(scan_items, threshold, |percent| {
        if let Some(pb) = &progress {
            pb.set_position(percent as u64);
        }
    })?;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match output {
        OutputFormat::Pretty => {
            let term = Term::stderr();
            if pairs.is_empty() {
                term.write_line(&format!("  {} No duplicates found!", style("✓").green()))
                    .ok();
            }
            for pair in &pairs {
                term.write_line(&format!(
                    "  {} {} {} {}",
                    style(format!("{:>3}%", pair.similarity)).yellow(),
                    pair.id_a,
                    style("≈").dim(),
                    pair.id_b
                ))
                .ok();
            }
        }
        OutputFormat::Json => print_json(&pairs),
    }
    Ok(())
}

fn run_list(store: &MediaStore, output: OutputFormat) -> Result<()> {
    let items = store.list_items()?;

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            for item in &items {
                term.write_line(&format!(
                    "{:>10}  {}",
                    style(format_bytes(item.size)).dim(),
                    item.id
                ))
                .ok();
            }
            term.write_line(&format!("{} items", style(items.len()).cyan()))
                .ok();
        }
        OutputFormat::Json => print_json(&items),
    }
    Ok(())
}

fn progress_bar(output: OutputFormat) -> Option<ProgressBar> {
    if !matches!(output, OutputFormat::Pretty) {
        return None;
    }

    let pb = ProgressBar::new(100);
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        pb.set_style(bar_style.progress_chars("█▓░"));
    }
    Some(pb)
}

/// Handle events in a separate thread until the sender is dropped
fn spawn_progress(
    receiver: EventReceiver,
    progress: Option<ProgressBar>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = &progress else {
                continue;
            };
            match event {
                Event::Backup(BackupEvent::Progress(p)) => {
                    pb.set_position(p.percent as u64);
                    pb.set_message(format!(
                        "{} / {}",
                        format_bytes(p.bytes_processed),
                        format_bytes(p.total_bytes)
                    ));
                }
                Event::Backup(BackupEvent::Splitting { part_count }) => {
                    pb.set_message(format!("splitting into {} parts", part_count));
                }
                Event::Restore(RestoreEvent::Reassembling { part_count }) => {
                    pb.set_message(format!("joining {} parts", part_count));
                }
                Event::Restore(RestoreEvent::EntryRestored { completed, total }) => {
                    pb.set_position((completed * 100 / total.max(1)) as u64);
                }
                _ => {}
            }
        }
    })
}

fn thumbnail_note(outcome: &ThumbnailOutcome) -> String {
    match outcome.report() {
        None => style("(thumbnail ready)").dim().to_string(),
        Some(report) => style(format!("(no thumbnail: {})", report.message))
            .yellow()
            .to_string(),
    }
}

fn print_manifest(manifest: &BackupManifest) {
    let term = Term::stderr();
    term.write_line(&format!(
        "{} Backup {} complete",
        style("✓").green().bold(),
        style(&manifest.archive_name).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} files, {}",
        style(manifest.files_count).cyan(),
        format_bytes(manifest.total_size)
    ))
    .ok();
    for name in &manifest.part_file_names {
        term.write_line(&format!("    {} {}", style("○").dim(), name)).ok();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
