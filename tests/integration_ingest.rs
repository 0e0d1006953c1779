//! Integration tests for ingestion, thumbnails and duplicate detection.

use assert_fs::prelude::*;
use chrono::{Local, NaiveDate};
use image::{DynamicImage, ImageBuffer, Rgb};
use media_store::core::duplicates::{PixelSource, ScanItem};
use media_store::core::organize::PathOrganizer;
use media_store::core::thumbnail::ThumbnailOutcome;
use media_store::events::{Event, EventChannel, IngestEvent};
use media_store::{ErrorKind, MediaStore, StoreConfig};
use predicates::prelude::*;

fn write_png(path: &std::path::Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save(path).unwrap();
}

fn open(temp: &assert_fs::TempDir) -> MediaStore {
    MediaStore::open(temp.child("library").path(), StoreConfig::default()).unwrap()
}

#[test]
fn repeated_names_get_numeric_suffixes() {
    let temp = assert_fs::TempDir::new().unwrap();
    let source = temp.child("photo.jpg");
    source.write_binary(b"jpeg bytes").unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

    let placed: Vec<_> = (0..4)
        .map(|_| PathOrganizer::place_on(date, source.path(), temp.child("lib").path()).unwrap())
        .collect();

    let names: Vec<_> = placed
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["photo.jpg", "photo_1.jpg", "photo_2.jpg", "photo_3.jpg"]);
    temp.child("lib/2024/03/09/photo_3.jpg")
        .assert(predicate::path::eq_file(source.path()));
    source.assert(predicate::path::exists());
}

#[test]
fn ingest_lands_in_todays_folder() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);
    let source = temp.child("holiday.png");
    write_png(source.path(), 800, 600);

    let result = store.ingest(source.path(), None).unwrap();

    let today = PathOrganizer::date_folder(Local::now().date_naive());
    assert_eq!(
        result.item.path,
        store.root().join(&today).join("holiday.png")
    );
    temp.child("library/_cache/thumbs/holiday_thumb.jpg")
        .assert(predicate::path::is_file());
}

#[test]
fn ingest_reports_events() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);
    let source = temp.child("broken.jpg");
    source.write_binary(b"not a real jpeg").unwrap();
    let (sender, receiver) = EventChannel::new();

    let result = store
        .ingest_with_events(source.path(), Some("abc".to_string()), &sender)
        .unwrap();

    assert!(matches!(result.thumbnail, ThumbnailOutcome::Skipped { .. }));
    let events: Vec<Event> = std::iter::from_fn(|| receiver.try_recv()).collect();
    assert!(matches!(events[0], Event::Ingest(IngestEvent::Placed { .. })));
    assert!(matches!(
        events[1],
        Event::Ingest(IngestEvent::ThumbnailSkipped { .. })
    ));
}

#[test]
fn missing_source_is_storage_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);

    let error = store
        .ingest(temp.child("nowhere.png").path(), None)
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::StorageUnavailable);
    assert!(error.to_string().contains("nowhere.png"));
}

#[test]
fn listing_skips_thumbnail_cache() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);
    for name in ["a.png", "b.png"] {
        let source = temp.child(name);
        write_png(source.path(), 40, 30);
        store.ingest(source.path(), None).unwrap();
    }

    let items = store.list_items().unwrap();

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| !i.id.starts_with("_cache")));
}

#[test]
fn scanner_pairs_copies_but_not_different_images() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);

    let base = DynamicImage::ImageRgb8(ImageBuffer::from_fn(120, 90, |x, _| {
        let v = (x * 2) as u8;
        Rgb([v, v, v])
    }));
    let mirrored = base.fliph();
    let resized = base.resize_exact(60, 45, image::imageops::FilterType::Triangle);

    let items = vec![
        ScanItem {
            id: "original".to_string(),
            source: PixelSource::Bitmap(base),
        },
        ScanItem {
            id: "mirrored".to_string(),
            source: PixelSource::Bitmap(mirrored),
        },
        ScanItem {
            id: "resized".to_string(),
            source: PixelSource::Bitmap(resized),
        },
    ];

    let pairs = store.find_duplicates(items, 90, |_| {}).unwrap();

    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].id_a, "original");
    assert_eq!(pairs[0].id_b, "resized");
    assert!(pairs[0].similarity >= 90);
}

#[test]
fn invalid_threshold_is_invalid_input() {
    let temp = assert_fs::TempDir::new().unwrap();
    let store = open(&temp);

    let error = store.find_duplicates(Vec::new(), 150, |_| {}).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
}
