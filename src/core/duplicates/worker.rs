//! Background scan worker and its handle.

use super::{DuplicatePair, Fingerprint, ScanCommand, ScanItem, ScanMessage, ScanOutcome};
use crate::config::{StoreConfig, MAX_FINGERPRINT_SIZE};
use crate::core::imaging::FastResizer;
use crate::error::ScanError;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use rayon::prelude::*;
use std::thread::{self, JoinHandle};

/// Worker loop state; lives entirely on the scanner thread
pub(crate) struct ScanWorker {
    commands: Receiver<ScanCommand>,
    messages: Sender<ScanMessage>,
    hash_size: u32,
    chunk_size: usize,
    // A Start that arrived while another scan was running
    pending: Option<ScanCommand>,
    last_percent: Option<u8>,
}

impl ScanWorker {
    pub(crate) fn new(
        config: &StoreConfig,
        commands: Receiver<ScanCommand>,
        messages: Sender<ScanMessage>,
    ) -> Self {
        Self {
            commands,
            messages,
            hash_size: config.fingerprint_size,
            chunk_size: config.fingerprint_chunk_size.max(1),
            pending: None,
            last_percent: None,
        }
    }

    /// Serve commands until the command channel disconnects
    pub(crate) fn run(mut self) {
        loop {
            let command = match self.pending.take() {
                Some(command) => command,
                None => match self.commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            let ScanCommand::Start { items, threshold } = command else {
                // Nothing running
                continue;
            };

            self.last_percent = None;
            match self.scan(&items, threshold) {
                Ok(ScanOutcome::Completed(pairs)) => {
                    tracing::info!("Duplicate scan found {} pair(s)", pairs.len());
                    let _ = self.messages.send(ScanMessage::Result { pairs });
                }
                Ok(ScanOutcome::Cancelled) => {
                    tracing::info!("Duplicate scan cancelled");
                }
                Err(e) => {
                    tracing::warn!("Duplicate scan failed: {}", e);
                    let _ = self.messages.send(ScanMessage::Error {
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!("Duplicate scanner worker exiting");
    }

    /// Fingerprint then compare, checking for cancellation between chunks
    /// and between comparison rows.
    pub(crate) fn scan(
        &mut self,
        items: &[ScanItem],
        threshold: u8,
    ) -> Result<ScanOutcome, ScanError> {
        if threshold > 100 {
            return Err(ScanError::InvalidThreshold {
                value: threshold as u32,
            });
        }

        let total = items.len();
        tracing::info!("Scanning {} item(s) for duplicates at {}%", total, threshold);

        let mut fingerprints = Vec::with_capacity(total);
        for chunk in items.chunks(self.chunk_size) {
            if self.interrupted() {
                return Ok(ScanOutcome::Cancelled);
            }

            let hash_size = self.hash_size;
            let computed: Vec<Result<Fingerprint, ScanError>> = chunk
                .par_iter()
                .map_init(FastResizer::new, |resizer, item| {
                    Fingerprint::of_source(resizer, &item.source, hash_size)
                        .map_err(|e| ScanError::Failed(format!("{}: {}", item.id, e)))
                })
                .collect();

            for fingerprint in computed {
                fingerprints.push(fingerprint?);
                self.progress((fingerprints.len() * 50 / total) as u8);
            }
        }

        let total_pairs = total * total.saturating_sub(1) / 2;
        let mut compared = 0;
        let mut pairs = Vec::new();

        for (i, left) in fingerprints.iter().enumerate() {
            if self.interrupted() {
                return Ok(ScanOutcome::Cancelled);
            }

            for (j, right) in fingerprints.iter().enumerate().skip(i + 1) {
                let similarity = left.similarity(right);
                if similarity >= threshold {
                    pairs.push(DuplicatePair {
                        id_a: items[i].id.clone(),
                        id_b: items[j].id.clone(),
                        similarity,
                    });
                }
            }

            compared += total - i - 1;
            if total_pairs > 0 {
                self.progress((50 + compared * 50 / total_pairs) as u8);
            }
        }

        if self.interrupted() {
            return Ok(ScanOutcome::Cancelled);
        }
        self.progress(100);

        Ok(ScanOutcome::Completed(pairs))
    }

    /// Drain waiting commands without blocking
    fn interrupted(&mut self) -> bool {
        match self.commands.try_recv() {
            Ok(ScanCommand::Cancel) => true,
            Ok(start) => {
                // A newer request replaces the running one
                self.pending = Some(start);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    fn progress(&mut self, percent: u8) {
        if self.last_percent.map_or(true, |last| percent > last) {
            self.last_percent = Some(percent);
            let _ = self.messages.send(ScanMessage::Progress { percent });
        }
    }
}

/// Owner side of a running scanner thread
pub struct DuplicateScanner {
    commands: Option<Sender<ScanCommand>>,
    messages: Receiver<ScanMessage>,
    worker: Option<JoinHandle<()>>,
}

impl DuplicateScanner {
    /// Start the worker thread
    pub fn spawn(config: &StoreConfig) -> Result<Self, ScanError> {
        if !(2..=MAX_FINGERPRINT_SIZE).contains(&config.fingerprint_size) {
            return Err(ScanError::Failed(format!(
                "fingerprint size {} is outside 2-{}",
                config.fingerprint_size, MAX_FINGERPRINT_SIZE
            )));
        }

        let (command_tx, command_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        let worker = ScanWorker::new(config, command_rx, message_tx);

        let handle = thread::Builder::new()
            .name("duplicate-scanner".to_string())
            .spawn(move || worker.run())
            .map_err(|e| ScanError::Failed(format!("Failed to start scanner thread: {}", e)))?;

        Ok(Self {
            commands: Some(command_tx),
            messages: message_rx,
            worker: Some(handle),
        })
    }

    /// Queue a scan; a scan already running is abandoned
    pub fn start(&self, items: Vec<ScanItem>, threshold: u32) -> Result<(), ScanError> {
        let threshold = u8::try_from(threshold)
            .ok()
            .filter(|t| *t <= 100)
            .ok_or(ScanError::InvalidThreshold { value: threshold })?;
        self.send(ScanCommand::Start { items, threshold })
    }

    /// Ask the running scan to stop; no result will follow
    pub fn cancel(&self) -> Result<(), ScanError> {
        self.send(ScanCommand::Cancel)
    }

    /// Messages from the worker
    pub fn messages(&self) -> &Receiver<ScanMessage> {
        &self.messages
    }

    /// Block until the current scan reports a result or an error
    pub fn wait(&self, mut on_progress: impl FnMut(u8)) -> Result<Vec<DuplicatePair>, ScanError> {
        for message in self.messages.iter() {
            match message {
                ScanMessage::Progress { percent } => on_progress(percent),
                ScanMessage::Result { pairs } => return Ok(pairs),
                ScanMessage::Error { message } => return Err(ScanError::Failed(message)),
            }
        }
        Err(ScanError::WorkerGone)
    }

    fn send(&self, command: ScanCommand) -> Result<(), ScanError> {
        self.commands
            .as_ref()
            .ok_or(ScanError::WorkerGone)?
            .send(command)
            .map_err(|_| ScanError::WorkerGone)
    }
}

impl Drop for DuplicateScanner {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(ScanCommand::Cancel);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::duplicates::PixelSource;
    use image::{DynamicImage, ImageBuffer, Rgb};

    fn gradient(left_to_right: bool) -> DynamicImage {
        let img = ImageBuffer::from_fn(64, 64, |x, _| {
            let step = if left_to_right { x } else { 63 - x };
            let brightness = (step * 4) as u8;
            Rgb([brightness, brightness, brightness])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn item(id: &str, left_to_right: bool) -> ScanItem {
        ScanItem {
            id: id.to_string(),
            source: PixelSource::Bitmap(gradient(left_to_right)),
        }
    }

    fn run_to_end(commands: Vec<ScanCommand>) -> Vec<ScanMessage> {
        let (command_tx, command_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        for command in commands {
            command_tx.send(command).unwrap();
        }
        drop(command_tx);

        ScanWorker::new(&StoreConfig::default(), command_rx, message_tx).run();
        message_rx.try_iter().collect()
    }

    fn result_pairs(messages: &[ScanMessage]) -> Option<Vec<DuplicatePair>> {
        messages.iter().find_map(|m| match m {
            ScanMessage::Result { pairs } => Some(pairs.clone()),
            _ => None,
        })
    }

    #[test]
    fn identical_items_pair_at_full_threshold() {
        let messages = run_to_end(vec![ScanCommand::Start {
            items: vec![item("a", true), item("b", true)],
            threshold: 100,
        }]);

        let pairs = result_pairs(&messages).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].similarity, 100);
        assert_eq!((pairs[0].id_a.as_str(), pairs[0].id_b.as_str()), ("a", "b"));
    }

    #[test]
    fn disjoint_items_never_pair() {
        let messages = run_to_end(vec![ScanCommand::Start {
            items: vec![item("a", true), item("b", false)],
            threshold: 1,
        }]);

        assert!(result_pairs(&messages).unwrap().is_empty());
    }

    #[test]
    fn each_unordered_pair_reported_once() {
        let items = (0..5).map(|i| item(&format!("img{}", i), true)).collect();
        let messages = run_to_end(vec![ScanCommand::Start {
            items,
            threshold: 90,
        }]);

        let pairs = result_pairs(&messages).unwrap();
        assert_eq!(pairs.len(), 10);
        let mut seen = std::collections::HashSet::new();
        for pair in &pairs {
            assert_ne!(pair.id_a, pair.id_b);
            let key = if pair.id_a < pair.id_b {
                (pair.id_a.clone(), pair.id_b.clone())
            } else {
                (pair.id_b.clone(), pair.id_a.clone())
            };
            assert!(seen.insert(key));
        }
    }

    #[test]
    fn progress_is_monotonic_and_ends_before_result() {
        let items = (0..6).map(|i| item(&i.to_string(), i % 2 == 0)).collect();
        let messages = run_to_end(vec![ScanCommand::Start {
            items,
            threshold: 90,
        }]);

        let percents: Vec<u8> = messages
            .iter()
            .filter_map(|m| match m {
                ScanMessage::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.last(), Some(&100));
        assert!(matches!(messages.last(), Some(ScanMessage::Result { .. })));
    }

    #[test]
    fn cancel_before_completion_sends_nothing_more() {
        let messages = run_to_end(vec![
            ScanCommand::Start {
                items: vec![item("a", true), item("b", true)],
                threshold: 90,
            },
            ScanCommand::Cancel,
        ]);

        assert!(messages.is_empty());
    }

    #[test]
    fn newer_start_supersedes_running_scan() {
        let messages = run_to_end(vec![
            ScanCommand::Start {
                items: vec![item("old_a", true), item("old_b", true)],
                threshold: 90,
            },
            ScanCommand::Start {
                items: vec![item("new_a", true), item("new_b", true)],
                threshold: 90,
            },
        ]);

        let results: Vec<_> = messages
            .iter()
            .filter(|m| matches!(m, ScanMessage::Result { .. }))
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(result_pairs(&messages).unwrap()[0].id_a, "new_a");
    }

    #[test]
    fn undecodable_item_reports_error() {
        let messages = run_to_end(vec![ScanCommand::Start {
            items: vec![
                item("a", true),
                ScanItem {
                    id: "broken".to_string(),
                    source: PixelSource::Encoded(b"garbage".to_vec()),
                },
            ],
            threshold: 90,
        }]);

        match messages.last() {
            Some(ScanMessage::Error { message }) => assert!(message.contains("broken")),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(result_pairs(&messages).is_none());
    }

    #[test]
    fn empty_scan_completes() {
        let messages = run_to_end(vec![ScanCommand::Start {
            items: Vec::new(),
            threshold: 90,
        }]);
        assert_eq!(result_pairs(&messages), Some(Vec::new()));
    }

    #[test]
    fn handle_runs_scan_on_worker_thread() {
        let scanner = DuplicateScanner::spawn(&StoreConfig::default()).unwrap();
        scanner
            .start(vec![item("a", true), item("b", true), item("c", false)], 90)
            .unwrap();

        let mut last = 0;
        let pairs = scanner.wait(|p| last = p).unwrap();

        assert_eq!(last, 100);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn handle_rejects_out_of_range_threshold() {
        let scanner = DuplicateScanner::spawn(&StoreConfig::default()).unwrap();
        assert!(matches!(
            scanner.start(Vec::new(), 101),
            Err(ScanError::InvalidThreshold { value: 101 })
        ));
    }

    #[test]
    fn oversized_fingerprint_is_refused_at_spawn() {
        let config = StoreConfig {
            fingerprint_size: 70_000,
            ..StoreConfig::default()
        };
        assert!(matches!(
            DuplicateScanner::spawn(&config),
            Err(ScanError::Failed(_))
        ));
    }
}
