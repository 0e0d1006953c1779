//! Crossbeam-backed event channel.
//!
//! The engine only ever holds an [`EventSender`]; whoever renders progress
//! keeps the [`EventReceiver`] on its own thread.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Engine side of an event channel. Cheap to clone across threads.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event, discarding it if nobody is listening
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Listener side of an event channel
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event; `None` once every sender is gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Next event if one is already queued
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Events until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructor for sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded channel; progress events are small and infrequent
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose events go nowhere
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BackupEvent, BackupProgress, RestoreEvent};
    use std::thread;

    fn progress(percent: u8) -> Event {
        Event::Backup(BackupEvent::Progress(BackupProgress {
            percent,
            bytes_processed: percent as u64,
            total_bytes: 100,
        }))
    }

    #[test]
    fn events_cross_threads_in_order() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(progress(25));
            sender.send(Event::Restore(RestoreEvent::Completed { files_restored: 3 }));
        });
        handle.join().unwrap();

        let events: Vec<Event> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::Backup(BackupEvent::Progress(p)) => assert_eq!(p.percent, 25),
            other => panic!("Wrong event type: {:?}", other),
        }
    }

    #[test]
    fn null_sender_discards_silently() {
        let sender = null_sender();
        sender.send(progress(1));
    }

    #[test]
    fn receiver_ends_when_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        drop(sender);
        assert!(receiver.recv().is_none());
    }
}
