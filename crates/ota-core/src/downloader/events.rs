//! Delivery of job events to at most one observer.
//!
//! While nobody is attached only the latest progress (or indeterminate)
//! event and the terminal outcome are kept. Attaching replays both. The
//! outcome reaches an observer exactly once; after it is sent the channel
//! is closed so `recv()` loops end on their own.

use std::sync::Mutex;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::lock;
use super::outcome::{DownloadEvent, DownloadOutcome};

pub type EventReceiver = UnboundedReceiver<DownloadEvent>;

#[derive(Default)]
pub(crate) struct EventHub {
    inner: Mutex<HubInner>,
}

#[derive(Default)]
struct HubInner {
    observer: Option<UnboundedSender<DownloadEvent>>,
    latest: Option<DownloadEvent>,
    outcome: Option<DownloadOutcome>,
    outcome_delivered: bool,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Attach a new observer, replacing (and closing) the previous one.
    pub(crate) fn attach(&self) -> EventReceiver {
        let (tx, rx) = unbounded_channel();
        let mut inner = lock(&self.inner);
        if let Some(latest) = inner.latest.clone() {
            let _ = tx.send(latest);
        }
        match inner.outcome.clone() {
            Some(outcome) => {
                if !inner.outcome_delivered && tx.send(DownloadEvent::Finished(outcome)).is_ok() {
                    inner.outcome_delivered = true;
                }
                // Nothing follows a terminal outcome.
                inner.observer = None;
            }
            None => inner.observer = Some(tx),
        }
        rx
    }

    pub(crate) fn detach(&self) {
        lock(&self.inner).observer = None;
    }

    pub(crate) fn publish(&self, event: DownloadEvent) {
        let mut inner = lock(&self.inner);
        match event {
            DownloadEvent::Finished(outcome) => {
                if inner.outcome.is_some() {
                    return;
                }
                inner.outcome = Some(outcome.clone());
                if let Some(tx) = inner.observer.take() {
                    inner.outcome_delivered = tx.send(DownloadEvent::Finished(outcome)).is_ok();
                }
            }
            event => {
                inner.latest = Some(event.clone());
                let gone = match &inner.observer {
                    Some(tx) => tx.send(event).is_err(),
                    None => false,
                };
                if gone {
                    inner.observer = None;
                }
            }
        }
    }
}
