use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Result of a non-blocking push onto the handoff queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The queue was full; the item was discarded. Normal back-pressure,
    /// not an error.
    Dropped,
    /// The consumer side is gone.
    Disconnected,
}

/// Producer handle, cloned into the playback thread.
pub struct HandoffSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Never blocks: a slow consumer costs frames, never memory or time.
    pub fn push(&self, item: T) -> PushOutcome {
        match self.tx.try_send(item) {
            Ok(()) => PushOutcome::Delivered,
            Err(TrySendError::Full(_)) => PushOutcome::Dropped,
            Err(TrySendError::Disconnected(_)) => PushOutcome::Disconnected,
        }
    }
}

/// Bounded handoff carrying processed frames from the playback thread to
/// the render loop.
///
/// The bound is the whole point: a consumer that cannot keep up
/// back-pressures the producer into dropping frames instead of queueing
/// them without limit.
pub struct HandoffQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> HandoffQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn sender(&self) -> HandoffSender<T> {
        HandoffSender {
            tx: self.tx.clone(),
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Discards everything currently queued, returning the count.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
