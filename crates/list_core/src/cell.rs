use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Single-value reactive holder: synchronous read, ordered change
/// notifications, current value replayed to every new subscriber.
///
/// Deliveries are queued on per-subscriber channels, so an update issued
/// while an observer is handling a previous one is never reentrant.
pub struct StateCell<T> {
    inner: Mutex<CellInner<T>>,
}

struct CellInner<T> {
    value: T,
    subscribers: Vec<UnboundedSender<T>>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(CellInner {
                value,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Current value, synchronously.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Stores `value`, then queues it to every live subscriber in
    /// subscription order. Subscribers whose receiver was dropped are pruned.
    pub fn set(&self, value: T) {
        let mut inner = self.lock();
        inner.value = value.clone();
        inner
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Registers a subscriber. The current value is queued first, followed by
    /// every subsequent update in the exact order it was set.
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let _ = tx.send(inner.value.clone());
        inner.subscribers.push(tx);
        rx
    }

    // a cell has no failure state; poisoning is absorbed
    fn lock(&self) -> MutexGuard<'_, CellInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only handle over a [`StateCell`], cheap to clone and hand to
/// observers.
pub struct ReadCell<T>(Arc<StateCell<T>>);

impl<T: Clone> ReadCell<T> {
    pub(crate) fn new(cell: Arc<StateCell<T>>) -> Self {
        Self(cell)
    }

    pub fn get(&self) -> T {
        self.0.get()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        self.0.subscribe()
    }
}

impl<T> Clone for ReadCell<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}
