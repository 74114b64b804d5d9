//! Completion queue between background threads and the UI thread.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

type Waker = Arc<dyn Fn() + Send + Sync>;

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
    waker: Option<Waker>,
}

/// Receiving side, owned by the UI thread.
///
/// Background work posts through a [`CompletionPoster`]; nothing posted is
/// observed until the owner calls [`CompletionQueue::drain`].
pub struct CompletionQueue<T> {
    shared: Arc<Shared<T>>,
}

/// Cloneable sending side of a [`CompletionQueue`].
pub struct CompletionPoster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CompletionPoster<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Default for CompletionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionQueue<T> {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A queue that calls `waker` after every post, from the posting thread.
    ///
    /// Hosts use this to schedule a drain on their own event loop.
    pub fn with_waker<W>(waker: W) -> Self
    where
        W: Fn() + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(waker)))
    }

    fn build(waker: Option<Waker>) -> Self {
        Self {
            shared: Arc::new(Shared { items: Mutex::new(VecDeque::new()), ready: Condvar::new(), waker }),
        }
    }

    pub fn poster(&self) -> CompletionPoster<T> {
        CompletionPoster { shared: Arc::clone(&self.shared) }
    }

    /// Take everything posted so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.shared.items.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until something is queued or `timeout` passes.
    ///
    /// Returns `true` when the queue is non-empty.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut items = self.shared.items.lock().unwrap_or_else(PoisonError::into_inner);
        while items.is_empty() {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            items = self.shared.ready.wait_timeout(items, left).unwrap_or_else(PoisonError::into_inner).0;
        }
        true
    }
}

impl<T> CompletionPoster<T> {
    pub fn post(&self, item: T) {
        self.shared.items.lock().unwrap_or_else(PoisonError::into_inner).push_back(item);
        self.shared.ready.notify_all();
        if let Some(waker) = &self.shared.waker {
            waker();
        }
    }
}
