use std::sync::{Arc, OnceLock};

use multistripe_types::CallbackEvent;
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

use crate::error::{Result, StripeError};

/// Default number of events a queue holds before publishers wait
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Bounded FIFO of normalized callback events
///
/// The channel is created on first use and lives as long as the queue. The
/// queue keeps its own receiving end, so publishers never observe a closed
/// channel while it is alive.
pub struct CallbackQueue {
    capacity: usize,
    channel: OnceLock<(mpsc::Sender<CallbackEvent>, CallbackStream)>,
}

/// Consumer handle of a [`CallbackQueue`]
///
/// Clones share the same queue: each event is received by exactly one of
/// them.
#[derive(Clone)]
pub struct CallbackStream {
    receiver: Arc<Mutex<mpsc::Receiver<CallbackEvent>>>,
}

impl CallbackStream {
    /// Wait for the next event
    pub async fn recv(&self) -> Option<CallbackEvent> {
        self.receiver.lock().await.recv().await
    }

    /// Take the next event if one is queued and no other consumer is waiting
    pub fn try_recv(&self) -> Option<CallbackEvent> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }
}

impl std::fmt::Debug for CallbackStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackStream").finish_non_exhaustive()
    }
}

impl CallbackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channel: OnceLock::new(),
        }
    }

    fn channel(&self) -> &(mpsc::Sender<CallbackEvent>, CallbackStream) {
        self.channel.get_or_init(|| {
            trace!(capacity = self.capacity, "Initializing callback queue");
            let (tx, rx) = mpsc::channel(self.capacity);
            let stream = CallbackStream {
                receiver: Arc::new(Mutex::new(rx)),
            };
            (tx, stream)
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consumer handle for this queue
    pub fn stream(&self) -> CallbackStream {
        self.channel().1.clone()
    }

    /// Enqueue an event, waiting for a free slot while the queue is full
    pub async fn publish(&self, event: CallbackEvent) -> Result<()> {
        self.channel()
            .0
            .send(event)
            .await
            .map_err(|_| StripeError::QueueClosed)
    }

    /// Enqueue an event without waiting
    pub fn try_publish(&self, event: CallbackEvent) -> Result<()> {
        self.channel().0.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => StripeError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => StripeError::QueueClosed,
        })
    }

    /// Number of events waiting to be consumed
    pub fn len(&self) -> usize {
        match self.channel.get() {
            Some((tx, _)) => tx.max_capacity() - tx.capacity(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl std::fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
