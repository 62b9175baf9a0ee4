// SecureDB: Feed hub
//
// Holds the latest serialized document and fans new ones out over a
// broadcast channel. Subscribing takes the current document and a receiver
// under one lock, so a subscriber never misses a document published between
// the two.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{FeedDocument, FeedError};

pub struct FeedHub {
    current: RwLock<Option<Arc<str>>>,
    tx: broadcast::Sender<Arc<str>>,
}

pub struct Subscription {
    /// The document to send as soon as the subscriber connects.
    pub initial: Option<Arc<str>>,
    pub updates: broadcast::Receiver<Arc<str>>,
}

impl FeedHub {
    /// `capacity` bounds how far a slow subscriber may fall behind before
    /// it starts skipping documents.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            current: RwLock::new(None),
            tx,
        }
    }

    pub fn publish(&self, doc: &FeedDocument) -> Result<(), FeedError> {
        let frame: Arc<str> = Arc::from(serde_json::to_string(doc)?);

        let mut current = self.current.write();
        *current = Some(Arc::clone(&frame));
        // No subscribers is fine.
        let _ = self.tx.send(frame);
        Ok(())
    }

    pub fn subscribe(&self) -> Subscription {
        let current = self.current.read();
        Subscription {
            initial: current.clone(),
            updates: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Option<Arc<str>> {
        self.current.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
