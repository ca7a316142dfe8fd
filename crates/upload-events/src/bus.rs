use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::config::BusConfig;
use crate::error::BusError;
use crate::events::{EventPayload, FileRecord, UploadEvent};
use crate::handler::{Handler, SubscriptionId};

/// The upload coordinator's event bus, as seen by an [`EventTracker`](crate::EventTracker).
pub trait EventBus: Send + Sync {
    fn subscribe(&self, event: UploadEvent, handler: Handler) -> Result<SubscriptionId, BusError>;

    /// Removes the registration of exactly this handler on `event`.
    fn unsubscribe(&self, event: UploadEvent, handler: &Handler) -> Result<(), BusError>;

    /// Looks a file up in the coordinator's registry.
    fn get_file(&self, file_id: &str) -> Option<FileRecord>;
}

/// In-process bus with synchronous dispatch and its own file registry.
pub struct LocalBus {
    handlers: RwLock<HashMap<UploadEvent, Vec<(SubscriptionId, Handler)>>>,
    files: RwLock<HashMap<String, FileRecord>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    tap: broadcast::Sender<EventPayload>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        let (tap, _) = broadcast::channel(config.tap_capacity.max(1));
        Self {
            handlers: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            tap,
        }
    }

    /// Delivers `payload` to every handler subscribed to its event, in
    /// subscription order, and returns how many were called.
    ///
    /// Handlers run on a snapshot taken before the first call, outside any
    /// lock, so they may freely subscribe, unsubscribe or query files. A
    /// handler removed mid-dispatch still sees the payload in flight.
    pub fn emit(&self, payload: EventPayload) -> usize {
        if self.is_closed() {
            tracing::debug!("Dropping {} emitted on closed bus", payload.event());
            return 0;
        }

        let event = payload.event();
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .get(&event)
            .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        tracing::trace!("Dispatching {} to {} handlers", event, snapshot.len());
        for handler in &snapshot {
            handler.call(&payload);
        }

        if self.tap.receiver_count() > 0 {
            let _ = self.tap.send(payload);
        }

        snapshot.len()
    }

    /// Observes every payload emitted after this call.
    pub fn watch(&self) -> broadcast::Receiver<EventPayload> {
        self.tap.subscribe()
    }

    pub fn add_file(&self, file: FileRecord) -> Option<FileRecord> {
        self.files.write().insert(file.id.clone(), file)
    }

    /// Drops a file from the registry. Does not emit `file-removed`.
    pub fn remove_file(&self, file_id: &str) -> Option<FileRecord> {
        self.files.write().remove(file_id)
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    pub fn handler_count(&self, event: UploadEvent) -> usize {
        self.handlers.read().get(&event).map_or(0, Vec::len)
    }

    pub fn total_handlers(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Stops accepting subscription changes and deliveries.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Upload event bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for LocalBus {
    fn subscribe(&self, event: UploadEvent, handler: Handler) -> Result<SubscriptionId, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(event)
            .or_default()
            .push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, event: UploadEvent, handler: &Handler) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let mut handlers = self.handlers.write();
        let drained = match handlers.get_mut(&event) {
            Some(entries) => {
                match entries.iter().position(|(_, h)| h == handler) {
                    Some(pos) => {
                        entries.remove(pos);
                    }
                    None => {
                        tracing::trace!("Handler {:?} was not subscribed to {}", handler.id(), event)
                    }
                }
                entries.is_empty()
            }
            None => false,
        };
        if drained {
            handlers.remove(&event);
        }
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Option<FileRecord> {
        self.files.read().get(file_id).cloned()
    }
}
