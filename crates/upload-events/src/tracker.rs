//! Per-file subscription tracking.
//!
//! An [`EventTracker`] sits in front of a shared [`EventBus`] and remembers
//! every handler registered through it, so upload logic for a single file can
//! listen to global lifecycle events and later drop all of its handlers with one
//! [`release_all`](EventTracker::release_all) call.
//!
//! ```ignore
//! let bus = Arc::new(LocalBus::new());
//! let tracker = EventTracker::new(bus.clone());
//!
//! tracker.on_pause_changed("f1", |paused| println!("paused: {paused}"))?;
//! tracker.on_cancel_all("f1", |args| println!("cancelled: {args:?}"))?;
//!
//! // upload finished
//! tracker.release_all()?;
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::config::{ReleasePolicy, TrackerConfig};
use crate::error::BusError;
use crate::events::{EventPayload, UploadEvent};
use crate::handler::{Handler, SubscriptionId};

pub struct EventTracker<B: EventBus + ?Sized = dyn EventBus> {
    bus: Arc<B>,
    registrations: Mutex<Vec<(UploadEvent, Handler)>>,
    config: TrackerConfig,
}

impl<B: EventBus + ?Sized + 'static> EventTracker<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self::with_config(bus, TrackerConfig::default())
    }

    pub fn with_config(bus: Arc<B>, config: TrackerConfig) -> Self {
        Self {
            bus,
            registrations: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn bus(&self) -> &Arc<B> {
        &self.bus
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Subscribes `handler` on the bus and tracks the pair for [`release_all`](Self::release_all).
    ///
    /// Bus failures are returned unchanged and leave nothing tracked.
    pub fn subscribe(
        &self,
        event: UploadEvent,
        handler: Handler,
    ) -> Result<SubscriptionId, BusError> {
        let mut registrations = self.registrations.lock();
        let id = self.bus.subscribe(event, handler.clone())?;
        tracing::debug!(
            "Tracked {} handler {:?} as subscription {}",
            event,
            handler.id(),
            id.as_u64()
        );
        registrations.push((event, handler));
        Ok(id)
    }

    pub fn on<F>(&self, event: UploadEvent, callback: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.subscribe(event, Handler::new(callback))
    }

    /// Unsubscribes every tracked handler, in registration order.
    ///
    /// Returns how many registrations were released. With
    /// [`ReleasePolicy::BestEffort`] every pair is attempted and forgotten and
    /// the first failure is returned afterwards. With
    /// [`ReleasePolicy::FailFast`] the first failure is returned immediately
    /// and the failed pair stays tracked along with everything after it.
    pub fn release_all(&self) -> Result<usize, BusError> {
        let mut registrations = self.registrations.lock();
        if registrations.is_empty() {
            return Ok(0);
        }

        match self.config.release_policy {
            ReleasePolicy::BestEffort => {
                let total = registrations.len();
                let mut first_error = None;
                for (event, handler) in registrations.drain(..) {
                    if let Err(e) = self.bus.unsubscribe(event, &handler) {
                        tracing::warn!("Failed to release {} handler {:?}: {}", event, handler.id(), e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
                tracing::debug!("Released {} tracked handlers", total);
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(total),
                }
            }
            ReleasePolicy::FailFast => {
                let mut released = 0;
                let mut failure = None;
                for (event, handler) in registrations.iter() {
                    if let Err(e) = self.bus.unsubscribe(*event, handler) {
                        failure = Some(e);
                        break;
                    }
                    released += 1;
                }
                registrations.drain(..released);
                match failure {
                    Some(e) => {
                        tracing::warn!(
                            "Stopped release after {} handlers, {} still tracked: {}",
                            released,
                            registrations.len(),
                            e
                        );
                        Err(e)
                    }
                    None => {
                        tracing::debug!("Released {} tracked handlers", released);
                        Ok(released)
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Events with a live tracked handler, in registration order.
    pub fn registered_events(&self) -> Vec<UploadEvent> {
        self.registrations
            .lock()
            .iter()
            .map(|(event, _)| *event)
            .collect()
    }

    /// Calls `callback` with the file id when `file_id` is removed.
    pub fn on_file_removed<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let file_id = file_id.into();
        self.on(UploadEvent::FileRemoved, move |payload| {
            if let EventPayload::FileRemoved { file } = payload {
                if file.id == file_id {
                    callback(file.id.as_str());
                }
            }
        })?;
        Ok(())
    }

    /// Calls `callback` with the new pause state whenever `file_id` is paused or resumed.
    pub fn on_pause_changed<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let file_id = file_id.into();
        self.on(UploadEvent::UploadPause, move |payload| {
            if let EventPayload::UploadPause {
                file_id: target,
                is_paused,
            } = payload
            {
                if *target == file_id {
                    callback(*is_paused);
                }
            }
        })?;
        Ok(())
    }

    pub fn on_retry<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let file_id = file_id.into();
        self.on(UploadEvent::UploadRetry, move |payload| {
            if let EventPayload::UploadRetry { file_id: target } = payload {
                if *target == file_id {
                    callback();
                }
            }
        })?;
        Ok(())
    }

    pub fn on_retry_all<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_known_file(UploadEvent::RetryAll, file_id.into(), move |_| callback())
    }

    pub fn on_pause_all<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_known_file(UploadEvent::PauseAll, file_id.into(), move |_| callback())
    }

    /// Forwards the `cancel-all` arguments untouched while `file_id` is still known.
    pub fn on_cancel_all<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn(&[serde_json::Value]) + Send + Sync + 'static,
    {
        self.on_known_file(UploadEvent::CancelAll, file_id.into(), move |payload| {
            if let EventPayload::CancelAll { args } = payload {
                callback(args.as_slice());
            }
        })
    }

    pub fn on_resume_all<F>(&self, file_id: impl Into<String>, callback: F) -> Result<(), BusError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_known_file(UploadEvent::ResumeAll, file_id.into(), move |_| callback())
    }

    // Broadcast events name no file; fire only while the bus still knows ours.
    // The bus owns the handler, so the handler only holds it weakly.
    fn on_known_file<F>(&self, event: UploadEvent, file_id: String, callback: F) -> Result<(), BusError>
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        let bus = Arc::downgrade(&self.bus);
        self.on(event, move |payload| {
            if payload.event() != event {
                return;
            }
            let Some(bus) = bus.upgrade() else {
                return;
            };
            if bus.get_file(&file_id).is_none() {
                return;
            }
            callback(payload);
        })?;
        Ok(())
    }
}

impl<B: EventBus + ?Sized> Drop for EventTracker<B> {
    fn drop(&mut self) {
        let registrations = std::mem::take(self.registrations.get_mut());
        if registrations.is_empty() {
            return;
        }
        tracing::debug!(
            "Tracker dropped with {} live handlers, releasing",
            registrations.len()
        );
        for (event, handler) in registrations {
            if let Err(e) = self.bus.unsubscribe(event, &handler) {
                tracing::warn!("Failed to release {} handler {:?} on drop: {}", event, handler.id(), e);
            }
        }
    }
}

impl<B: EventBus + ?Sized> fmt::Debug for EventTracker<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTracker")
            .field("registrations", &self.registrations.lock().len())
            .field("config", &self.config)
            .finish()
    }
}
