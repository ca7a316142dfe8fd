mod bus;
mod config;
mod error;
mod events;
mod handler;
mod tracker;

pub use bus::{EventBus, LocalBus};
pub use config::{
    BusConfig, ReleasePolicy, TrackerConfig, UploadEventsConfig, DEFAULT_TAP_CAPACITY,
};
pub use error::{BusError, ConfigError};
pub use events::{EventArgs, EventPayload, FileRecord, UploadEvent};
pub use handler::{Handler, HandlerId, SubscriptionId};
pub use tracker::EventTracker;
