use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BusError;

/// Arguments carried by a broadcast event, forwarded untouched to callbacks.
pub type EventArgs = Vec<serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadEvent {
    FileRemoved,
    UploadPause,
    UploadRetry,
    RetryAll,
    PauseAll,
    CancelAll,
    ResumeAll,
}

impl UploadEvent {
    pub const ALL: [UploadEvent; 7] = [
        UploadEvent::FileRemoved,
        UploadEvent::UploadPause,
        UploadEvent::UploadRetry,
        UploadEvent::RetryAll,
        UploadEvent::PauseAll,
        UploadEvent::CancelAll,
        UploadEvent::ResumeAll,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FileRemoved => "file-removed",
            Self::UploadPause => "upload-pause",
            Self::UploadRetry => "upload-retry",
            Self::RetryAll => "retry-all",
            Self::PauseAll => "pause-all",
            Self::CancelAll => "cancel-all",
            Self::ResumeAll => "resume-all",
        }
    }

    /// Broadcast events carry no file id, so relevance is decided by a
    /// registry lookup instead of the payload.
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            Self::RetryAll | Self::PauseAll | Self::CancelAll | Self::ResumeAll
        )
    }
}

impl fmt::Display for UploadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UploadEvent {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| BusError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            size: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    FileRemoved {
        file: FileRecord,
    },
    UploadPause {
        file_id: String,
        is_paused: bool,
    },
    UploadRetry {
        file_id: String,
    },
    RetryAll,
    PauseAll,
    CancelAll {
        #[serde(default)]
        args: EventArgs,
    },
    ResumeAll,
}

impl EventPayload {
    pub fn event(&self) -> UploadEvent {
        match self {
            Self::FileRemoved { .. } => UploadEvent::FileRemoved,
            Self::UploadPause { .. } => UploadEvent::UploadPause,
            Self::UploadRetry { .. } => UploadEvent::UploadRetry,
            Self::RetryAll => UploadEvent::RetryAll,
            Self::PauseAll => UploadEvent::PauseAll,
            Self::CancelAll { .. } => UploadEvent::CancelAll,
            Self::ResumeAll => UploadEvent::ResumeAll,
        }
    }

    /// The file this payload is scoped to, if the event carries one.
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::FileRemoved { file } => Some(&file.id),
            Self::UploadPause { file_id, .. } | Self::UploadRetry { file_id } => Some(file_id),
            Self::RetryAll
            | Self::PauseAll
            | Self::CancelAll { .. }
            | Self::ResumeAll => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_round_trip_through_from_str() {
        for event in UploadEvent::ALL {
            assert_eq!(event.name().parse::<UploadEvent>().unwrap(), event);
        }
        assert!(matches!(
            "upload-progress".parse::<UploadEvent>(),
            Err(BusError::UnknownEvent(name)) if name == "upload-progress"
        ));
    }

    #[test]
    fn test_broadcast_events() {
        let broadcast: Vec<_> = UploadEvent::ALL
            .into_iter()
            .filter(UploadEvent::is_broadcast)
            .collect();
        assert_eq!(
            broadcast,
            vec![
                UploadEvent::RetryAll,
                UploadEvent::PauseAll,
                UploadEvent::CancelAll,
                UploadEvent::ResumeAll
            ]
        );
    }

    #[test]
    fn test_payload_file_id() {
        let removed = EventPayload::FileRemoved {
            file: FileRecord::new("f1").with_name("cat.png"),
        };
        assert_eq!(removed.file_id(), Some("f1"));
        assert_eq!(removed.event(), UploadEvent::FileRemoved);

        let pause = EventPayload::UploadPause {
            file_id: "f2".to_string(),
            is_paused: true,
        };
        assert_eq!(pause.file_id(), Some("f2"));

        assert_eq!(EventPayload::RetryAll.file_id(), None);
        assert_eq!(
            EventPayload::CancelAll { args: vec![] }.event(),
            UploadEvent::CancelAll
        );
    }

    #[test]
    fn test_payload_serialization() {
        let payload = EventPayload::UploadPause {
            file_id: "f1".to_string(),
            is_paused: false,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"upload-pause\""));

        let parsed: EventPayload =
            serde_json::from_str(r#"{"type":"cancel-all","args":[1,"two",null]}"#).unwrap();
        assert_eq!(
            parsed,
            EventPayload::CancelAll {
                args: vec![
                    serde_json::json!(1),
                    serde_json::json!("two"),
                    serde_json::Value::Null
                ]
            }
        );

        let parsed: EventPayload = serde_json::from_str(r#"{"type":"cancel-all"}"#).unwrap();
        assert_eq!(parsed, EventPayload::CancelAll { args: vec![] });
    }
}
