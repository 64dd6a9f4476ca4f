//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifier kinds (e.g.,
//! using a Slack channel id where a job id is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scheduler-assigned job identifier, the unique key for pending approvals.
///
/// This is also the correlation id embedded in a notification's interactive
/// controls, so a decision callback can be matched back to its approval
/// without any additional lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        JobId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// A chat channel identifier (e.g., `C024BE91L` or `#job-approvals`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(s: impl Into<String>) -> Self {
        ChannelId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        ChannelId(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

/// A chat message timestamp, Slack's per-channel message key (e.g.,
/// `1503435956.000247`). Opaque to us; only ever echoed back to the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTs(pub String);

impl MessageTs {
    pub fn new(s: impl Into<String>) -> Self {
        MessageTs(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageTs {
    fn from(s: String) -> Self {
        MessageTs(s)
    }
}

/// Handle to a posted notification: the channel it lives in plus its message
/// timestamp. Needed for later update or deletion.
///
/// A handle is only valid while its owning pending approval exists in the
/// store; once the approval is resolved the handle must not be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHandle {
    pub channel: ChannelId,
    pub ts: MessageTs,
}

impl NotificationHandle {
    pub fn new(channel: impl Into<ChannelId>, ts: impl Into<MessageTs>) -> Self {
        NotificationHandle {
            channel: channel.into(),
            ts: ts.into(),
        }
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ts, self.channel)
    }
}

impl From<&str> for MessageTs {
    fn from(s: &str) -> Self {
        MessageTs(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod job_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[a-z][a-z0-9_:-]{0,40}") {
                let id = JobId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: JobId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }

            #[test]
            fn display_is_raw_value(s in "[a-z][a-z0-9_:-]{0,40}") {
                let id = JobId::new(&s);
                prop_assert_eq!(format!("{}", id), s);
            }
        }

        #[test]
        fn transparent_serialization() {
            let id = JobId::new("web:1");
            assert_eq!(serde_json::to_string(&id).unwrap(), "\"web:1\"");
        }
    }

    mod notification_handle {
        use super::*;

        #[test]
        fn display_combines_ts_and_channel() {
            let handle = NotificationHandle::new("C024BE91L", "1503435956.000247");
            assert_eq!(format!("{}", handle), "1503435956.000247@C024BE91L");
        }

        #[test]
        fn serde_roundtrip() {
            let handle = NotificationHandle::new("C024BE91L", "1503435956.000247");
            let json = serde_json::to_string(&handle).unwrap();
            let parsed: NotificationHandle = serde_json::from_str(&json).unwrap();
            assert_eq!(handle, parsed);
        }
    }
}
