//! Slack message payload types.
//!
//! Only the legacy-attachment subset the workflow uses is modeled: attachments
//! with fields, interactive button actions with an optional confirmation
//! dialog, and the interaction callback Slack posts back when a button is
//! pressed.

use serde::{Deserialize, Serialize};

/// One titled key/value pair within an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

impl AttachmentField {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        AttachmentField {
            title: title.into(),
            value: value.into(),
            short: false,
        }
    }
}

/// Confirmation dialog shown before an action fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmField {
    pub title: String,
    pub text: String,
    pub ok_text: String,
    pub dismiss_text: String,
}

/// An interactive button within an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentAction {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ConfirmField>,
}

impl AttachmentAction {
    /// A plain button.
    pub fn button(name: impl Into<String>, text: impl Into<String>) -> Self {
        AttachmentAction {
            name: name.into(),
            text: text.into(),
            kind: "button".to_string(),
            style: None,
            confirm: None,
        }
    }
}

/// A message attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,
}

/// The user who pressed a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackUser {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// The channel the interaction happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The action entry inside a callback; only the name matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAction {
    pub name: String,
}

/// The original message as rendered, echoed back in the callback so the
/// decision outcome can be appended to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalMessage {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// An inbound decision callback.
///
/// Slack delivers this as the form-encoded `payload` field of an interactive
/// message POST. The `callback_id` is the correlation id (a job id); a
/// well-formed callback carries exactly one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCallback {
    pub callback_id: String,
    #[serde(default)]
    pub actions: Vec<CallbackAction>,
    pub user: CallbackUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<CallbackChannel>,
    #[serde(default)]
    pub message_ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message: Option<OriginalMessage>,
}
