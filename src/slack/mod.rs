//! Chat platform integration (Slack Web API).
//!
//! The chat platform is an external collaborator with three operations the
//! workflow needs: post a message, update it in place, delete it. The
//! [`ChatApi`] trait is the seam the core is written against; [`SlackClient`]
//! is the real implementation.

use std::future::Future;

use crate::types::{ChannelId, NotificationHandle};

pub mod client;
pub mod types;

pub use client::{ChatError, SlackClient};
pub use types::{
    Attachment, AttachmentAction, AttachmentField, ConfirmField, InteractionCallback,
};

/// Posts, updates, and deletes notification messages.
pub trait ChatApi {
    /// The error type returned by this chat client.
    type Error: std::fmt::Display + Send;

    /// Posts a message and returns the handle needed to update or delete it.
    fn post_message(
        &self,
        channel: &ChannelId,
        attachments: Vec<Attachment>,
    ) -> impl Future<Output = Result<NotificationHandle, Self::Error>> + Send;

    /// Rewrites an existing message in place.
    fn update_message(
        &self,
        handle: &NotificationHandle,
        attachments: Vec<Attachment>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Deletes a previously posted message.
    fn delete_message(
        &self,
        handle: &NotificationHandle,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
