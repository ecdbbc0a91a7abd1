//! Attachment delivery for large command output.
//!
//! Output that is too large to post inline is handed to an
//! [`AttachmentDelivery`] implementation, which uploads it as a file to a chat
//! channel together with a short comment. [`SlackUploader`] implements the
//! Slack external upload flow:
//!
//! 1. `files.getUploadURLExternal` reserves an upload URL for a named blob of known size
//! 2. the blob is POSTed to that URL
//! 3. `files.completeUploadExternal` shares the file into a channel with a comment
//!
//! # Example
//!
//! ```ignore
//! use chatops_api::{Attachment, AttachmentDelivery, SlackUploader};
//!
//! let uploader = SlackUploader::new("xoxb-...")?;
//! let receipt = uploader
//!     .deliver(Attachment::new("1700000000.log", "pod-a Running", "C07MUPT2QRE", "Output:"))
//!     .await?;
//! println!("uploaded {}", receipt.file_id);
//! ```

mod slack;

use async_trait::async_trait;
use thiserror::Error;

pub use slack::{DEFAULT_SLACK_API_BASE, SlackUploader};

/// A named text blob destined for a chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
    pub channel_id: String,
    /// Comment posted alongside the file.
    pub comment: String,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<String>,
        channel_id: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            channel_id: channel_id.into(),
            comment: comment.into(),
        }
    }
}

/// Proof that an attachment reached the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub file_id: String,
    pub filename: String,
}

/// Errors surfaced while uploading or sharing an attachment.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not reserve an upload for '{filename}': {reason}")]
    ReserveFailed { filename: String, reason: String },

    #[error("upload of '{filename}' failed: {reason}")]
    UploadFailed { filename: String, reason: String },

    #[error("could not share '{filename}' to channel {channel_id}: {reason}")]
    FinalizeFailed {
        filename: String,
        channel_id: String,
        reason: String,
    },

    #[error("delivery is not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DeliveryError {
    pub fn reserve_failed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReserveFailed {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn upload_failed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn finalize_failed(filename: impl Into<String>, channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FinalizeFailed {
            filename: filename.into(),
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }
}

/// Capability to deliver a large text blob to a channel as a file.
#[async_trait]
pub trait AttachmentDelivery: Send + Sync {
    async fn deliver(&self, attachment: Attachment) -> Result<DeliveryReceipt, DeliveryError>;
}
