use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{Attachment, AttachmentDelivery, DeliveryError, DeliveryReceipt};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Hostnames allowed to use plain HTTP, for local testing.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Uploads attachments through Slack's external upload API.
#[derive(Clone)]
pub struct SlackUploader {
    api_base: String,
    bot_token: String,
    http: Client,
}

impl std::fmt::Debug for SlackUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackUploader")
            .field("api_base", &self.api_base)
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompleteUploadPayload<'a> {
    files: [FileRef<'a>; 1],
    channel_id: &'a str,
    initial_comment: &'a str,
}

#[derive(Debug, Serialize)]
struct FileRef<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompleteUploadResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackUploader {
    /// Uploader against the public Slack API.
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(bot_token, DEFAULT_SLACK_API_BASE)
    }

    /// Uploader against a custom API base. Non-localhost bases must use HTTPS.
    pub fn with_api_base(bot_token: impl Into<String>, api_base: &str) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(anyhow!("Slack bot token is empty"));
        }
        validate_api_base(api_base)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            http,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn reserve_upload(&self, filename: &str, length: usize) -> Result<(String, String), DeliveryError> {
        let length = length.to_string();
        let response = self
            .http
            .post(self.endpoint("files.getUploadURLExternal"))
            .form(&[
                ("filename", filename),
                ("token", self.bot_token.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await?;
        let body = response.text().await?;
        let parsed: UploadUrlResponse = serde_json::from_str(&body)
            .map_err(|error| DeliveryError::reserve_failed(filename, format!("failed to parse response: {error}")))?;

        if parsed.ok == Some(false) {
            let reason = parsed.error.unwrap_or_else(|| body.clone());
            return Err(DeliveryError::reserve_failed(filename, reason));
        }
        match (parsed.upload_url, parsed.file_id) {
            (Some(upload_url), Some(file_id)) if !upload_url.is_empty() && upload_url != "null" => Ok((upload_url, file_id)),
            _ => Err(DeliveryError::reserve_failed(filename, format!("no upload URL in response: {body}"))),
        }
    }

    async fn upload(&self, upload_url: &str, filename: &str, content: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(upload_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_string())
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::upload_failed(filename, body));
        }
        Ok(())
    }

    async fn complete_upload(&self, file_id: &str, attachment: &Attachment) -> Result<(), DeliveryError> {
        let payload = CompleteUploadPayload {
            files: [FileRef { id: file_id }],
            channel_id: &attachment.channel_id,
            initial_comment: &attachment.comment,
        };
        let response = self
            .http
            .post(self.endpoint("files.completeUploadExternal"))
            .bearer_auth(&self.bot_token)
            .header(header::CONTENT_TYPE, "application/json;charset=utf-8")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(DeliveryError::finalize_failed(&attachment.filename, &attachment.channel_id, body));
        }
        if let Ok(parsed) = serde_json::from_str::<CompleteUploadResponse>(&body)
            && parsed.ok == Some(false)
        {
            let reason = parsed.error.unwrap_or(body);
            return Err(DeliveryError::finalize_failed(&attachment.filename, &attachment.channel_id, reason));
        }
        Ok(())
    }
}

#[async_trait]
impl AttachmentDelivery for SlackUploader {
    async fn deliver(&self, attachment: Attachment) -> Result<DeliveryReceipt, DeliveryError> {
        debug!(filename = %attachment.filename, size = attachment.content.len(), channel = %attachment.channel_id, "reserving upload");
        let (upload_url, file_id) = self.reserve_upload(&attachment.filename, attachment.content.len()).await?;

        debug!(filename = %attachment.filename, file_id = %file_id, "uploading content");
        self.upload(&upload_url, &attachment.filename, &attachment.content).await?;

        self.complete_upload(&file_id, &attachment).await?;
        debug!(filename = %attachment.filename, file_id = %file_id, "upload shared to channel");

        Ok(DeliveryReceipt {
            file_id,
            filename: attachment.filename,
        })
    }
}

fn validate_api_base(base: &str) -> Result<()> {
    let parsed = Url::parse(base).map_err(|e| anyhow!("Invalid Slack API base URL '{}': {}", base, e))?;
    let host_name = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Slack API base must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }
    if parsed.scheme() != "https" {
        return Err(anyhow!(
            "Slack API base must use https for non-localhost hosts; got '{}://'",
            parsed.scheme()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn attachment() -> Attachment {
        Attachment::new("1700000000.log", "pod-a Running", "C07MUPT2QRE", "Output:")
    }

    #[test]
    fn rejects_plain_http_for_remote_hosts() {
        assert!(SlackUploader::with_api_base("xoxb-1", "http://slack.com/api").is_err());
        assert!(SlackUploader::with_api_base("xoxb-1", "http://127.0.0.1:9/api").is_ok());
        assert!(SlackUploader::with_api_base("", DEFAULT_SLACK_API_BASE).is_err());
    }

    #[test]
    fn debug_hides_token() {
        let uploader = SlackUploader::new("xoxb-secret").unwrap();
        assert!(!format!("{uploader:?}").contains("xoxb-secret"));
    }

    #[tokio::test]
    async fn delivers_through_all_three_steps() {
        let mut server = mockito::Server::new_async().await;
        let upload_url = format!("{}/upload/F1", server.url());

        let reserve = server
            .mock("POST", "/files.getUploadURLExternal")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("filename".into(), "1700000000.log".into()),
                Matcher::UrlEncoded("length".into(), "13".into()),
            ]))
            .with_status(200)
            .with_body(format!(r#"{{"ok":true,"upload_url":"{upload_url}","file_id":"F1"}}"#))
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/upload/F1")
            .match_header("content-type", "application/octet-stream")
            .match_body("pod-a Running")
            .with_status(200)
            .create_async()
            .await;
        let complete = server
            .mock("POST", "/files.completeUploadExternal")
            .match_header("authorization", "Bearer xoxb-1")
            .match_body(Matcher::PartialJsonString(
                r#"{"files":[{"id":"F1"}],"channel_id":"C07MUPT2QRE","initial_comment":"Output:"}"#.into(),
            ))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let uploader = SlackUploader::with_api_base("xoxb-1", &server.url()).unwrap();
        let receipt = uploader.deliver(attachment()).await.unwrap();

        assert_eq!(receipt.file_id, "F1");
        reserve.assert_async().await;
        upload.assert_async().await;
        complete.assert_async().await;
    }

    #[tokio::test]
    async fn reports_reserve_errors() {
        let mut server = mockito::Server::new_async().await;
        let _reserve = server
            .mock("POST", "/files.getUploadURLExternal")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"invalid_auth"}"#)
            .create_async()
            .await;

        let uploader = SlackUploader::with_api_base("xoxb-1", &server.url()).unwrap();
        let err = uploader.deliver(attachment()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::ReserveFailed { ref reason, .. } if reason == "invalid_auth"));
    }

    #[tokio::test]
    async fn reports_finalize_errors() {
        let mut server = mockito::Server::new_async().await;
        let upload_url = format!("{}/upload/F2", server.url());
        let _reserve = server
            .mock("POST", "/files.getUploadURLExternal")
            .with_status(200)
            .with_body(format!(r#"{{"ok":true,"upload_url":"{upload_url}","file_id":"F2"}}"#))
            .create_async()
            .await;
        let _upload = server.mock("POST", "/upload/F2").with_status(200).create_async().await;
        let _complete = server
            .mock("POST", "/files.completeUploadExternal")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .create_async()
            .await;

        let uploader = SlackUploader::with_api_base("xoxb-1", &server.url()).unwrap();
        let err = uploader.deliver(attachment()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::FinalizeFailed { ref reason, .. } if reason == "channel_not_found"));
    }
}
