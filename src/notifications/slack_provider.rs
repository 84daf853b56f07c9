//! Slack notification provider.
//!
//! Posts events to an incoming webhook or to the chat.postMessage API.
//! The latter always answers HTTP 200 and signals failure in the JSON
//! body, so it gets its own response validator.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::delivery::{PostOptions, TlsSettings, post_message};
use super::provider::{NotificationProvider, severity_color};
use crate::error::{NotifyError, NotifyResult};
use crate::models::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

const CHAT_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack provider configuration, validated by [`SlackProvider::new`]
#[derive(Debug, Clone, Default)]
pub struct SlackConfig {
    /// Incoming webhook or chat API URL (required)
    pub hook_url: String,
    pub proxy_url: Option<String>,
    /// Bot token, required for the chat API, unused by plain webhooks
    pub token: Option<String>,
    pub tls: Option<TlsSettings>,
    /// Display name; defaults to the event's reporting controller
    pub username: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug)]
pub struct SlackProvider {
    hook_url: Url,
    proxy_url: Option<Url>,
    token: Option<String>,
    tls: Option<TlsSettings>,
    username: Option<String>,
    channel: Option<String>,
}

/// Message payload for Slack-compatible sinks
#[derive(Debug, Serialize)]
pub(crate) struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub username: String,
    pub attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SlackAttachment {
    pub color: String,
    pub author_name: String,
    pub text: String,
    pub mrkdwn_in: Vec<String>,
    pub fields: Vec<SlackField>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Builds the Slack message payload for an event.
///
/// Shared with the Discord provider, whose webhook endpoint accepts the
/// same format.
pub(crate) fn slack_payload(
    event: &Event,
    username: Option<&str>,
    channel: Option<&str>,
) -> SlackPayload {
    let username = username
        .filter(|u| !u.is_empty())
        .unwrap_or(&event.reporting_controller)
        .to_string();

    let fields = event
        .metadata_pairs()
        .map(|(k, v)| SlackField {
            title: k.to_string(),
            value: v.to_string(),
            short: false,
        })
        .collect();

    SlackPayload {
        channel: channel.filter(|c| !c.is_empty()).map(str::to_string),
        username,
        attachments: vec![SlackAttachment {
            color: severity_color(event).to_string(),
            author_name: event.source_label(),
            text: event.message.clone(),
            mrkdwn_in: vec!["text".to_string()],
            fields,
        }],
    }
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    ok: bool,
    #[serde(default)]
    error: String,
}

/// Validates a chat.postMessage response body: the API always returns
/// HTTP 200 and reports failure via the `ok` flag.
fn validate_chat_response(_status_code: u16, body: &[u8]) -> Result<(), String> {
    let resp: ChatApiResponse = serde_json::from_slice(body)
        .map_err(|e| format!("unable to parse response body: {e}"))?;
    if resp.ok {
        Ok(())
    } else {
        Err(format!("sink responded with error: {}", resp.error))
    }
}

impl SlackProvider {
    pub fn new(config: SlackConfig) -> NotifyResult<Self> {
        let hook_url = Url::parse(&config.hook_url).map_err(|e| {
            NotifyError::invalid_config("hook_url", format!("invalid URL {:?}: {e}", config.hook_url))
        })?;
        let proxy_url = config
            .proxy_url
            .map(|p| {
                Url::parse(&p).map_err(|e| {
                    NotifyError::invalid_config("proxy_url", format!("invalid URL {p:?}: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            hook_url,
            proxy_url,
            token: config.token,
            tls: config.tls,
            username: config.username,
            channel: config.channel,
        })
    }
}

#[async_trait]
impl NotificationProvider for SlackProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        if event.is_commit_status_update() {
            return Ok(());
        }

        let payload = slack_payload(event, self.username.as_deref(), self.channel.as_deref());

        let mut options = PostOptions::new();
        if let Some(token) = self.token.clone().filter(|t| !t.is_empty()) {
            options = options
                .with_request_modifier(move |req| req.header("Authorization", format!("Bearer {token}")));
        }
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy.clone());
        }
        if let Some(tls) = &self.tls {
            options = options.with_tls(tls.clone());
        }
        if self.hook_url.as_str() == CHAT_API_URL {
            options = options.with_response_validator(validate_chat_response);
        }

        post_message(ctx, &self.hook_url, &payload, options).await
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{COMMIT_STATUS_KEY, COMMIT_STATUS_UPDATE_VALUE, ObjectReference, Severity};
    use httpmock::prelude::*;
    use std::collections::HashMap;

    fn test_event() -> Event {
        Event {
            involved_object: ObjectReference {
                kind: "GitRepository".to_string(),
                name: "podinfo".to_string(),
                namespace: "flux-system".to_string(),
            },
            severity: Severity::Info,
            reason: "ReconciliationSucceeded".to_string(),
            message: "fetched revision abc123".to_string(),
            metadata: Some(HashMap::from([(
                "summary".to_string(),
                "ok".to_string(),
            )])),
            timestamp: jiff::Timestamp::UNIX_EPOCH,
            reporting_controller: "source-controller".to_string(),
        }
    }

    #[test]
    fn construction_rejects_malformed_urls() {
        let err = SlackProvider::new(SlackConfig {
            hook_url: "not a url".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));

        let err = SlackProvider::new(SlackConfig {
            hook_url: "https://hooks.slack.com/services/x".to_string(),
            proxy_url: Some("::://bad".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));
    }

    #[test]
    fn payload_defaults_username_to_reporting_controller() {
        let event = test_event();
        let payload = slack_payload(&event, None, Some("#alerts"));
        assert_eq!(payload.username, "source-controller");
        assert_eq!(payload.channel.as_deref(), Some("#alerts"));

        let attachment = &payload.attachments[0];
        assert_eq!(attachment.color, "good");
        assert_eq!(attachment.author_name, "gitrepository/podinfo.flux-system");
        assert_eq!(attachment.text, "fetched revision abc123");
        assert_eq!(attachment.fields.len(), 1);
        assert_eq!(attachment.fields[0].title, "summary");
    }

    #[test]
    fn payload_marks_errors_danger() {
        let mut event = test_event();
        event.severity = Severity::Error;
        event.metadata = None;
        let payload = slack_payload(&event, Some("bot"), None);
        assert_eq!(payload.username, "bot");
        assert_eq!(payload.attachments[0].color, "danger");
        assert!(payload.attachments[0].fields.is_empty());
    }

    #[test]
    fn chat_response_validation() {
        assert!(validate_chat_response(200, br#"{"ok":true}"#).is_ok());

        let err =
            validate_chat_response(200, br#"{"ok":false,"error":"channel_not_found"}"#).unwrap_err();
        assert!(err.contains("channel_not_found"));

        assert!(validate_chat_response(200, b"not json").is_err());
    }

    #[tokio::test]
    async fn commit_status_updates_are_skipped() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/services/hook");
                then.status(200);
            })
            .await;

        let provider = SlackProvider::new(SlackConfig {
            hook_url: server.url("/services/hook"),
            ..Default::default()
        })
        .unwrap();

        let mut event = test_event();
        event.metadata = Some(HashMap::from([(
            COMMIT_STATUS_KEY.to_string(),
            COMMIT_STATUS_UPDATE_VALUE.to_string(),
        )]));

        provider
            .post(&CancellationToken::new(), &event)
            .await
            .unwrap();
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn posts_payload_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/services/hook")
                    .header("authorization", "Bearer xoxb-token")
                    .json_body_partial(r#"{"username":"source-controller"}"#);
                then.status(200);
            })
            .await;

        let provider = SlackProvider::new(SlackConfig {
            hook_url: server.url("/services/hook"),
            token: Some("xoxb-token".to_string()),
            ..Default::default()
        })
        .unwrap();

        provider
            .post(&CancellationToken::new(), &test_event())
            .await
            .unwrap();
        mock.assert_hits_async(1).await;
    }
}
