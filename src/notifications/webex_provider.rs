//! Webex notification provider.
//!
//! Sends a markdown message to a Webex space through the universal
//! messages API. Requires a bot access token and the target room id.

use std::fmt::Write as _;

use reqwest::Url;
use serde::Serialize;

use super::delivery::{PostOptions, TlsSettings, post_message};
use super::provider::NotificationProvider;
use crate::error::{NotifyError, NotifyResult};
use crate::models::{Event, Severity};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct WebexConfig {
    /// Messages API URL (required)
    pub url: String,
    pub proxy_url: Option<String>,
    pub tls: Option<TlsSettings>,
    /// Room id of the target space (required)
    pub room_id: String,
    /// Bot access token (required)
    pub token: String,
}

#[derive(Debug)]
pub struct WebexProvider {
    url: Url,
    proxy_url: Option<Url>,
    tls: Option<TlsSettings>,
    room_id: String,
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebexPayload {
    room_id: String,
    markdown: String,
}

fn markdown_body(event: &Event) -> String {
    let emoji = if event.severity == Severity::Error {
        "💣"
    } else {
        "✅"
    };

    let mut body = String::new();
    let _ = writeln!(body, "{emoji} **{}**", event.source_label());
    let _ = writeln!(body, "{}", event.message);
    for (k, v) in event.metadata_pairs() {
        let _ = writeln!(body, ">**{k}**: {v}");
    }
    body
}

impl WebexProvider {
    pub fn new(config: WebexConfig) -> NotifyResult<Self> {
        let url = Url::parse(&config.url).map_err(|e| {
            NotifyError::invalid_config("url", format!("invalid URL {:?}: {e}", config.url))
        })?;
        let proxy_url = config
            .proxy_url
            .map(|p| {
                Url::parse(&p).map_err(|e| {
                    NotifyError::invalid_config("proxy_url", format!("invalid URL {p:?}: {e}"))
                })
            })
            .transpose()?;
        if config.room_id.is_empty() {
            return Err(NotifyError::invalid_config(
                "room_id",
                "room id cannot be empty",
            ));
        }
        if config.token.is_empty() {
            return Err(NotifyError::invalid_config("token", "token cannot be empty"));
        }

        Ok(Self {
            url,
            proxy_url,
            tls: config.tls,
            room_id: config.room_id,
            token: config.token,
        })
    }
}

#[async_trait]
impl NotificationProvider for WebexProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        if event.is_commit_status_update() {
            return Ok(());
        }

        let payload = WebexPayload {
            room_id: self.room_id.clone(),
            markdown: markdown_body(event),
        };

        let token = self.token.clone();
        let mut options = PostOptions::new()
            .with_request_modifier(move |req| req.header("Authorization", format!("Bearer {token}")));
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy.clone());
        }
        if let Some(tls) = &self.tls {
            options = options.with_tls(tls.clone());
        }

        post_message(ctx, &self.url, &payload, options).await
    }

    fn name(&self) -> &'static str {
        "webex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectReference;
    use std::collections::HashMap;

    fn test_event() -> Event {
        Event {
            involved_object: ObjectReference {
                kind: "Bucket".to_string(),
                name: "artifacts".to_string(),
                namespace: "flux-system".to_string(),
            },
            severity: Severity::Info,
            reason: "ReconciliationSucceeded".to_string(),
            message: "stored artifact".to_string(),
            metadata: Some(HashMap::from([(
                "revision".to_string(),
                "v1.2.3".to_string(),
            )])),
            timestamp: jiff::Timestamp::UNIX_EPOCH,
            reporting_controller: "source-controller".to_string(),
        }
    }

    #[test]
    fn construction_requires_room_and_token() {
        let err = WebexProvider::new(WebexConfig {
            url: "https://webexapis.com/v1/messages".to_string(),
            room_id: String::new(),
            token: "tok".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));

        let err = WebexProvider::new(WebexConfig {
            url: "https://webexapis.com/v1/messages".to_string(),
            room_id: "room-1".to_string(),
            token: String::new(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn commit_status_updates_are_skipped() {
        use crate::models::{COMMIT_STATUS_KEY, COMMIT_STATUS_UPDATE_VALUE};
        use httpmock::prelude::*;
        use tokio_util::sync::CancellationToken;

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200);
            })
            .await;

        let provider = WebexProvider::new(WebexConfig {
            url: server.url("/v1/messages"),
            room_id: "room-1".to_string(),
            token: "tok".to_string(),
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

    #[test]
    fn markdown_lists_metadata_as_quotes() {
        let body = markdown_body(&test_event());
        assert!(body.starts_with("✅ **bucket/artifacts.flux-system**\n"));
        assert!(body.contains("stored artifact\n"));
        assert!(body.contains(">**revision**: v1.2.3\n"));
    }

    #[test]
    fn markdown_flags_errors() {
        let mut event = test_event();
        event.severity = Severity::Error;
        event.metadata = None;
        let body = markdown_body(&event);
        assert!(body.starts_with("💣"));
        assert!(!body.contains(">**"));
    }
}
