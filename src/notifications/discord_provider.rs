//! Discord notification provider.
//!
//! Discord webhooks accept Slack-formatted payloads on a `/slack`
//! sub-path, so this provider reuses the Slack payload builder and only
//! normalizes the webhook URL at construction.

use reqwest::Url;

use super::delivery::{PostOptions, post_message};
use super::provider::NotificationProvider;
use super::slack_provider::slack_payload;
use crate::error::{NotifyError, NotifyResult};
use crate::models::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct DiscordConfig {
    /// Discord webhook URL (required); a `/slack` suffix is appended
    /// when missing
    pub hook_url: String,
    pub proxy_url: Option<String>,
    pub username: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug)]
pub struct DiscordProvider {
    hook_url: Url,
    proxy_url: Option<Url>,
    username: Option<String>,
    channel: Option<String>,
}

impl DiscordProvider {
    pub fn new(config: DiscordConfig) -> NotifyResult<Self> {
        let mut hook_url = Url::parse(&config.hook_url).map_err(|e| {
            NotifyError::invalid_config("hook_url", format!("invalid URL {:?}: {e}", config.hook_url))
        })?;

        // route through the Slack-compatible endpoint
        if !hook_url.path().trim_end_matches('/').ends_with("/slack") {
            hook_url
                .path_segments_mut()
                .map_err(|_| NotifyError::invalid_config("hook_url", "URL cannot be a base"))?
                .pop_if_empty()
                .push("slack");
        }

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
            username: config.username,
            channel: config.channel,
        })
    }
}

#[async_trait]
impl NotificationProvider for DiscordProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        if event.is_commit_status_update() {
            return Ok(());
        }

        let payload = slack_payload(event, self.username.as_deref(), self.channel.as_deref());

        let mut options = PostOptions::new();
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy.clone());
        }

        post_message(ctx, &self.hook_url, &payload, options).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_slack_suffix_when_missing() {
        let provider = DiscordProvider::new(DiscordConfig {
            hook_url: "https://discord.com/api/webhooks/1/abc".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.hook_url.path(), "/api/webhooks/1/abc/slack");
    }

    #[test]
    fn keeps_existing_slack_suffix() {
        let provider = DiscordProvider::new(DiscordConfig {
            hook_url: "https://discord.com/api/webhooks/1/abc/slack".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.hook_url.path(), "/api/webhooks/1/abc/slack");
    }

    #[tokio::test]
    async fn commit_status_updates_are_skipped() {
        use crate::models::{
            COMMIT_STATUS_KEY, COMMIT_STATUS_UPDATE_VALUE, ObjectReference, Severity,
        };
        use httpmock::prelude::*;
        use std::collections::HashMap;

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/webhooks/1/abc/slack");
                then.status(200);
            })
            .await;

        let provider = DiscordProvider::new(DiscordConfig {
            hook_url: server.url("/api/webhooks/1/abc"),
            ..Default::default()
        })
        .unwrap();

        let event = Event {
            involved_object: ObjectReference {
                kind: "Kustomization".to_string(),
                name: "podinfo".to_string(),
                namespace: "apps".to_string(),
            },
            severity: Severity::Info,
            reason: "Progressing".to_string(),
            message: "reconciliation in progress".to_string(),
            metadata: Some(HashMap::from([(
                COMMIT_STATUS_KEY.to_string(),
                COMMIT_STATUS_UPDATE_VALUE.to_string(),
            )])),
            timestamp: jiff::Timestamp::UNIX_EPOCH,
            reporting_controller: "kustomize-controller".to_string(),
        };
        provider
            .post(&CancellationToken::new(), &event)
            .await
            .unwrap();
        mock.assert_hits_async(0).await;
    }

    #[test]
    fn rejects_malformed_url() {
        let err = DiscordProvider::new(DiscordConfig {
            hook_url: "nope".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));
    }
}
