//! Opsgenie alert provider.
//!
//! Raises an alert per event through the Opsgenie alert API, with the
//! event severity and metadata carried in the alert details.

use std::collections::HashMap;

use reqwest::Url;
use serde::Serialize;

use super::delivery::{PostOptions, TlsSettings, post_message};
use super::provider::NotificationProvider;
use crate::error::{NotifyError, NotifyResult};
use crate::models::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct OpsgenieConfig {
    /// Alert API URL (required)
    pub url: String,
    pub proxy_url: Option<String>,
    pub tls: Option<TlsSettings>,
    /// Opsgenie API key (required)
    pub api_key: String,
}

#[derive(Debug)]
pub struct OpsgenieProvider {
    url: Url,
    proxy_url: Option<Url>,
    tls: Option<TlsSettings>,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct OpsgenieAlert {
    message: String,
    description: String,
    details: HashMap<String, String>,
}

fn alert_payload(event: &Event) -> OpsgenieAlert {
    let mut details: HashMap<String, String> = event
        .metadata_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    details.insert("severity".to_string(), event.severity.as_str().to_string());

    OpsgenieAlert {
        message: event.source_label(),
        description: event.message.clone(),
        details,
    }
}

impl OpsgenieProvider {
    pub fn new(config: OpsgenieConfig) -> NotifyResult<Self> {
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
        if config.api_key.is_empty() {
            return Err(NotifyError::invalid_config(
                "api_key",
                "API key cannot be empty",
            ));
        }

        Ok(Self {
            url,
            proxy_url,
            tls: config.tls,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl NotificationProvider for OpsgenieProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        if event.is_commit_status_update() {
            return Ok(());
        }

        let payload = alert_payload(event);

        let api_key = self.api_key.clone();
        let mut options = PostOptions::new()
            .with_request_modifier(move |req| req.header("Authorization", format!("GenieKey {api_key}")));
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy.clone());
        }
        if let Some(tls) = &self.tls {
            options = options.with_tls(tls.clone());
        }

        post_message(ctx, &self.url, &payload, options).await
    }

    fn name(&self) -> &'static str {
        "opsgenie"
    }
}
