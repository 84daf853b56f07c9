//! Grafana annotation provider.
//!
//! Events become Graphite-format annotations on the Grafana annotation
//! API. Metadata is flattened into tags; Grafana's tag syntax reserves
//! `:`, so keys and values have it swapped for `|` before rendering.

use reqwest::Url;
use serde::Serialize;

use super::delivery::{PostOptions, TlsSettings, authorization_header, post_message};
use super::provider::NotificationProvider;
use crate::error::{NotifyError, NotifyResult};
use crate::models::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Tag attached to every annotation so they can be filtered in Grafana
const ANNOTATION_TAG: &str = "herald";

#[derive(Debug, Clone, Default)]
pub struct GrafanaConfig {
    /// Annotation API URL (required)
    pub url: String,
    pub proxy_url: Option<String>,
    pub token: Option<String>,
    pub tls: Option<TlsSettings>,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct GrafanaProvider {
    url: Url,
    proxy_url: Option<Url>,
    token: Option<String>,
    tls: Option<TlsSettings>,
    username: Option<String>,
    password: Option<String>,
}

/// Grafana annotation in Graphite format
#[derive(Debug, Serialize)]
struct AnnotationPayload {
    /// unix timestamp in seconds
    when: i64,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

fn sanitize_tag_component(s: &str) -> String {
    s.replace(':', "|")
}

fn annotation_payload(event: &Event) -> AnnotationPayload {
    let mut tags = Vec::with_capacity(event.metadata_pairs().count() + 5);
    tags.push(ANNOTATION_TAG.to_string());
    tags.push(event.reporting_controller.clone());
    for (k, v) in event.metadata_pairs() {
        tags.push(format!(
            "{}: {}",
            sanitize_tag_component(k),
            sanitize_tag_component(v)
        ));
    }
    tags.push(format!("kind: {}", event.involved_object.kind));
    tags.push(format!("name: {}", event.involved_object.name));
    tags.push(format!("namespace: {}", event.involved_object.namespace));

    AnnotationPayload {
        when: event.timestamp.as_second(),
        text: event.source_label(),
        tags,
    }
}

impl GrafanaProvider {
    pub fn new(config: GrafanaConfig) -> NotifyResult<Self> {
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

        Ok(Self {
            url,
            proxy_url,
            token: config.token,
            tls: config.tls,
            username: config.username,
            password: config.password,
        })
    }
}

#[async_trait]
impl NotificationProvider for GrafanaProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        if event.is_commit_status_update() {
            return Ok(());
        }

        let payload = annotation_payload(event);

        let auth = authorization_header(
            self.token.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        );
        let mut options = PostOptions::new();
        if let Some(auth) = auth {
            options = options.with_request_modifier(move |req| req.header("Authorization", auth.clone()));
        }
        if let Some(proxy) = &self.proxy_url {
            options = options.with_proxy(proxy.clone());
        }
        if let Some(tls) = &self.tls {
            options = options.with_tls(tls.clone());
        }

        post_message(ctx, &self.url, &payload, options).await
    }

    fn name(&self) -> &'static str {
        "grafana"
    }
}
