//! Retrying HTTP delivery pipeline shared by all notification providers.
//!
//! A single entry point, [`post_message`], serializes a payload, issues a
//! JSON POST and validates the response. Transient failures (transport
//! errors, 5xx responses) are retried with exponential backoff; client
//! errors are not. The pipeline applies no deadline of its own, the
//! caller's cancellation token governs how long a delivery may take.

use std::future::Future;
use std::time::Duration;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{NotifyError, NotifyResult};

const RETRY_WAIT_MIN: Duration = Duration::from_secs(2);
const RETRY_WAIT_MAX: Duration = Duration::from_secs(30);
const RETRY_MAX: u32 = 4;

pub type RequestModifier = Box<dyn Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync>;
pub type ResponseValidator = Box<dyn Fn(u16, &[u8]) -> Result<(), String> + Send + Sync>;

/// Transport trust overrides for a single provider
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// PEM-encoded root certificate bundle to trust in addition to the
    /// system roots
    pub root_ca_pem: Option<Vec<u8>>,
    /// Disable certificate verification entirely
    pub insecure_skip_verify: bool,
}

/// Per-provider delivery options applied to one [`post_message`] call
#[derive(Default)]
pub struct PostOptions {
    pub proxy_url: Option<Url>,
    pub tls: Option<TlsSettings>,
    pub request_modifier: Option<RequestModifier>,
    pub response_validator: Option<ResponseValidator>,
}

impl PostOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy(mut self, proxy_url: Url) -> Self {
        self.proxy_url = Some(proxy_url);
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Mutates the outgoing request before send, e.g. to inject an
    /// authorization header
    pub fn with_request_modifier(
        mut self,
        modifier: impl Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync + 'static,
    ) -> Self {
        self.request_modifier = Some(Box::new(modifier));
        self
    }

    /// Replaces the default success predicate over (status code, body)
    pub fn with_response_validator(
        mut self,
        validator: impl Fn(u16, &[u8]) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.response_validator = Some(Box::new(validator));
        self
    }
}

/// Runs a future against the caller's cancellation token.
///
/// Cancellation wins over an in-flight request or backoff sleep and
/// surfaces as [`NotifyError::Cancelled`].
pub(crate) async fn with_cancel<T>(
    ctx: &CancellationToken,
    fut: impl Future<Output = T>,
) -> NotifyResult<T> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(NotifyError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Builds a reqwest client from proxy/TLS overrides.
///
/// No client-level timeout is set; request lifetime is governed by the
/// caller's cancellation token.
pub(crate) fn http_client(
    proxy_url: Option<&Url>,
    tls: Option<&TlsSettings>,
) -> NotifyResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().use_rustls_tls();

    if let Some(proxy) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy.clone()).map_err(|e| NotifyError::Delivery {
            status_code: None,
            message: format!("unable to configure proxy: {e}"),
        })?;
        builder = builder.proxy(proxy);
    }

    if let Some(tls) = tls {
        if let Some(pem) = &tls.root_ca_pem {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                NotifyError::invalid_config("tls", format!("invalid root CA bundle: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        if tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder.build().map_err(|e| NotifyError::Delivery {
        status_code: None,
        message: format!("unable to build HTTP client: {e}"),
    })
}

/// Authorization header value for a provider credential: bearer token when
/// present, basic auth when both username and password are set, else none.
pub(crate) fn authorization_header(
    token: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Option<String> {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        return Some(format!("Bearer {token}"));
    }
    match (username, password) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some(format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{user}:{pass}"))
        )),
        _ => None,
    }
}

/// Default success predicate: exactly HTTP 200, 201 and 202 are accepted.
pub(crate) fn default_response_validator(status_code: u16, body: &[u8]) -> Result<(), String> {
    match status_code {
        200 | 201 | 202 => Ok(()),
        _ => Err(format!(
            "request failed with status code {status_code}: {}",
            String::from_utf8_lossy(body)
        )),
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    RETRY_WAIT_MIN
        .saturating_mul(1 << attempt.min(16))
        .min(RETRY_WAIT_MAX)
}

/// Serializes `payload` to JSON and POSTs it to `address`, retrying
/// transient failures with exponential backoff.
///
/// Retries cover transport errors and 5xx responses, up to [`RETRY_MAX`]
/// retries with waits between [`RETRY_WAIT_MIN`] and [`RETRY_WAIT_MAX`].
/// Client errors (4xx) go straight to response validation. Every failure
/// mode surfaces as a single [`NotifyError`]; callers must not retry again.
pub async fn post_message<T: Serialize + ?Sized>(
    ctx: &CancellationToken,
    address: &Url,
    payload: &T,
    options: PostOptions,
) -> NotifyResult<()> {
    let body = serde_json::to_vec(payload).map_err(|e| NotifyError::Serialize { source: e })?;
    let client = http_client(options.proxy_url.as_ref(), options.tls.as_ref())?;

    let mut attempt: u32 = 0;
    let response = loop {
        let mut request = client
            .post(address.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone());
        if let Some(modify) = &options.request_modifier {
            request = modify(request);
        }

        match with_cancel(ctx, request.send()).await? {
            Ok(resp) if resp.status().is_server_error() && attempt < RETRY_MAX => {
                tracing::debug!(
                    url = %address,
                    status = resp.status().as_u16(),
                    attempt,
                    "server error, retrying"
                );
            }
            Ok(resp) => break resp,
            Err(err) if attempt < RETRY_MAX => {
                tracing::debug!(url = %address, error = %err, attempt, "transport error, retrying");
            }
            Err(err) => {
                return Err(NotifyError::Delivery {
                    status_code: None,
                    message: format!("failed to execute request: {err}"),
                });
            }
        }

        with_cancel(ctx, tokio::time::sleep(backoff_delay(attempt))).await?;
        attempt += 1;
    };

    let status_code = response.status().as_u16();
    let body = with_cancel(ctx, response.bytes())
        .await?
        .map_err(|e| NotifyError::Delivery {
            status_code: Some(status_code),
            message: format!("failed to read response body: {e}"),
        })?;

    let outcome = match &options.response_validator {
        Some(validate) => validate(status_code, &body),
        None => default_response_validator(status_code, &body),
    };
    outcome.map_err(|message| NotifyError::Delivery {
        status_code: Some(status_code),
        message,
    })
}
