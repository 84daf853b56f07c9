//! Authenticated REST client for Gitea-compatible forges.
//!
//! Exposes only the primitives the upsert providers need: identity lookup,
//! commit status list/create and issue comment list/create/edit. The
//! transport (proxy, TLS trust) is built once at construction from the
//! provider configuration; calls carry no retries of their own.

use anyhow::anyhow;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{CommitStatus, ForgeUser, IssueComment, NewCommitStatus};
use crate::error::{NotifyError, NotifyResult};
use crate::notifications::delivery::{TlsSettings, http_client};

/// Forge connection configuration, validated by [`ForgeClient::new`]
#[derive(Debug, Clone, Default)]
pub struct ForgeConfig {
    /// Repository address of the form `https://host/owner/repo`
    pub address: String,
    /// Personal access token (required)
    pub token: String,
    pub proxy_url: Option<String>,
    pub tls: Option<TlsSettings>,
}

#[derive(Debug)]
pub struct ForgeClient {
    api_base: Url,
    owner: String,
    repo: String,
    token: String,
    http: reqwest::Client,
}

/// Splits a repository address into its API base URL and `owner`/`repo`
/// components. A trailing `.git` on the repository name is tolerated.
fn parse_repository_address(address: &str) -> NotifyResult<(Url, String, String)> {
    let url = Url::parse(address).map_err(|e| {
        NotifyError::invalid_config("address", format!("invalid URL {address:?}: {e}"))
    })?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() != 2 {
        return Err(NotifyError::invalid_config(
            "address",
            format!(
                "invalid repository id {:?}, expected \"owner/repo\"",
                url.path().trim_start_matches('/')
            ),
        ));
    }
    let owner = segments[0].to_string();
    let repo = segments[1].trim_end_matches(".git").to_string();

    let mut base = url.clone();
    base.set_path("");
    base.set_query(None);
    base.set_fragment(None);

    Ok((base, owner, repo))
}

impl ForgeClient {
    pub fn new(config: &ForgeConfig) -> NotifyResult<Self> {
        if config.token.is_empty() {
            return Err(NotifyError::invalid_config("token", "token cannot be empty"));
        }
        let (api_base, owner, repo) = parse_repository_address(&config.address)?;

        let proxy_url = config
            .proxy_url
            .as_deref()
            .map(|p| {
                Url::parse(p).map_err(|e| {
                    NotifyError::invalid_config("proxy_url", format!("invalid URL {p:?}: {e}"))
                })
            })
            .transpose()?;
        let http = http_client(proxy_url.as_ref(), config.tls.as_ref())?;

        Ok(Self {
            api_base,
            owner,
            repo,
            token: config.token.clone(),
            http,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn api_url(&self, path: &str) -> NotifyResult<Url> {
        self.api_base
            .join(&format!("api/v1/{path}"))
            .map_err(|e| NotifyError::invalid_config("address", format!("invalid API path: {e}")))
    }

    /// Sends a request, checks the response status and decodes the JSON
    /// body. Failures carry the operation name for context.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> NotifyResult<T> {
        let api_error = |source: anyhow::Error| NotifyError::Api {
            operation: operation.to_string(),
            source,
        };

        let response = request
            .header(AUTHORIZATION, format!("token {}", self.token))
            .send()
            .await
            .map_err(|e| api_error(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(anyhow!(
                "unexpected status code {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| api_error(e.into()))
    }

    /// Resolves the authenticated user, used to recognize this
    /// identity's own comments
    pub async fn current_user(&self) -> NotifyResult<ForgeUser> {
        let url = self.api_url("user")?;
        self.execute("get authenticated user", self.http.get(url)).await
    }

    /// Lists one page of commit statuses for a revision, most recent first
    pub async fn list_commit_statuses(
        &self,
        revision: &str,
        page: u32,
        limit: u32,
    ) -> NotifyResult<Vec<CommitStatus>> {
        let url = self.api_url(&format!(
            "repos/{}/{}/statuses/{revision}",
            self.owner, self.repo
        ))?;
        let request = self
            .http
            .get(url)
            .query(&[("page", page), ("limit", limit)]);
        self.execute("list commit statuses", request).await
    }

    pub async fn create_commit_status(
        &self,
        revision: &str,
        status: &NewCommitStatus,
    ) -> NotifyResult<CommitStatus> {
        let url = self.api_url(&format!(
            "repos/{}/{}/statuses/{revision}",
            self.owner, self.repo
        ))?;
        self.execute("create commit status", self.http.post(url).json(status))
            .await
    }

    /// Lists one page of comments on an issue or pull request
    pub async fn list_issue_comments(
        &self,
        index: u64,
        page: u32,
        limit: u32,
    ) -> NotifyResult<Vec<IssueComment>> {
        let url = self.api_url(&format!(
            "repos/{}/{}/issues/{index}/comments",
            self.owner, self.repo
        ))?;
        let request = self
            .http
            .get(url)
            .query(&[("page", page), ("limit", limit)]);
        self.execute("list issue comments", request).await
    }

    pub async fn create_issue_comment(
        &self,
        index: u64,
        body: &str,
    ) -> NotifyResult<IssueComment> {
        let url = self.api_url(&format!(
            "repos/{}/{}/issues/{index}/comments",
            self.owner, self.repo
        ))?;
        let request = self.http.post(url).json(&json!({ "body": body }));
        self.execute("create issue comment", request).await
    }

    pub async fn edit_issue_comment(
        &self,
        comment_id: i64,
        body: &str,
    ) -> NotifyResult<IssueComment> {
        let url = self.api_url(&format!(
            "repos/{}/{}/issues/comments/{comment_id}",
            self.owner, self.repo
        ))?;
        let request = self.http.patch(url).json(&json!({ "body": body }));
        self.execute("edit issue comment", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn config(address: &str) -> ForgeConfig {
        ForgeConfig {
            address: address.to_string(),
            token: "t0ken".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_owner_and_repo_from_address() {
        let client = ForgeClient::new(&config("https://git.example.com/foo/bar")).unwrap();
        assert_eq!(client.owner(), "foo");
        assert_eq!(client.repo(), "bar");

        let client = ForgeClient::new(&config("https://git.example.com/foo/bar.git")).unwrap();
        assert_eq!(client.repo(), "bar");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for address in [
            "not a url",
            "https://git.example.com/foo",
            "https://git.example.com/foo/bar/baz",
        ] {
            let err = ForgeClient::new(&config(address)).unwrap_err();
            assert!(
                matches!(err, NotifyError::InvalidConfig { .. }),
                "{address} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_token() {
        let mut cfg = config("https://git.example.com/foo/bar");
        cfg.token = String::new();
        let err = ForgeClient::new(&cfg).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn sends_token_auth_and_decodes_user() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/user")
                    .header("authorization", "token t0ken");
                then.status(200)
                    .json_body(serde_json::json!({"id": 1, "login": "bot"}));
            })
            .await;

        let client = ForgeClient::new(&config(&server.url("/foo/bar"))).unwrap();
        let user = client.current_user().await.unwrap();
        assert_eq!(user.login, "bot");
    }

    #[tokio::test]
    async fn surfaces_api_failures_with_operation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/user");
                then.status(401).body("bad credentials");
            })
            .await;

        let client = ForgeClient::new(&config(&server.url("/foo/bar"))).unwrap();
        let err = client.current_user().await.unwrap_err();
        match err {
            NotifyError::Api { operation, .. } => {
                assert_eq!(operation, "get authenticated user")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
