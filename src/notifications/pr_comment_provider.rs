//! Pull request comment provider.
//!
//! Maintains a single comment per provider identity on the change request
//! an event refers to. The comment carries a durable key marker; on later
//! events the provider finds its own previous comment by that marker and
//! edits it in place instead of posting again.

use std::fmt::Write as _;

use super::delivery::with_cancel;
use super::provider::NotificationProvider;
use crate::error::{NotifyError, NotifyResult};
use crate::external::forge::{ForgeClient, ForgeConfig};
use crate::models::{CHANGE_REQUEST_NUMBER_KEY, Event};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Prefix of the key marker embedded in every comment body
pub const COMMENT_KEY_PREFIX: &str = "herald-pr-comment-key";

// One page only: the comment is normally created right after the change
// request is opened, so it is almost always within the first page, and a
// bounded read keeps the cost of every post flat.
const COMMENT_PAGE_SIZE: u32 = 100;

#[derive(Debug)]
pub struct PullRequestCommentProvider {
    client: ForgeClient,
    username: String,
    provider_uid: String,
}

fn change_request_number(event: &Event) -> NotifyResult<u64> {
    let raw = event.meta(CHANGE_REQUEST_NUMBER_KEY).ok_or_else(|| {
        NotifyError::input(format!("missing {CHANGE_REQUEST_NUMBER_KEY:?} metadata key"))
    })?;
    raw.parse().map_err(|_| {
        NotifyError::input(format!(
            "invalid {CHANGE_REQUEST_NUMBER_KEY:?} metadata value {raw:?}"
        ))
    })
}

impl PullRequestCommentProvider {
    /// Creates the provider and resolves the authenticated username once,
    /// so later posts can recognize this identity's own comments without
    /// an extra round trip.
    pub async fn new(
        config: &ForgeConfig,
        provider_uid: impl Into<String>,
    ) -> NotifyResult<Self> {
        let provider_uid = provider_uid.into();
        if provider_uid.is_empty() {
            return Err(NotifyError::invalid_config(
                "provider_uid",
                "provider UID cannot be empty",
            ));
        }
        let client = ForgeClient::new(config)?;
        let user = client.current_user().await?;

        Ok(Self {
            client,
            username: user.login,
            provider_uid,
        })
    }

    /// The marker is stable for the provider's lifetime, so the same scan
    /// finds the comment again no matter how the body text around it
    /// changed.
    fn comment_key_marker(&self) -> String {
        format!("<!-- {}: {} -->", COMMENT_KEY_PREFIX, self.provider_uid)
    }

    fn format_comment_body(&self, event: &Event) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "**{}**", event.source_label());
        let _ = writeln!(body);
        let _ = writeln!(body, "{}", event.message);
        for (k, v) in event.metadata_pairs() {
            let _ = writeln!(body, "- **{k}**: {v}");
        }
        let _ = writeln!(body);
        let _ = write!(body, "{}", self.comment_key_marker());
        body
    }
}

#[async_trait]
impl NotificationProvider for PullRequestCommentProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        let number = change_request_number(event)?;
        let body = self.format_comment_body(event);

        let comments = with_cancel(
            ctx,
            self.client
                .list_issue_comments(number, 1, COMMENT_PAGE_SIZE),
        )
        .await??;

        let marker = self.comment_key_marker();
        let existing = comments.iter().find(|c| {
            c.user
                .as_ref()
                .is_some_and(|user| user.login == self.username)
                && c.body.contains(&marker)
        });

        match existing {
            Some(comment) => {
                tracing::debug!(
                    owner = self.client.owner(),
                    repo = self.client.repo(),
                    number,
                    comment_id = comment.id,
                    "updating existing change request comment"
                );
                with_cancel(ctx, self.client.edit_issue_comment(comment.id, &body)).await??;
            }
            None => {
                with_cancel(ctx, self.client.create_issue_comment(number, &body)).await??;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pull-request-comment"
    }
}
