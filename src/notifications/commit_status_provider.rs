//! Commit status provider.
//!
//! Upserts a commit status on the forge for the revision an event refers
//! to. The forge keeps every status ever posted for a context, so before
//! writing, the provider lists the most recent statuses and skips the
//! write when the latest status for its context already matches.

use super::delivery::with_cancel;
use super::provider::NotificationProvider;
use crate::error::{NotifyError, NotifyResult};
use crate::external::forge::{CommitStatus, ForgeClient, ForgeConfig, NewCommitStatus, StatusState};
use crate::models::{Event, PROGRESSING_REASON, Severity};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

const STATUS_PAGE_SIZE: u32 = 50;

#[derive(Debug)]
pub struct CommitStatusProvider {
    client: ForgeClient,
    status_context: String,
}

/// Maps an event to the status state to publish.
///
/// Progressing events are always pending; otherwise the severity decides.
/// Trace events carry no deliverable outcome and are rejected rather than
/// silently defaulted.
fn to_status_state(event: &Event) -> NotifyResult<StatusState> {
    if event.has_reason(PROGRESSING_REASON) {
        return Ok(StatusState::Pending);
    }
    match event.severity {
        Severity::Info => Ok(StatusState::Success),
        Severity::Error => Ok(StatusState::Failure),
        severity => Err(NotifyError::StateMapping { severity }),
    }
}

/// Extracts the digest from a revision string of the form
/// `<ref>@<alg>:<digest>`, tolerating a bare digest.
fn parse_revision(revision: &str) -> NotifyResult<&str> {
    let digest = match revision.rsplit_once(':') {
        Some((_, digest)) => digest,
        None => revision,
    };
    if digest.is_empty() {
        return Err(NotifyError::input(format!(
            "malformed revision {revision:?}"
        )));
    }
    Ok(digest)
}

/// Returns true if the most recent status sharing the target's context
/// already carries the same state and description.
///
/// The scan is first-match-wins: a context match with a differing state or
/// description means the status drifted and must be re-posted, so the scan
/// stops there instead of looking further back in history.
fn is_duplicate(statuses: &[CommitStatus], target: &NewCommitStatus) -> bool {
    for status in statuses {
        if status.context.is_empty()
            || status.description.is_empty()
            || status.state == StatusState::Unknown
        {
            continue;
        }
        if status.context == target.context {
            return status.state == target.state && status.description == target.description;
        }
    }
    false
}

impl CommitStatusProvider {
    /// Creates the provider; `status_context` is the label under which
    /// statuses are published and must not be empty.
    pub fn new(config: &ForgeConfig, status_context: impl Into<String>) -> NotifyResult<Self> {
        let status_context = status_context.into();
        if status_context.is_empty() {
            return Err(NotifyError::invalid_config(
                "status_context",
                "commit status context cannot be empty",
            ));
        }
        Ok(Self {
            client: ForgeClient::new(config)?,
            status_context,
        })
    }
}

#[async_trait]
impl NotificationProvider for CommitStatusProvider {
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()> {
        let revision = event
            .revision()
            .ok_or_else(|| NotifyError::input("missing revision metadata"))?;
        let revision = parse_revision(revision)?;

        let target = NewCommitStatus {
            state: to_status_state(event)?,
            context: self.status_context.clone(),
            description: event.reason.to_lowercase(),
            target_url: None,
        };

        let statuses = with_cancel(
            ctx,
            self.client
                .list_commit_statuses(revision, 1, STATUS_PAGE_SIZE),
        )
        .await??;

        if is_duplicate(&statuses, &target) {
            tracing::debug!(
                owner = self.client.owner(),
                repo = self.client.repo(),
                revision,
                context = %target.context,
                "skipping duplicate commit status"
            );
            return Ok(());
        }

        with_cancel(ctx, self.client.create_commit_status(revision, &target)).await??;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "commit-status"
    }
}
