//! Notification system with pluggable providers.
//!
//! The core trait [`NotificationProvider`] is implemented by broadcast
//! providers (chat, annotation and alert sinks) and by upsert providers
//! (commit status, change request comments). All of them deliver through
//! the shared retrying pipeline in [`delivery`].

mod commit_status_provider;
mod discord_provider;
mod dispatcher;
mod grafana_provider;
mod opsgenie_provider;
mod pr_comment_provider;
mod provider;
mod slack_provider;
mod webex_provider;

pub mod delivery;

pub use commit_status_provider::CommitStatusProvider;
pub use discord_provider::{DiscordConfig, DiscordProvider};
pub use dispatcher::{DispatchFailure, NotificationDispatcher};
pub use grafana_provider::{GrafanaConfig, GrafanaProvider};
pub use opsgenie_provider::{OpsgenieConfig, OpsgenieProvider};
pub use pr_comment_provider::{COMMENT_KEY_PREFIX, PullRequestCommentProvider};
pub use provider::NotificationProvider;
pub use slack_provider::{SlackConfig, SlackProvider};
pub use webex_provider::{WebexConfig, WebexProvider};
