//! Gitea-compatible forge API client used by the stateful providers.

mod client;
mod types;

pub use client::{ForgeClient, ForgeConfig};
pub use types::{CommitStatus, ForgeUser, IssueComment, NewCommitStatus, StatusState};
