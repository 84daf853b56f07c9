//! Wire types for the forge REST API.

use serde::{Deserialize, Serialize};

/// Commit status state as exposed by the forge API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Error,
    Failure,
    Warning,
    /// Catch-all for states this crate does not act on
    #[serde(other)]
    Unknown,
}

/// Authenticated user, from the who-am-i endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ForgeUser {
    pub id: i64,
    pub login: String,
}

/// An existing commit status returned by the list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CommitStatus {
    pub id: i64,
    #[serde(default)]
    pub context: String,
    #[serde(rename = "status")]
    pub state: StatusState,
    #[serde(default)]
    pub description: String,
}

/// Commit status creation request
#[derive(Debug, Clone, Serialize)]
pub struct NewCommitStatus {
    pub state: StatusState,
    pub context: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// An existing issue (pull request) comment
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: i64,
    #[serde(default)]
    pub body: String,
    pub user: Option<ForgeUser>,
}
