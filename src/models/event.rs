//! Canonical reconciliation event consumed by all notification providers.

use std::collections::HashMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Metadata key carrying the commit/revision identifier that drives
/// commit status lookups.
pub const REVISION_KEY: &str = "revision";

/// Metadata key carrying the change request (pull request) number that
/// drives comment upserts.
pub const CHANGE_REQUEST_NUMBER_KEY: &str = "change-request-number";

/// Metadata key marking commit status traffic.
pub const COMMIT_STATUS_KEY: &str = "commit_status";

/// Value of [`COMMIT_STATUS_KEY`] marking an internal status ping that
/// broadcast providers must not forward.
pub const COMMIT_STATUS_UPDATE_VALUE: &str = "update";

/// Reserved reason value signalling that reconciliation is still in progress.
pub const PROGRESSING_REASON: &str = "Progressing";

/// The resource a reconciliation event concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

/// Event severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Diagnostic-only events, never mapped to a commit status
    Trace,
    Info,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Info => "info",
            Severity::Error => "error",
        }
    }
}

/// A single reconciliation event, as emitted by the control plane.
///
/// Constructed by the caller and consumed read-only by providers. `metadata`
/// may be absent entirely; all accessors tolerate the missing map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub involved_object: ObjectReference,
    pub severity: Severity,
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    pub timestamp: Timestamp,
    pub reporting_controller: String,
}

impl Event {
    /// Looks up a metadata value, tolerating an absent map
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    /// Returns true if the metadata map carries the given key/value pair
    pub fn has_metadata(&self, key: &str, value: &str) -> bool {
        self.meta(key) == Some(value)
    }

    /// Returns true for internal commit status pings that broadcast
    /// providers must skip
    pub fn is_commit_status_update(&self) -> bool {
        self.has_metadata(COMMIT_STATUS_KEY, COMMIT_STATUS_UPDATE_VALUE)
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reason == reason
    }

    /// The revision identifier, if the event carries one
    pub fn revision(&self) -> Option<&str> {
        self.meta(REVISION_KEY)
    }

    /// Iterates metadata pairs; empty when the map is absent
    pub fn metadata_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Display label for the involved object: `kind/name.namespace`
    /// with a lowercased kind
    pub fn source_label(&self) -> String {
        format!(
            "{}/{}.{}",
            self.involved_object.kind.to_lowercase(),
            self.involved_object.name,
            self.involved_object.namespace
        )
    }
}
