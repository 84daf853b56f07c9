//! Core notification provider trait.
//!
//! Every sink implements the same capability: turn one [`Event`] into zero
//! or one outbound write. Broadcast sinks (chat, annotations, alerts) send
//! unconditionally; upsert sinks (commit status, change request comments)
//! first query remote state to decide between create, update and skip.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::NotifyResult;
use crate::models::{Event, Severity};

/// Trait for notification providers.
///
/// Uses `async_trait` to support async methods with dynamic dispatch.
/// All providers must be Send + Sync so one event can be dispatched to
/// many providers concurrently.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Posts a single event to the sink.
    ///
    /// `Ok(())` means the event was delivered or deliberately skipped
    /// (e.g. an internal commit status ping on a broadcast sink). An error
    /// means delivery failed and is surfaced to the dispatcher, which
    /// aggregates failures across providers.
    async fn post(&self, ctx: &CancellationToken, event: &Event) -> NotifyResult<()>;

    /// Returns the provider name for logging/debugging
    fn name(&self) -> &'static str;
}

/// Attachment color used by chat-style sinks
pub(crate) fn severity_color(event: &Event) -> &'static str {
    if event.severity == Severity::Error {
        "danger"
    } else {
        "good"
    }
}
