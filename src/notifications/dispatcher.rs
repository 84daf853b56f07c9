//! Fan-out of one event to every configured provider.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::provider::NotificationProvider;
use crate::error::NotifyError;
use crate::models::Event;

/// A provider that failed to deliver an event
#[derive(Debug)]
pub struct DispatchFailure {
    pub provider: &'static str,
    pub error: NotifyError,
}

/// Holds the configured providers and posts each event to all of them.
///
/// Providers are independent: they run concurrently, share no mutable
/// state, and one provider's failure never short-circuits the others.
/// Whether a partial failure is fatal is the caller's decision, so
/// [`dispatch`](NotificationDispatcher::dispatch) returns the failures
/// instead of an aggregate error.
#[derive(Default)]
pub struct NotificationDispatcher {
    providers: Vec<Arc<dyn NotificationProvider>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn NotificationProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Posts the event to every provider concurrently and collects the
    /// failures.
    pub async fn dispatch(&self, ctx: &CancellationToken, event: &Event) -> Vec<DispatchFailure> {
        let posts = self.providers.iter().map(|provider| async move {
            (provider.name(), provider.post(ctx, event).await)
        });

        join_all(posts)
            .await
            .into_iter()
            .filter_map(|(provider, outcome)| match outcome {
                Ok(()) => {
                    tracing::debug!(provider, "event dispatched");
                    None
                }
                Err(error) => {
                    tracing::error!(provider, %error, "event dispatch failed");
                    Some(DispatchFailure { provider, error })
                }
            })
            .collect()
    }
}
