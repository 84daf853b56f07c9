//! Herald-RS Library
//!
//! Notification dispatch and delivery for a GitOps control plane:
//! reconciliation events fan out to chat, incident, dashboard and
//! version control sinks through a uniform provider abstraction, with a
//! retrying HTTP delivery pipeline and idempotent upserts for stateful
//! sinks.

pub mod error;
pub mod external;
pub mod models;
pub mod notifications;

pub use error::{NotifyError, NotifyResult};
pub use models::{Event, ObjectReference, Severity};
pub use notifications::{NotificationDispatcher, NotificationProvider};
