//! # MSim Notify
//!
//! Notification coordination for multi-SIM telephony devices in the rvoip
//! ecosystem.
//!
//! This crate provides:
//! - Caller identity lookups that tolerate late and out-of-order results
//! - Missed call, voicemail (MWI), call forwarding (CFI) and network
//!   selection notification state per subscription
//! - Bounded retries for data that is not ready yet (voicemail number)
//! - A single event dispatcher that serialises all of the above
//!
//! ```no_run
//! use std::sync::Arc;
//! use rvoip_msim_notify::{NotifierBuilder, NotifierConfig, SubscriptionId, TelephonyEventKind};
//! # use rvoip_msim_notify::{DirectoryLookup, NotificationPresenter, VoicemailProvider};
//! # async fn example(
//! #     presenter: Arc<dyn NotificationPresenter>,
//! #     voicemail: Arc<dyn VoicemailProvider>,
//! #     directory: Arc<dyn DirectoryLookup>,
//! # ) -> rvoip_msim_notify::Result<()> {
//! let mut dispatcher = NotifierBuilder::new(presenter, voicemail, directory)
//!     .with_config(NotifierConfig::load(None)?)
//!     .build()?;
//!
//! let handle = dispatcher.handle();
//! handle.telephony(SubscriptionId::new(1), TelephonyEventKind::CfiChanged { visible: true })?;
//! handle.shutdown()?;
//!
//! dispatcher.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod notification;
pub mod query;
pub mod retry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

// Re-exports for convenience
pub use builder::{NotifierBuilder, NotifierContext};
pub use collaborators::{
    CallLogSource, DirectoryLookup, EventSender, IncomingCallHandler, NotificationPresenter,
    TimerHandle, TimerService, TokioTimer, VoicemailProvider,
};
pub use config::{NotificationStrings, NotifierConfig, CONFIG_ENV_VAR};
pub use dispatcher::{DispatcherHandle, EventDispatcher};
pub use error::{NotifyError, Result};
pub use events::{LookupOutcome, NotifierEvent, TelephonyEvent, TelephonyEventKind};
pub use notification::{NotificationState, SubscriptionNotificationState};
pub use query::{IdentityQueryCoordinator, IdentityQueryState, QueryCompletion, QueryPurpose};
pub use retry::{Attempt, RetryKey, RetryKind, RetryPoll, RetryScheduler, RetryTask};
pub use types::{
    CallerIdentity, CancelNotification, CorrelationId, DismissAction, MissedCallRecord,
    NotificationAction, NotificationSlot, NumberPresentation, QueryHandle, RingDecision,
    ShowNotification, SlotKind, SubscriptionId,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
