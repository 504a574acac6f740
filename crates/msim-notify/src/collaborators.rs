//! Interfaces to the world outside the notifier
//!
//! The notifier owns no telephony objects and draws nothing. It consumes a
//! directory, a voicemail provider, a timer and (optionally) the call log,
//! and produces notification actions and ring decisions.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::Result;
use crate::events::NotifierEvent;
use crate::types::{
    CallerIdentity, CancelNotification, CorrelationId, MissedCallRecord, NotificationAction,
    RingDecision, ShowNotification, SubscriptionId,
};

/// Sending half of the dispatcher queue
pub type EventSender = mpsc::UnboundedSender<NotifierEvent>;

/// Contacts/directory lookup
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolve a phone number to a caller identity
    ///
    /// `Ok(None)` means the directory has no entry for the number.
    async fn lookup(&self, key: &str) -> Result<Option<CallerIdentity>>;
}

/// Per-subscription voicemail information from the SIM
pub trait VoicemailProvider: Send + Sync {
    /// Voicemail number, if known
    fn voicemail_number(&self, subscription: SubscriptionId) -> Option<String>;

    /// Whether the SIM records have finished loading
    fn sim_records_loaded(&self, subscription: SubscriptionId) -> bool;

    /// Waiting message count, where the network reports one
    fn voice_message_count(&self, _subscription: SubscriptionId) -> Option<u32> {
        None
    }
}

/// The notification shade
pub trait NotificationPresenter: Send + Sync {
    fn show(&self, notification: &ShowNotification);

    fn cancel(&self, notification: &CancelNotification);

    fn present(&self, action: &NotificationAction) {
        match action {
            NotificationAction::Show(show) => self.show(show),
            NotificationAction::Cancel(cancel) => self.cancel(cancel),
        }
    }
}

/// Source of unseen missed calls recorded before this process started
#[async_trait]
pub trait CallLogSource: Send + Sync {
    async fn new_missed_calls(&self) -> Result<Vec<MissedCallRecord>>;
}

/// Receives the ringing decision for incoming calls
pub trait IncomingCallHandler: Send + Sync {
    fn on_ring_decision(
        &self,
        subscription: SubscriptionId,
        correlation: &CorrelationId,
        decision: RingDecision,
    );
}

/// One-shot timers that deliver an event back into the queue
pub trait TimerService: Send + Sync {
    /// Deliver `event` once after `delay`
    fn after(&self, delay: Duration, event: NotifierEvent) -> TimerHandle;
}

/// Handle to a pending timer
///
/// Cancelling is best effort. Consumers still check generations/tokens, so a
/// firing that slips through is dropped as stale.
#[derive(Debug, Default)]
pub struct TimerHandle {
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Handle for timers that cannot be cancelled
    pub fn detached() -> Self {
        Self { abort: None }
    }

    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

/// Timer backed by `tokio::time::sleep`
#[derive(Clone)]
pub struct TokioTimer {
    events: EventSender,
}

impl TokioTimer {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl TimerService for TokioTimer {
    fn after(&self, delay: Duration, event: NotifierEvent) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(event).is_err() {
                debug!("Timer fired after the dispatcher stopped");
            }
        });
        TimerHandle::new(task.abort_handle())
    }
}
