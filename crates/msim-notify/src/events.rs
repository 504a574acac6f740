//! Event definitions for the notifier queue
//!
//! Everything the dispatcher reacts to is one of these: telephony status
//! changes, call lifecycle hints, and the completions of work that ran
//! outside the loop (directory lookups, timers, call-log reads).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retry::RetryKey;
use crate::types::{
    CallerIdentity, CorrelationId, DismissAction, MissedCallRecord, NumberPresentation,
    QueryHandle, SubscriptionId,
};

/// Status change reported for one subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelephonyEventKind {
    /// A missed call whose caller has been resolved (or not)
    MissedCall {
        identity: Option<CallerIdentity>,
        when: DateTime<Utc>,
    },

    /// Message-waiting indicator changed
    MwiChanged { visible: bool },

    /// Call-forwarding indicator changed
    CfiChanged { visible: bool },

    /// User looked at the missed-call list
    MissedCallsViewed,

    /// Registration state changed
    ServiceStateChanged {
        in_service: bool,
        /// Manually selected operator, if any
        selected_network: Option<String>,
    },
}

/// A status change tagged with its subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephonyEvent {
    pub subscription: SubscriptionId,
    pub kind: TelephonyEventKind,
}

impl TelephonyEvent {
    pub fn new(subscription: SubscriptionId, kind: TelephonyEventKind) -> Self {
        Self { subscription, kind }
    }
}

/// Result of a directory lookup as delivered back to the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(CallerIdentity),
    NotFound,
    Failed(String),
}

/// Everything that can sit in the dispatcher queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// Status change for one subscription
    Telephony(TelephonyEvent),

    /// A call went unanswered; resolve the caller, then post it
    CallMissed {
        subscription: SubscriptionId,
        correlation: CorrelationId,
        number: Option<String>,
        presentation: NumberPresentation,
        when: DateTime<Utc>,
    },

    /// A call started ringing; resolve the caller to pick a ringtone
    IncomingCall {
        subscription: SubscriptionId,
        correlation: CorrelationId,
        number: String,
    },

    /// The call/connection is gone
    CallDisconnected { correlation: CorrelationId },

    /// Directory lookup finished
    QueryCompleted {
        handle: QueryHandle,
        outcome: LookupOutcome,
    },

    /// An incoming call waited too long for its lookup
    RingQueryTimeout { handle: QueryHandle },

    /// A retry timer elapsed
    RetryTimerFired { key: RetryKey, generation: u64 },

    /// Unseen missed calls read from the call log
    CallLogLoaded(Vec<MissedCallRecord>),

    /// The shade reports a dismissed notification
    NotificationDismissed(DismissAction),

    /// Stop the loop
    Shutdown,
}

impl NotifierEvent {
    /// Subscription the event is tagged with, if any
    pub fn subscription(&self) -> Option<SubscriptionId> {
        match self {
            NotifierEvent::Telephony(event) => Some(event.subscription),
            NotifierEvent::CallMissed { subscription, .. }
            | NotifierEvent::IncomingCall { subscription, .. } => Some(*subscription),
            NotifierEvent::RetryTimerFired { key, .. } => Some(key.subscription),
            _ => None,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            NotifierEvent::Telephony(event) => match event.kind {
                TelephonyEventKind::MissedCall { .. } => "missed_call",
                TelephonyEventKind::MwiChanged { .. } => "mwi_changed",
                TelephonyEventKind::CfiChanged { .. } => "cfi_changed",
                TelephonyEventKind::MissedCallsViewed => "missed_calls_viewed",
                TelephonyEventKind::ServiceStateChanged { .. } => "service_state_changed",
            },
            NotifierEvent::CallMissed { .. } => "call_missed",
            NotifierEvent::IncomingCall { .. } => "incoming_call",
            NotifierEvent::CallDisconnected { .. } => "call_disconnected",
            NotifierEvent::QueryCompleted { .. } => "query_completed",
            NotifierEvent::RingQueryTimeout { .. } => "ring_query_timeout",
            NotifierEvent::RetryTimerFired { .. } => "retry_timer_fired",
            NotifierEvent::CallLogLoaded(_) => "call_log_loaded",
            NotifierEvent::NotificationDismissed(_) => "notification_dismissed",
            NotifierEvent::Shutdown => "shutdown",
        }
    }
}

impl From<TelephonyEvent> for NotifierEvent {
    fn from(event: TelephonyEvent) -> Self {
        NotifierEvent::Telephony(event)
    }
}
