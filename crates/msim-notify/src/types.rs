//! Core types for msim-notify
//!
//! Identifiers, caller identity records and the notification actions handed
//! to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Index of one physical subscription (SIM slot)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SubscriptionId(pub u8);

impl SubscriptionId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.0)
    }
}

/// The call/connection a lookup belongs to
///
/// The telephony layer only ever holds this id, never a reference into
/// notifier state.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(format!("conn-{}", Uuid::new_v4()))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique id of one query issuance
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct CallEventToken(pub(crate) u64);

impl fmt::Display for CallEventToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Handle returned by `IdentityQueryCoordinator::start_query`
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct QueryHandle {
    correlation: CorrelationId,
    token: CallEventToken,
}

impl QueryHandle {
    pub(crate) fn new(correlation: CorrelationId, token: CallEventToken) -> Self {
        Self { correlation, token }
    }

    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    pub fn token(&self) -> CallEventToken {
        self.token
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token, self.correlation)
    }
}

/// Number presentation reported by the network
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum NumberPresentation {
    #[default]
    Allowed,
    Restricted,
    Unknown,
    Payphone,
}

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub name: Option<String>,
    pub number: Option<String>,
    pub presentation: NumberPresentation,
    pub custom_ringtone: Option<String>,
    pub send_to_voicemail: bool,
}

impl CallerIdentity {
    /// Identity with only a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Identity with only a number
    pub fn with_number(number: impl Into<String>) -> Self {
        Self {
            number: Some(number.into()),
            ..Default::default()
        }
    }

    /// Identity that only carries a presentation restriction
    pub fn presentation_only(presentation: NumberPresentation) -> Self {
        Self {
            presentation,
            ..Default::default()
        }
    }
}

/// Number strings the call log writes for callers without a usable number
pub const UNKNOWN_NUMBER: &str = "-1";
pub const PRIVATE_NUMBER: &str = "-2";
pub const PAYPHONE_NUMBER: &str = "-3";

/// Returns the number unless it is blank or one of the call-log sentinels.
pub fn usable_number(number: Option<&str>) -> Option<&str> {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .filter(|n| !matches!(*n, UNKNOWN_NUMBER | PRIVATE_NUMBER | PAYPHONE_NUMBER))
}

/// A missed call as stored in the call log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedCallRecord {
    pub subscription: SubscriptionId,
    pub number: Option<String>,
    pub when: DateTime<Utc>,
}

/// Kind of notification slot
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SlotKind {
    MissedCall,
    Voicemail,
    CallForward,
    NetworkSelection,
}

impl SlotKind {
    /// Missed calls from every subscription share one slot
    pub fn is_global(self) -> bool {
        matches!(self, SlotKind::MissedCall)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::MissedCall => write!(f, "missed-call"),
            SlotKind::Voicemail => write!(f, "voicemail"),
            SlotKind::CallForward => write!(f, "call-forward"),
            SlotKind::NetworkSelection => write!(f, "network-selection"),
        }
    }
}

/// Identity of a notification in the shade
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NotificationSlot {
    pub kind: SlotKind,
    pub subscription: Option<SubscriptionId>,
}

impl NotificationSlot {
    /// Slot for `kind`; the subscription is dropped for global kinds.
    pub fn for_kind(kind: SlotKind, subscription: SubscriptionId) -> Self {
        Self {
            kind,
            subscription: if kind.is_global() { None } else { Some(subscription) },
        }
    }

    pub fn missed_call() -> Self {
        Self {
            kind: SlotKind::MissedCall,
            subscription: None,
        }
    }
}

impl fmt::Display for NotificationSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subscription {
            Some(sub) => write!(f, "{}/{}", self.kind, sub),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// What the shade should feed back when a notification is dismissed
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DismissAction {
    ClearMissedCalls,
}

/// Post or update a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowNotification {
    pub slot_kind: SlotKind,
    pub subscription: Option<SubscriptionId>,
    pub title: String,
    pub body: String,
    pub ticker: Option<String>,
    pub when: Option<DateTime<Utc>>,
    pub dismiss_action: Option<DismissAction>,
    /// Not clearable by the user
    pub persistent: bool,
    pub play_sound: bool,
}

impl ShowNotification {
    pub fn slot(&self) -> NotificationSlot {
        NotificationSlot {
            kind: self.slot_kind,
            subscription: self.subscription,
        }
    }
}

/// Remove a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelNotification {
    pub slot_kind: SlotKind,
    pub subscription: Option<SubscriptionId>,
}

impl CancelNotification {
    pub fn new(slot: NotificationSlot) -> Self {
        Self {
            slot_kind: slot.kind,
            subscription: slot.subscription,
        }
    }

    pub fn slot(&self) -> NotificationSlot {
        NotificationSlot {
            kind: self.slot_kind,
            subscription: self.subscription,
        }
    }
}

/// Output of the notification state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    Show(ShowNotification),
    Cancel(CancelNotification),
}

impl NotificationAction {
    pub fn slot(&self) -> NotificationSlot {
        match self {
            NotificationAction::Show(show) => show.slot(),
            NotificationAction::Cancel(cancel) => cancel.slot(),
        }
    }

    pub fn is_show(&self) -> bool {
        matches!(self, NotificationAction::Show(_))
    }
}

/// How an incoming call should alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingDecision {
    Ring { custom_ringtone: Option<String> },
    SendToVoicemail,
}
