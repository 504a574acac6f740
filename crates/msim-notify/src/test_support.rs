//! Recording fakes of every collaborator
//!
//! Compiled for unit tests and, with the `test-utils` feature, for the
//! integration tests and downstream crates.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::collaborators::{
    CallLogSource, DirectoryLookup, IncomingCallHandler, NotificationPresenter, TimerHandle,
    TimerService, VoicemailProvider,
};
use crate::error::{NotifyError, Result};
use crate::events::NotifierEvent;
use crate::types::{
    CallerIdentity, CancelNotification, CorrelationId, MissedCallRecord, NotificationAction,
    RingDecision, ShowNotification, SubscriptionId,
};

/// Timer that only records; tests deliver the events by hand
#[derive(Default)]
pub struct ManualTimer {
    armed: Mutex<VecDeque<(Duration, NotifierEvent)>>,
}

impl ManualTimer {
    pub fn pop(&self) -> Option<(Duration, NotifierEvent)> {
        self.armed.lock().unwrap().pop_front()
    }

    pub fn armed(&self) -> usize {
        self.armed.lock().unwrap().len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.armed.lock().unwrap().iter().map(|(d, _)| *d).collect()
    }
}

impl TimerService for ManualTimer {
    fn after(&self, delay: Duration, event: NotifierEvent) -> TimerHandle {
        self.armed.lock().unwrap().push_back((delay, event));
        TimerHandle::detached()
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    actions: Mutex<Vec<NotificationAction>>,
}

impl RecordingPresenter {
    pub fn actions(&self) -> Vec<NotificationAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn shows(&self) -> Vec<ShowNotification> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                NotificationAction::Show(show) => Some(show),
                NotificationAction::Cancel(_) => None,
            })
            .collect()
    }

    pub fn cancels(&self) -> Vec<CancelNotification> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                NotificationAction::Cancel(cancel) => Some(cancel),
                NotificationAction::Show(_) => None,
            })
            .collect()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn show(&self, notification: &ShowNotification) {
        self.actions.lock().unwrap().push(NotificationAction::Show(notification.clone()));
    }

    fn cancel(&self, notification: &CancelNotification) {
        self.actions.lock().unwrap().push(NotificationAction::Cancel(*notification));
    }
}

/// Voicemail provider whose SIM records load after a number of checks
pub struct FakeVoicemail {
    number: Option<String>,
    loaded_after_checks: u32,
    checks: AtomicU32,
    message_count: Option<u32>,
}

impl FakeVoicemail {
    pub fn ready(number: &str) -> Self {
        Self::loading(number, 0)
    }

    pub fn loading(number: &str, loaded_after_checks: u32) -> Self {
        Self {
            number: Some(number.to_string()),
            loaded_after_checks,
            checks: AtomicU32::new(0),
            message_count: None,
        }
    }

    pub fn never_loads() -> Self {
        Self::loading("12345", u32::MAX)
    }

    pub fn with_message_count(mut self, count: u32) -> Self {
        self.message_count = Some(count);
        self
    }

    /// SIM record checks made so far
    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    fn loaded(&self) -> bool {
        self.loaded_after_checks == 0 || self.checks() > self.loaded_after_checks
    }
}

impl VoicemailProvider for FakeVoicemail {
    fn voicemail_number(&self, _subscription: SubscriptionId) -> Option<String> {
        if self.loaded() {
            self.number.clone()
        } else {
            None
        }
    }

    fn sim_records_loaded(&self, _subscription: SubscriptionId) -> bool {
        if self.loaded_after_checks == 0 {
            return true;
        }
        self.checks.fetch_add(1, Ordering::SeqCst) + 1 > self.loaded_after_checks
    }

    fn voice_message_count(&self, _subscription: SubscriptionId) -> Option<u32> {
        self.message_count
    }
}

/// Directory answering from a fixed table, optionally after a delay
#[derive(Default)]
pub struct FakeDirectory {
    entries: HashMap<String, CallerIdentity>,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
}

impl FakeDirectory {
    pub fn with_entry(mut self, key: &str, identity: CallerIdentity) -> Self {
        self.entries.insert(key.to_string(), identity);
        self
    }

    pub fn with_delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub fn failing_for(mut self, key: &str) -> Self {
        self.failing.push(key.to_string());
        self
    }
}

#[async_trait]
impl DirectoryLookup for FakeDirectory {
    async fn lookup(&self, key: &str) -> Result<Option<CallerIdentity>> {
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|k| k == key) {
            return Err(NotifyError::LookupFailed(format!("directory unavailable for {}", key)));
        }
        Ok(self.entries.get(key).cloned())
    }
}

#[derive(Default)]
pub struct RecordingCallHandler {
    decisions: Mutex<Vec<(SubscriptionId, CorrelationId, RingDecision)>>,
}

impl RecordingCallHandler {
    pub fn decisions(&self) -> Vec<(SubscriptionId, CorrelationId, RingDecision)> {
        self.decisions.lock().unwrap().clone()
    }
}

impl IncomingCallHandler for RecordingCallHandler {
    fn on_ring_decision(
        &self,
        subscription: SubscriptionId,
        correlation: &CorrelationId,
        decision: RingDecision,
    ) {
        self.decisions
            .lock()
            .unwrap()
            .push((subscription, correlation.clone(), decision));
    }
}

/// Call log returning a fixed set of records, or failing
pub struct FixedCallLog {
    records: Vec<MissedCallRecord>,
    fail: bool,
}

impl FixedCallLog {
    pub fn new(records: Vec<MissedCallRecord>) -> Self {
        Self { records, fail: false }
    }

    pub fn broken() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl CallLogSource for FixedCallLog {
    async fn new_missed_calls(&self) -> Result<Vec<MissedCallRecord>> {
        if self.fail {
            return Err(NotifyError::CallLog("provider unavailable".to_string()));
        }
        Ok(self.records.clone())
    }
}
