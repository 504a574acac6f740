//! Per-subscription notification state
//!
//! Turns telephony status events into show/cancel actions. Voicemail, call
//! forwarding and network selection each have one slot per subscription;
//! missed calls from every subscription are summarised in a single slot.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::collaborators::{TimerService, VoicemailProvider};
use crate::config::{render, NotificationStrings, NotifierConfig};
use crate::error::{NotifyError, Result};
use crate::events::{TelephonyEvent, TelephonyEventKind};
use crate::retry::{RetryKey, RetryKind, RetryPoll, RetryScheduler, RetryTask};
use crate::types::{
    usable_number, CallerIdentity, CancelNotification, DismissAction, NotificationAction,
    NotificationSlot, NumberPresentation, ShowNotification, SlotKind, SubscriptionId,
};

/// Snapshot of one subscription's notification bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    /// Missed calls since the user last viewed them
    pub missed_call_count: u32,
    pub mwi_visible: bool,
    pub cfi_visible: bool,
    /// Voicemail number re-checks used by the pending or last MWI update
    pub vm_retry_count: u32,
    pub network_selection_notified: bool,
    /// Display name of the most recent missed caller
    pub last_missed_caller: Option<String>,
}

/// Result of the voicemail retry action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicemailUpdate {
    pub notification: ShowNotification,
    pub retries_used: u32,
    pub degraded: bool,
}

/// Notification state machine for every subscription on the device
pub struct SubscriptionNotificationState {
    config: Arc<NotifierConfig>,
    voicemail: Arc<dyn VoicemailProvider>,
    states: BTreeMap<SubscriptionId, NotificationState>,
    retries: RetryScheduler<VoicemailUpdate>,
}

impl SubscriptionNotificationState {
    pub fn new(
        config: Arc<NotifierConfig>,
        voicemail: Arc<dyn VoicemailProvider>,
        timer: Arc<dyn TimerService>,
    ) -> Self {
        let states = config
            .subscriptions()
            .map(|sub| (sub, NotificationState::default()))
            .collect();
        Self {
            config,
            voicemail,
            states,
            retries: RetryScheduler::new(timer),
        }
    }

    /// Apply a status event and return the actions to present
    pub fn handle(&mut self, event: TelephonyEvent) -> Result<Vec<NotificationAction>> {
        let sub = event.subscription;
        if !self.states.contains_key(&sub) {
            return Err(NotifyError::InvalidSubscription(sub));
        }

        match event.kind {
            TelephonyEventKind::MissedCall { identity, when } => {
                Ok(self.on_missed_call(sub, identity.as_ref(), when))
            }
            TelephonyEventKind::MwiChanged { visible } => self.on_mwi_changed(sub, visible),
            TelephonyEventKind::CfiChanged { visible } => Ok(self.on_cfi_changed(sub, visible)),
            TelephonyEventKind::MissedCallsViewed => Ok(self.on_missed_calls_viewed(sub)),
            TelephonyEventKind::ServiceStateChanged {
                in_service,
                selected_network,
            } => Ok(self.on_service_state_changed(sub, in_service, selected_network)),
        }
    }

    /// Deliver a voicemail retry timer firing
    pub fn on_retry_timer(&mut self, key: RetryKey, generation: u64) -> Vec<NotificationAction> {
        let poll = self.retries.on_timer_fired(key, generation);
        self.apply_voicemail_poll(key.subscription, poll)
    }

    /// Reset every subscription's missed-call counter and remove the summary
    pub fn clear_all_missed_calls(&mut self) -> Vec<NotificationAction> {
        for state in self.states.values_mut() {
            state.missed_call_count = 0;
            state.last_missed_caller = None;
        }
        debug!("Cleared missed calls on all subscriptions");
        vec![NotificationAction::Cancel(CancelNotification::new(
            NotificationSlot::missed_call(),
        ))]
    }

    pub fn state(&self, subscription: SubscriptionId) -> Option<&NotificationState> {
        self.states.get(&subscription)
    }

    /// Missed calls across all subscriptions
    pub fn total_missed_calls(&self) -> u32 {
        self.states.values().map(|s| s.missed_call_count).sum()
    }

    pub fn has_pending_voicemail_retry(&self, subscription: SubscriptionId) -> bool {
        self.retries
            .is_pending(RetryKey::new(RetryKind::VoicemailNumber, subscription))
    }

    fn state_mut(&mut self, subscription: SubscriptionId) -> &mut NotificationState {
        self.states.entry(subscription).or_default()
    }

    fn on_missed_call(
        &mut self,
        sub: SubscriptionId,
        identity: Option<&CallerIdentity>,
        when: chrono::DateTime<Utc>,
    ) -> Vec<NotificationAction> {
        if !self.config.voice_capable {
            debug!("Not posting missed call on {}: device is not voice capable", sub);
            return Vec::new();
        }

        let strings = &self.config.strings;
        let name = caller_display_name(identity, strings);

        let state = self.state_mut(sub);
        state.missed_call_count += 1;
        state.last_missed_caller = Some(name.clone());
        let count = state.missed_call_count;

        let total = self.total_missed_calls();
        debug!("Missed call on {} from {} ({} on sub, {} total)", sub, name, count, total);

        let strings = &self.config.strings;
        let (title, body) = if total > 1 {
            (
                strings.missed_calls_title.clone(),
                render(&strings.missed_calls_body, "count", &total.to_string()),
            )
        } else {
            (strings.missed_call_title.clone(), name.clone())
        };

        vec![NotificationAction::Show(ShowNotification {
            slot_kind: SlotKind::MissedCall,
            subscription: None,
            title,
            body,
            ticker: Some(render(&strings.missed_call_ticker, "name", &name)),
            when: Some(when),
            dismiss_action: Some(DismissAction::ClearMissedCalls),
            persistent: false,
            play_sound: false,
        })]
    }

    fn on_missed_calls_viewed(&mut self, sub: SubscriptionId) -> Vec<NotificationAction> {
        let state = self.state_mut(sub);
        state.missed_call_count = 0;
        state.last_missed_caller = None;

        let total = self.total_missed_calls();
        if total == 0 {
            return vec![NotificationAction::Cancel(CancelNotification::new(
                NotificationSlot::missed_call(),
            ))];
        }

        // other subscriptions still have unseen calls
        let strings = &self.config.strings;
        let latest = self
            .states
            .values()
            .filter(|s| s.missed_call_count > 0)
            .find_map(|s| s.last_missed_caller.clone())
            .unwrap_or_else(|| strings.unknown.clone());
        let (title, body) = if total > 1 {
            (
                strings.missed_calls_title.clone(),
                render(&strings.missed_calls_body, "count", &total.to_string()),
            )
        } else {
            (strings.missed_call_title.clone(), latest)
        };

        vec![NotificationAction::Show(ShowNotification {
            slot_kind: SlotKind::MissedCall,
            subscription: None,
            title,
            body,
            ticker: None,
            when: None,
            dismiss_action: Some(DismissAction::ClearMissedCalls),
            persistent: false,
            play_sound: false,
        })]
    }

    fn on_mwi_changed(&mut self, sub: SubscriptionId, visible: bool) -> Result<Vec<NotificationAction>> {
        if !self.config.voice_capable {
            return Err(NotifyError::UnsupportedCapability(format!(
                "message waiting indicator on {} of a non-voice device",
                sub
            )));
        }

        let key = RetryKey::new(RetryKind::VoicemailNumber, sub);

        if !visible {
            self.retries.cancel(key);
            let state = self.state_mut(sub);
            state.mwi_visible = false;
            state.vm_retry_count = 0;
            return Ok(vec![NotificationAction::Cancel(CancelNotification::new(
                NotificationSlot::for_kind(SlotKind::Voicemail, sub),
            ))]);
        }

        let state = self.state_mut(sub);
        state.mwi_visible = true;
        state.vm_retry_count = 0;

        let check_provider = self.voicemail.clone();
        let check = move || {
            check_provider.voicemail_number(sub).is_some() || check_provider.sim_records_loaded(sub)
        };

        let provider = self.voicemail.clone();
        let strings = self.config.strings.clone();
        let action = move |attempt: crate::retry::Attempt| VoicemailUpdate {
            notification: voicemail_notification(sub, provider.as_ref(), &strings),
            retries_used: attempt.retries_used,
            degraded: attempt.degraded,
        };

        let task = RetryTask::new(
            check,
            action,
            self.config.vm_number_max_retries,
            self.config.vm_number_retry_delay(),
        );
        let poll = self.retries.schedule(key, task);
        Ok(self.apply_voicemail_poll(sub, poll))
    }

    fn apply_voicemail_poll(
        &mut self,
        sub: SubscriptionId,
        poll: RetryPoll<VoicemailUpdate>,
    ) -> Vec<NotificationAction> {
        let max_retries = self.config.vm_number_max_retries;
        match poll {
            RetryPoll::Completed(update) => {
                let state = self.state_mut(sub);
                state.vm_retry_count = update.retries_used;
                if !state.mwi_visible {
                    debug!("Voicemail indicator on {} cleared before its update finished", sub);
                    return Vec::new();
                }
                if update.degraded {
                    info!("Posting voicemail notification on {} without a confirmed number", sub);
                }
                vec![NotificationAction::Show(update.notification)]
            }
            RetryPoll::Pending { remaining_attempts } => {
                self.state_mut(sub).vm_retry_count = max_retries - remaining_attempts;
                Vec::new()
            }
            RetryPoll::Stale => Vec::new(),
        }
    }

    fn on_cfi_changed(&mut self, sub: SubscriptionId, visible: bool) -> Vec<NotificationAction> {
        self.state_mut(sub).cfi_visible = visible;
        let slot = NotificationSlot::for_kind(SlotKind::CallForward, sub);

        if !visible {
            return vec![NotificationAction::Cancel(CancelNotification::new(slot))];
        }

        let strings = &self.config.strings;
        vec![NotificationAction::Show(ShowNotification {
            slot_kind: SlotKind::CallForward,
            subscription: Some(sub),
            title: strings.call_forward_title.clone(),
            body: strings.call_forward_text.clone(),
            ticker: None,
            when: None,
            dismiss_action: None,
            persistent: true,
            play_sound: false,
        })]
    }

    fn on_service_state_changed(
        &mut self,
        sub: SubscriptionId,
        in_service: bool,
        selected_network: Option<String>,
    ) -> Vec<NotificationAction> {
        let manual_network = selected_network.filter(|n| !n.trim().is_empty());
        let slot = NotificationSlot::for_kind(SlotKind::NetworkSelection, sub);
        let strings = self.config.strings.clone();
        let state = self.state_mut(sub);

        match manual_network {
            Some(network) if !in_service => {
                if state.network_selection_notified {
                    return Vec::new();
                }
                state.network_selection_notified = true;
                info!("Selected network {} unavailable on {}", network, sub);
                vec![NotificationAction::Show(ShowNotification {
                    slot_kind: SlotKind::NetworkSelection,
                    subscription: Some(sub),
                    title: strings.network_selection_title.clone(),
                    body: render(&strings.network_selection_text, "network", &network),
                    ticker: None,
                    when: None,
                    dismiss_action: None,
                    persistent: true,
                    play_sound: false,
                })]
            }
            _ => {
                if !state.network_selection_notified {
                    return Vec::new();
                }
                state.network_selection_notified = false;
                vec![NotificationAction::Cancel(CancelNotification::new(slot))]
            }
        }
    }
}

/// Name shown for a missed caller: private/unknown policy first, then
/// contact name, then number, then the shared fallback.
pub fn caller_display_name(identity: Option<&CallerIdentity>, strings: &NotificationStrings) -> String {
    let identity = match identity {
        Some(identity) => identity,
        None => return strings.unknown.clone(),
    };

    match identity.presentation {
        NumberPresentation::Allowed => {}
        NumberPresentation::Restricted => return strings.private_number.clone(),
        NumberPresentation::Unknown | NumberPresentation::Payphone => {
            return strings.unknown.clone()
        }
    }

    if let Some(name) = identity.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    usable_number(identity.number.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| strings.unknown.clone())
}

fn voicemail_notification(
    sub: SubscriptionId,
    provider: &dyn VoicemailProvider,
    strings: &NotificationStrings,
) -> ShowNotification {
    let title = match provider.voice_message_count(sub) {
        Some(count) if count > 0 => render(&strings.voicemail_title_count, "count", &count.to_string()),
        _ => strings.voicemail_title.clone(),
    };
    let body = match provider.voicemail_number(sub).filter(|n| !n.trim().is_empty()) {
        Some(number) => render(&strings.voicemail_text, "number", &number),
        None => strings.voicemail_no_number.clone(),
    };

    ShowNotification {
        slot_kind: SlotKind::Voicemail,
        subscription: Some(sub),
        title,
        body,
        ticker: None,
        when: Some(Utc::now()),
        dismiss_action: None,
        persistent: true,
        play_sound: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotifierEvent;
    use crate::test_support::{FakeVoicemail, ManualTimer};
    use std::time::Duration;

    fn sub(n: u8) -> SubscriptionId {
        SubscriptionId::new(n)
    }

    fn state_with(
        config: NotifierConfig,
        voicemail: FakeVoicemail,
    ) -> (SubscriptionNotificationState, Arc<ManualTimer>) {
        let timer = Arc::new(ManualTimer::default());
        let state = SubscriptionNotificationState::new(Arc::new(config), Arc::new(voicemail), timer.clone());
        (state, timer)
    }

    fn missed(n: u8, identity: Option<CallerIdentity>) -> TelephonyEvent {
        TelephonyEvent::new(
            sub(n),
            TelephonyEventKind::MissedCall {
                identity,
                when: Utc::now(),
            },
        )
    }

    fn mwi(n: u8, visible: bool) -> TelephonyEvent {
        TelephonyEvent::new(sub(n), TelephonyEventKind::MwiChanged { visible })
    }

    fn only_show(actions: Vec<NotificationAction>) -> ShowNotification {
        assert_eq!(actions.len(), 1, "expected one action, got {:?}", actions);
        match actions.into_iter().next() {
            Some(NotificationAction::Show(show)) => show,
            other => panic!("expected a show, got {:?}", other),
        }
    }

    fn fire(state: &mut SubscriptionNotificationState, timer: &ManualTimer) -> Vec<NotificationAction> {
        match timer.pop().expect("a retry timer should be armed").1 {
            NotifierEvent::RetryTimerFired { key, generation } => state.on_retry_timer(key, generation),
            other => panic!("unexpected timer event {:?}", other),
        }
    }

    #[test]
    fn test_single_missed_call_shows_caller_name() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));

        let show = only_show(state.handle(missed(0, Some(CallerIdentity::named("Alice")))).unwrap());

        assert_eq!(show.slot(), NotificationSlot::missed_call());
        assert_eq!(show.title, "Missed call");
        assert_eq!(show.body, "Alice");
        assert_eq!(show.ticker.as_deref(), Some("Missed call from Alice"));
        assert_eq!(show.dismiss_action, Some(DismissAction::ClearMissedCalls));
        assert!(show.when.is_some());
        assert_eq!(state.state(sub(0)).unwrap().missed_call_count, 1);
    }

    #[test]
    fn test_second_missed_call_is_summarised() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));

        state.handle(missed(0, Some(CallerIdentity::named("Alice")))).unwrap();
        let show = only_show(state.handle(missed(0, Some(CallerIdentity::named("Bob")))).unwrap());

        assert_eq!(show.title, "Missed calls");
        assert_eq!(show.body, "2 missed calls");
        assert_eq!(show.ticker.as_deref(), Some("Missed call from Bob"));
    }

    #[test]
    fn test_missed_calls_on_both_subscriptions_share_one_slot() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));

        let first = only_show(state.handle(missed(0, None)).unwrap());
        let second = only_show(state.handle(missed(1, None)).unwrap());

        assert_eq!(first.slot(), second.slot());
        assert_eq!(second.body, "2 missed calls");
        assert_eq!(state.state(sub(0)).unwrap().missed_call_count, 1);
        assert_eq!(state.state(sub(1)).unwrap().missed_call_count, 1);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let strings = NotificationStrings::default();

        assert_eq!(caller_display_name(None, &strings), "Unknown");
        assert_eq!(
            caller_display_name(Some(&CallerIdentity::with_number("5551234")), &strings),
            "5551234"
        );
        assert_eq!(
            caller_display_name(Some(&CallerIdentity::with_number("-1")), &strings),
            "Unknown"
        );
        assert_eq!(
            caller_display_name(
                Some(&CallerIdentity::presentation_only(NumberPresentation::Restricted)),
                &strings
            ),
            "Private number"
        );
        assert_eq!(
            caller_display_name(
                Some(&CallerIdentity::presentation_only(NumberPresentation::Payphone)),
                &strings
            ),
            "Unknown"
        );
    }

    #[test]
    fn test_viewed_resets_counter_and_cancels() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));
        state.handle(missed(0, None)).unwrap();
        state.handle(missed(0, None)).unwrap();

        let actions = state
            .handle(TelephonyEvent::new(sub(0), TelephonyEventKind::MissedCallsViewed))
            .unwrap();

        assert_eq!(
            actions,
            vec![NotificationAction::Cancel(CancelNotification::new(NotificationSlot::missed_call()))]
        );
        assert_eq!(state.state(sub(0)).unwrap().missed_call_count, 0);
    }

    #[test]
    fn test_viewed_on_one_subscription_keeps_the_other_summary() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));
        state.handle(missed(0, Some(CallerIdentity::named("Alice")))).unwrap();
        state.handle(missed(1, Some(CallerIdentity::named("Bob")))).unwrap();

        let show = only_show(
            state
                .handle(TelephonyEvent::new(sub(0), TelephonyEventKind::MissedCallsViewed))
                .unwrap(),
        );

        assert_eq!(show.title, "Missed call");
        assert_eq!(show.body, "Bob");
        assert_eq!(state.total_missed_calls(), 1);
    }

    #[test]
    fn test_clear_all_resets_every_subscription() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));
        state.handle(missed(0, None)).unwrap();
        state.handle(missed(1, None)).unwrap();

        let actions = state.clear_all_missed_calls();

        assert_eq!(actions.len(), 1);
        assert!(!actions[0].is_show());
        assert_eq!(state.total_missed_calls(), 0);
    }

    #[test]
    fn test_missed_call_not_posted_without_voice() {
        let config = NotifierConfig {
            voice_capable: false,
            ..Default::default()
        };
        let (mut state, _) = state_with(config, FakeVoicemail::ready("12345"));

        assert!(state.handle(missed(0, None)).unwrap().is_empty());
        assert_eq!(state.total_missed_calls(), 0);
    }

    #[test]
    fn test_mwi_with_loaded_records_posts_immediately() {
        let (mut state, timer) = state_with(
            NotifierConfig::default(),
            FakeVoicemail::ready("12345").with_message_count(3),
        );

        let show = only_show(state.handle(mwi(0, true)).unwrap());

        assert_eq!(show.slot(), NotificationSlot::for_kind(SlotKind::Voicemail, sub(0)));
        assert_eq!(show.title, "New voicemail (3)");
        assert_eq!(show.body, "Dial 12345");
        assert!(show.persistent);
        assert!(show.play_sound);
        assert_eq!(timer.armed(), 0);
    }

    #[test]
    fn test_mwi_waits_for_sim_records() {
        let (mut state, timer) = state_with(NotifierConfig::default(), FakeVoicemail::loading("12345", 2));

        assert!(state.handle(mwi(0, true)).unwrap().is_empty());
        assert_eq!(timer.delays(), vec![Duration::from_secs(2)]);
        assert_eq!(state.state(sub(0)).unwrap().vm_retry_count, 1);

        assert!(fire(&mut state, &timer).is_empty());
        let show = only_show(fire(&mut state, &timer));

        assert!(show.body.contains("12345"));
        assert_eq!(state.state(sub(0)).unwrap().vm_retry_count, 2);
        assert!(!state.has_pending_voicemail_retry(sub(0)));
    }

    #[test]
    fn test_mwi_degrades_when_records_never_load() {
        let config = NotifierConfig {
            vm_number_max_retries: 2,
            ..Default::default()
        };
        let (mut state, timer) = state_with(config, FakeVoicemail::loading("12345", u32::MAX));

        assert!(state.handle(mwi(0, true)).unwrap().is_empty());
        assert!(fire(&mut state, &timer).is_empty());
        let show = only_show(fire(&mut state, &timer));

        assert_eq!(show.body, "Voicemail number unknown");
        assert_eq!(timer.armed(), 0);
    }

    #[test]
    fn test_mwi_off_cancels_pending_retry() {
        let (mut state, timer) = state_with(NotifierConfig::default(), FakeVoicemail::loading("12345", 2));
        state.handle(mwi(0, true)).unwrap();
        assert!(state.has_pending_voicemail_retry(sub(0)));

        let actions = state.handle(mwi(0, false)).unwrap();

        assert_eq!(
            actions,
            vec![NotificationAction::Cancel(CancelNotification::new(NotificationSlot::for_kind(
                SlotKind::Voicemail,
                sub(0)
            )))]
        );
        assert!(!state.has_pending_voicemail_retry(sub(0)));
        // the already-queued firing is stale
        assert!(fire(&mut state, &timer).is_empty());
    }

    #[test]
    fn test_mwi_rejected_without_voice() {
        let config = NotifierConfig {
            voice_capable: false,
            ..Default::default()
        };
        let (mut state, timer) = state_with(config, FakeVoicemail::ready("12345"));

        let err = state.handle(mwi(0, true)).unwrap_err();

        assert!(matches!(err, NotifyError::UnsupportedCapability(_)));
        assert!(!state.state(sub(0)).unwrap().mwi_visible);
        assert_eq!(timer.armed(), 0);
    }

    #[test]
    fn test_cfi_slots_are_per_subscription() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));

        let on = only_show(
            state
                .handle(TelephonyEvent::new(sub(1), TelephonyEventKind::CfiChanged { visible: true }))
                .unwrap(),
        );
        let off = state
            .handle(TelephonyEvent::new(sub(0), TelephonyEventKind::CfiChanged { visible: false }))
            .unwrap();

        assert_eq!(on.slot(), NotificationSlot::for_kind(SlotKind::CallForward, sub(1)));
        assert!(on.persistent);
        assert_eq!(off[0].slot(), NotificationSlot::for_kind(SlotKind::CallForward, sub(0)));
        assert!(state.state(sub(1)).unwrap().cfi_visible);
        assert!(!state.state(sub(0)).unwrap().cfi_visible);
    }

    #[test]
    fn test_network_selection_shown_once_and_cancelled_on_service() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));
        let lost = TelephonyEvent::new(
            sub(1),
            TelephonyEventKind::ServiceStateChanged {
                in_service: false,
                selected_network: Some("Carrier X".to_string()),
            },
        );

        let show = only_show(state.handle(lost.clone()).unwrap());
        assert_eq!(show.body, "Selected network (Carrier X) unavailable");
        assert!(state.handle(lost).unwrap().is_empty());

        let back = state
            .handle(TelephonyEvent::new(
                sub(1),
                TelephonyEventKind::ServiceStateChanged {
                    in_service: true,
                    selected_network: Some("Carrier X".to_string()),
                },
            ))
            .unwrap();
        assert_eq!(
            back,
            vec![NotificationAction::Cancel(CancelNotification::new(NotificationSlot::for_kind(
                SlotKind::NetworkSelection,
                sub(1)
            )))]
        );
    }

    #[test]
    fn test_automatic_selection_never_notifies() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));
        let actions = state
            .handle(TelephonyEvent::new(
                sub(0),
                TelephonyEventKind::ServiceStateChanged {
                    in_service: false,
                    selected_network: None,
                },
            ))
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_unknown_subscription_rejected() {
        let (mut state, _) = state_with(NotifierConfig::default(), FakeVoicemail::ready("12345"));

        let err = state.handle(missed(5, None)).unwrap_err();

        assert!(matches!(err, NotifyError::InvalidSubscription(s) if s == sub(5)));
        assert_eq!(state.total_missed_calls(), 0);
    }
}
