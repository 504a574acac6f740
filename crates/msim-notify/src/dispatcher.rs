//! Event dispatcher
//!
//! Owns the single event queue and every piece of mutable notifier state.
//! Events are processed one at a time, to completion, in arrival order.
//! Work that has to wait (directory lookups, timers, call-log reads) runs on
//! spawned tasks and comes back through the same queue.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::builder::NotifierContext;
use crate::collaborators::{EventSender, TimerHandle, TimerService};
use crate::error::{NotifyError, Result};
use crate::events::{NotifierEvent, TelephonyEvent, TelephonyEventKind};
use crate::notification::{NotificationState, SubscriptionNotificationState};
use crate::query::{IdentityQueryCoordinator, IdentityQueryState, QueryCompletion, QueryPurpose};
use crate::types::{
    usable_number, CallerIdentity, CorrelationId, DismissAction, MissedCallRecord,
    NotificationAction, NumberPresentation, QueryHandle, RingDecision, SubscriptionId,
    PAYPHONE_NUMBER, PRIVATE_NUMBER,
};

/// Cloneable handle for feeding events into a dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    events: EventSender,
}

impl DispatcherHandle {
    pub fn submit(&self, event: impl Into<NotifierEvent>) -> Result<()> {
        self.events
            .send(event.into())
            .map_err(|_| NotifyError::ChannelClosed)
    }

    /// Report a status change on one subscription
    pub fn telephony(&self, subscription: SubscriptionId, kind: TelephonyEventKind) -> Result<()> {
        self.submit(TelephonyEvent::new(subscription, kind))
    }

    /// Report an unanswered call; the caller is looked up before posting
    pub fn call_missed(
        &self,
        subscription: SubscriptionId,
        correlation: CorrelationId,
        number: Option<String>,
        presentation: NumberPresentation,
        when: DateTime<Utc>,
    ) -> Result<()> {
        self.submit(NotifierEvent::CallMissed {
            subscription,
            correlation,
            number,
            presentation,
            when,
        })
    }

    /// Report a ringing call that needs a ring decision
    pub fn incoming_call(
        &self,
        subscription: SubscriptionId,
        correlation: CorrelationId,
        number: impl Into<String>,
    ) -> Result<()> {
        self.submit(NotifierEvent::IncomingCall {
            subscription,
            correlation,
            number: number.into(),
        })
    }

    pub fn call_disconnected(&self, correlation: CorrelationId) -> Result<()> {
        self.submit(NotifierEvent::CallDisconnected { correlation })
    }

    pub fn notification_dismissed(&self, action: DismissAction) -> Result<()> {
        self.submit(NotifierEvent::NotificationDismissed(action))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.submit(NotifierEvent::Shutdown)
    }
}

/// Incoming call waiting for its lookup or its timeout
struct PendingRing {
    handle: QueryHandle,
    subscription: SubscriptionId,
    timer: TimerHandle,
}

/// Routes queued events to the query coordinator and notification state
pub struct EventDispatcher {
    context: NotifierContext,
    timer: Arc<dyn TimerService>,
    queries: IdentityQueryCoordinator,
    notifications: SubscriptionNotificationState,
    tx: EventSender,
    rx: mpsc::UnboundedReceiver<NotifierEvent>,
    pending_rings: HashMap<CorrelationId, PendingRing>,
    processed: u64,
    /// A shutdown was already taken off the queue
    shutdown_requested: bool,
}

impl EventDispatcher {
    pub(crate) fn new(
        context: NotifierContext,
        timer: Arc<dyn TimerService>,
        tx: EventSender,
        rx: mpsc::UnboundedReceiver<NotifierEvent>,
    ) -> Self {
        let queries = IdentityQueryCoordinator::new(context.directory.clone(), tx.clone());
        let notifications = SubscriptionNotificationState::new(
            context.config.clone(),
            context.voicemail.clone(),
            timer.clone(),
        );
        Self {
            context,
            timer,
            queries,
            notifications,
            tx,
            rx,
            pending_rings: HashMap::new(),
            processed: 0,
            shutdown_requested: false,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            events: self.tx.clone(),
        }
    }

    pub fn context(&self) -> &NotifierContext {
        &self.context
    }

    /// Process events until [`NotifierEvent::Shutdown`]
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting notifier event loop for {} subscriptions",
            self.context.config.subscription_count
        );

        if self.context.config.replay_missed_calls_at_startup && !self.shutdown_requested {
            self.replay_missed_calls();
        }

        while self.process_next().await {}

        info!("Notifier event loop ended after {} events", self.processed);
        Ok(())
    }

    /// Wait for the next event and process it.
    ///
    /// Returns false on shutdown.
    pub async fn process_next(&mut self) -> bool {
        if self.shutdown_requested {
            return false;
        }
        match self.rx.recv().await {
            Some(NotifierEvent::Shutdown) | None => {
                self.shutdown_requested = true;
                false
            }
            Some(event) => {
                self.dispatch(event);
                true
            }
        }
    }

    /// Process everything already queued without waiting.
    ///
    /// Stops at a queued shutdown; later calls to [`Self::process_next`]
    /// and [`Self::run`] then return at once.
    pub fn drain_ready(&mut self) -> usize {
        let mut count = 0;
        if self.shutdown_requested {
            return count;
        }
        while let Ok(event) = self.rx.try_recv() {
            if event == NotifierEvent::Shutdown {
                self.shutdown_requested = true;
                break;
            }
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Read unseen missed calls from the call log in the background.
    ///
    /// The records come back as [`NotifierEvent::CallLogLoaded`].
    pub fn replay_missed_calls(&self) {
        let call_log = match &self.context.call_log {
            Some(call_log) => call_log.clone(),
            None => {
                debug!("No call log configured, skipping missed call replay");
                return;
            }
        };

        let events = self.tx.clone();
        tokio::spawn(async move {
            match call_log.new_missed_calls().await {
                Ok(records) => {
                    if events.send(NotifierEvent::CallLogLoaded(records)).is_err() {
                        debug!("Call log loaded after the dispatcher stopped");
                    }
                }
                Err(e) => warn!("Failed to read missed calls from the call log: {}", e),
            }
        });
    }

    /// Process one event to completion. Errors end up in the log.
    pub fn dispatch(&mut self, event: NotifierEvent) {
        self.processed += 1;
        let name = event.name();
        debug!("Dispatching {} event", name);

        if let Err(e) = self.route(event) {
            if e.is_precondition_violation() {
                warn!("Ignoring {} event: {}", name, e);
            } else {
                debug!("Event {} not applied: {}", name, e);
            }
        }
    }

    pub fn notification_state(&self, subscription: SubscriptionId) -> Option<&NotificationState> {
        self.notifications.state(subscription)
    }

    pub fn query_state(&self, handle: &QueryHandle) -> IdentityQueryState {
        self.queries.state(handle)
    }

    /// Whether a shutdown has been received
    pub fn is_shut_down(&self) -> bool {
        self.shutdown_requested
    }

    /// Events dispatched so far
    pub fn processed_events(&self) -> u64 {
        self.processed
    }

    fn route(&mut self, event: NotifierEvent) -> Result<()> {
        if let Some(sub) = event.subscription() {
            if !self.context.config.has_subscription(sub) {
                return Err(NotifyError::InvalidSubscription(sub));
            }
        }

        match event {
            NotifierEvent::Telephony(event) => {
                let actions = self.notifications.handle(event)?;
                self.present(&actions);
            }

            NotifierEvent::CallMissed {
                subscription,
                correlation,
                number,
                presentation,
                when,
            } => {
                self.on_call_missed(subscription, correlation, number.as_deref(), presentation, when)?;
            }

            NotifierEvent::IncomingCall {
                subscription,
                correlation,
                number,
            } => self.on_incoming_call(subscription, correlation, &number),

            NotifierEvent::CallDisconnected { correlation } => {
                if let Some(pending) = self.pending_rings.remove(&correlation) {
                    pending.timer.cancel();
                }
                if self.queries.release(&correlation) == Some(IdentityQueryState::Querying) {
                    debug!("Call {} disconnected before its lookup finished", correlation);
                }
            }

            NotifierEvent::QueryCompleted { handle, outcome } => {
                if let Some(completion) = self.queries.on_query_complete(&handle, outcome) {
                    self.on_identity_ready(completion)?;
                }
            }

            NotifierEvent::RingQueryTimeout { handle } => self.on_ring_timeout(&handle),

            NotifierEvent::RetryTimerFired { key, generation } => {
                let actions = self.notifications.on_retry_timer(key, generation);
                self.present(&actions);
            }

            NotifierEvent::CallLogLoaded(records) => self.on_call_log_loaded(records)?,

            NotifierEvent::NotificationDismissed(DismissAction::ClearMissedCalls) => {
                let actions = self.notifications.clear_all_missed_calls();
                self.present(&actions);
            }

            NotifierEvent::Shutdown => {
                debug!("Shutdown requested");
            }
        }

        Ok(())
    }

    fn on_call_missed(
        &mut self,
        subscription: SubscriptionId,
        correlation: CorrelationId,
        number: Option<&str>,
        presentation: NumberPresentation,
        when: DateTime<Utc>,
    ) -> Result<()> {
        match usable_number(number) {
            Some(number) if presentation == NumberPresentation::Allowed => {
                self.queries.start_query(
                    correlation,
                    number,
                    QueryPurpose::MissedCall { subscription, when },
                );
                Ok(())
            }
            _ => {
                debug!("Missed call {} has no number to look up", correlation);
                self.enqueue(TelephonyEvent::new(
                    subscription,
                    TelephonyEventKind::MissedCall {
                        identity: Some(CallerIdentity::presentation_only(presentation)),
                        when,
                    },
                ))
            }
        }
    }

    fn on_incoming_call(&mut self, subscription: SubscriptionId, correlation: CorrelationId, number: &str) {
        if let Some(previous) = self.pending_rings.remove(&correlation) {
            previous.timer.cancel();
        }

        let number = match usable_number(Some(number)) {
            Some(number) => number,
            None => {
                self.deliver_ring_decision(subscription, &correlation, RingDecision::Ring { custom_ringtone: None });
                return;
            }
        };

        let handle = self.queries.start_query(
            correlation.clone(),
            number,
            QueryPurpose::IncomingRing { subscription },
        );
        let timer = self.timer.after(
            self.context.config.ring_query_timeout(),
            NotifierEvent::RingQueryTimeout {
                handle: handle.clone(),
            },
        );
        self.pending_rings.insert(
            correlation,
            PendingRing {
                handle,
                subscription,
                timer,
            },
        );
    }

    fn on_identity_ready(&mut self, completion: QueryCompletion) -> Result<()> {
        let QueryCompletion {
            correlation,
            purpose,
            lookup_key,
            identity,
        } = completion;
        self.queries.release(&correlation);

        match purpose {
            QueryPurpose::MissedCall { subscription, when } => {
                let mut identity = identity.unwrap_or_default();
                if identity.number.is_none() {
                    identity.number = Some(lookup_key);
                }
                self.enqueue(TelephonyEvent::new(
                    subscription,
                    TelephonyEventKind::MissedCall {
                        identity: Some(identity),
                        when,
                    },
                ))
            }
            QueryPurpose::IncomingRing { subscription } => {
                if let Some(pending) = self.pending_rings.remove(&correlation) {
                    pending.timer.cancel();
                }
                let decision = match identity {
                    Some(identity) if identity.send_to_voicemail => RingDecision::SendToVoicemail,
                    Some(identity) => RingDecision::Ring {
                        custom_ringtone: identity.custom_ringtone,
                    },
                    None => RingDecision::Ring { custom_ringtone: None },
                };
                self.deliver_ring_decision(subscription, &correlation, decision);
                Ok(())
            }
        }
    }

    fn on_ring_timeout(&mut self, handle: &QueryHandle) {
        let correlation = handle.correlation();
        let pending = match self.pending_rings.get(correlation) {
            Some(pending) if &pending.handle == handle => pending,
            _ => {
                debug!("Dropping stale ring timeout for {}", handle);
                return;
            }
        };
        let subscription = pending.subscription;
        self.pending_rings.remove(correlation);

        if self.queries.state(handle) != IdentityQueryState::Querying {
            return;
        }

        info!("Caller lookup for {} timed out, ringing with the default ringtone", correlation);
        self.queries.release(correlation);
        self.deliver_ring_decision(subscription, correlation, RingDecision::Ring { custom_ringtone: None });
    }

    fn on_call_log_loaded(&mut self, records: Vec<MissedCallRecord>) -> Result<()> {
        info!("Replaying {} missed calls from the call log", records.len());

        for record in records {
            if !self.context.config.has_subscription(record.subscription) {
                warn!("Skipping call log entry for unknown {}", record.subscription);
                continue;
            }
            let presentation = presentation_for_number(record.number.as_deref());
            self.on_call_missed(
                record.subscription,
                CorrelationId::new(),
                record.number.as_deref(),
                presentation,
                record.when,
            )?;
        }
        Ok(())
    }

    fn deliver_ring_decision(
        &self,
        subscription: SubscriptionId,
        correlation: &CorrelationId,
        decision: RingDecision,
    ) {
        debug!("Ring decision for {} on {}: {:?}", correlation, subscription, decision);
        match &self.context.call_handler {
            Some(handler) => handler.on_ring_decision(subscription, correlation, decision),
            None => debug!("No incoming call handler registered"),
        }
    }

    fn enqueue(&self, event: impl Into<NotifierEvent>) -> Result<()> {
        self.tx.send(event.into()).map_err(|_| NotifyError::ChannelClosed)
    }

    fn present(&self, actions: &[NotificationAction]) {
        for action in actions {
            debug!(
                "{} notification {}",
                if action.is_show() { "Showing" } else { "Cancelling" },
                action.slot()
            );
            self.context.presenter.present(action);
        }
    }
}

/// Presentation implied by a call-log number sentinel
fn presentation_for_number(number: Option<&str>) -> NumberPresentation {
    match number.map(str::trim) {
        Some(PRIVATE_NUMBER) => NumberPresentation::Restricted,
        Some(PAYPHONE_NUMBER) => NumberPresentation::Payphone,
        other if usable_number(other).is_some() => NumberPresentation::Allowed,
        _ => NumberPresentation::Unknown,
    }
}
