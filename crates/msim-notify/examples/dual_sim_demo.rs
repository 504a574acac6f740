//! Dual-SIM notifier demo
//!
//! Drives a two-subscription notifier with in-memory collaborators and prints
//! every notification it posts. Set `MSIM_NOTIFY_CONFIG` to a YAML file to
//! override the defaults.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

use rvoip_msim_notify::{
    CallLogSource, CallerIdentity, CancelNotification, CorrelationId, DirectoryLookup,
    IncomingCallHandler, MissedCallRecord, NotificationPresenter, NotifierBuilder, NotifierConfig,
    NumberPresentation, Result, RingDecision, ShowNotification, SubscriptionId, TelephonyEventKind,
    VoicemailProvider,
};

struct ConsoleShade;

impl NotificationPresenter for ConsoleShade {
    fn show(&self, n: &ShowNotification) {
        println!("[SHADE] show   {:<22} {} | {}", n.slot().to_string(), n.title, n.body);
    }

    fn cancel(&self, n: &CancelNotification) {
        println!("[SHADE] cancel {}", n.slot());
    }
}

struct ConsoleRinger;

impl IncomingCallHandler for ConsoleRinger {
    fn on_ring_decision(&self, subscription: SubscriptionId, correlation: &CorrelationId, decision: RingDecision) {
        println!("[RING]  {} {} -> {:?}", subscription, correlation, decision);
    }
}

/// SIM whose records take a few polls to load
struct SlowSim {
    polls: AtomicU32,
}

impl VoicemailProvider for SlowSim {
    fn voicemail_number(&self, subscription: SubscriptionId) -> Option<String> {
        (self.polls.load(Ordering::SeqCst) >= 2).then(|| format!("+1555010{}", subscription.0))
    }

    fn sim_records_loaded(&self, _subscription: SubscriptionId) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst) >= 2
    }

    fn voice_message_count(&self, _subscription: SubscriptionId) -> Option<u32> {
        Some(2)
    }
}

struct AddressBook {
    contacts: HashMap<String, CallerIdentity>,
}

#[async_trait]
impl DirectoryLookup for AddressBook {
    async fn lookup(&self, key: &str) -> Result<Option<CallerIdentity>> {
        sleep(Duration::from_millis(50)).await;
        Ok(self.contacts.get(key).cloned())
    }
}

struct StartupLog;

#[async_trait]
impl CallLogSource for StartupLog {
    async fn new_missed_calls(&self) -> Result<Vec<MissedCallRecord>> {
        Ok(vec![MissedCallRecord {
            subscription: SubscriptionId::new(1),
            number: Some("-2".to_string()),
            when: Utc::now(),
        }])
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rvoip_msim_notify=info".parse()?),
        )
        .init();

    let config = NotifierConfig::load(None)?;
    info!("Starting demo with {} subscriptions", config.subscription_count);

    let mut contacts = HashMap::new();
    contacts.insert("5550100".to_string(), CallerIdentity::named("Alice"));
    contacts.insert(
        "5550199".to_string(),
        CallerIdentity {
            name: Some("Bob".to_string()),
            custom_ringtone: Some("bob.ogg".to_string()),
            ..Default::default()
        },
    );

    let mut dispatcher = NotifierBuilder::new(
        Arc::new(ConsoleShade),
        Arc::new(SlowSim { polls: AtomicU32::new(0) }),
        Arc::new(AddressBook { contacts }),
    )
    .with_config(NotifierConfig {
        vm_number_retry_delay_ms: 200,
        ..config
    })
    .with_call_log(Arc::new(StartupLog))
    .with_call_handler(Arc::new(ConsoleRinger))
    .build()?;

    let handle = dispatcher.handle();
    let notifier = tokio::spawn(async move { dispatcher.run().await });

    let sub0 = SubscriptionId::new(0);
    let sub1 = SubscriptionId::new(1);

    handle.telephony(sub0, TelephonyEventKind::MwiChanged { visible: true })?;
    handle.telephony(sub1, TelephonyEventKind::CfiChanged { visible: true })?;
    handle.incoming_call(sub1, CorrelationId::new(), "5550199")?;
    handle.call_missed(
        sub0,
        CorrelationId::new(),
        Some("5550100".to_string()),
        NumberPresentation::Allowed,
        Utc::now(),
    )?;
    handle.telephony(
        sub1,
        TelephonyEventKind::ServiceStateChanged {
            in_service: false,
            selected_network: Some("Carrier X".to_string()),
        },
    )?;

    sleep(Duration::from_secs(1)).await;

    handle.telephony(sub0, TelephonyEventKind::MissedCallsViewed)?;
    handle.telephony(sub1, TelephonyEventKind::CfiChanged { visible: false })?;

    sleep(Duration::from_millis(100)).await;
    handle.shutdown()?;
    notifier.await??;

    println!("Demo complete");
    Ok(())
}
