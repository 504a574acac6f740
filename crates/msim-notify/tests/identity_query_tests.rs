//! Caller lookups racing each other, ring timeouts and call-log replay

mod common;

use chrono::Utc;
use std::time::Duration;

use common::{TestNotifier, WarnCapture};
use rvoip_msim_notify::test_support::{FakeDirectory, FakeVoicemail, FixedCallLog};
use rvoip_msim_notify::{
    CallerIdentity, CorrelationId, MissedCallRecord, NotifierConfig, NumberPresentation,
    RingDecision, SubscriptionId, TelephonyEventKind,
};

const SUB0: SubscriptionId = SubscriptionId::new(0);
const SUB1: SubscriptionId = SubscriptionId::new(1);

fn with_ringtone(name: &str, tone: &str) -> CallerIdentity {
    CallerIdentity {
        name: Some(name.to_string()),
        custom_ringtone: Some(tone.to_string()),
        ..Default::default()
    }
}

fn racing_contacts(old_delay: u64, new_delay: u64) -> FakeDirectory {
    FakeDirectory::default()
        .with_entry("5550001", with_ringtone("Old", "old-tone"))
        .with_entry("5550002", with_ringtone("New", "new-tone"))
        .with_delay("5550001", Duration::from_millis(old_delay))
        .with_delay("5550002", Duration::from_millis(new_delay))
}

fn slow_ring_config() -> NotifierConfig {
    NotifierConfig {
        ring_query_timeout_ms: 5_000,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_superseded_lookup_loses_when_it_finishes_last() {
    let mut n = TestNotifier::new(slow_ring_config(), FakeVoicemail::ready("12345"), racing_contacts(300, 100));
    let handle = n.dispatcher.handle();
    let conn = CorrelationId::from("conn-1");

    handle.incoming_call(SUB0, conn.clone(), "5550001").unwrap();
    handle.incoming_call(SUB0, conn.clone(), "5550002").unwrap();
    // both incoming calls, then both lookup results
    n.step(4).await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(n.dispatcher.drain_ready(), 0);

    assert_eq!(
        n.calls.decisions(),
        vec![(
            SUB0,
            conn,
            RingDecision::Ring {
                custom_ringtone: Some("new-tone".to_string())
            }
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_superseded_lookup_loses_when_it_finishes_first() {
    let mut n = TestNotifier::new(slow_ring_config(), FakeVoicemail::ready("12345"), racing_contacts(100, 300));
    let handle = n.dispatcher.handle();
    let conn = CorrelationId::from("conn-1");

    handle.incoming_call(SUB0, conn.clone(), "5550001").unwrap();
    handle.incoming_call(SUB0, conn.clone(), "5550002").unwrap();
    n.step(3).await;
    // the older result arrived and was dropped
    assert!(n.calls.decisions().is_empty());

    n.step(1).await;
    assert_eq!(
        n.calls.decisions(),
        vec![(
            SUB0,
            conn,
            RingDecision::Ring {
                custom_ringtone: Some("new-tone".to_string())
            }
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_missed_call_lookups_race_without_clobbering() {
    let directory = FakeDirectory::default()
        .with_entry("5550001", CallerIdentity::named("Alice"))
        .with_entry("5550002", CallerIdentity::named("Bob"))
        .with_delay("5550001", Duration::from_millis(300));
    let mut n = TestNotifier::new(NotifierConfig::default(), FakeVoicemail::ready("12345"), directory);
    let handle = n.dispatcher.handle();
    let conn = CorrelationId::from("conn-1");

    for number in ["5550001", "5550002"] {
        handle
            .call_missed(SUB1, conn.clone(), Some(number.to_string()), NumberPresentation::Allowed, Utc::now())
            .unwrap();
    }
    // two call_missed, Bob's result, Bob's missed_call, Alice's stale result
    n.step(5).await;

    let shows = n.presenter.shows();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0].body, "Bob");
    assert_eq!(n.dispatcher.notification_state(SUB1).unwrap().missed_call_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_to_voicemail_contact() {
    let directory = FakeDirectory::default().with_entry(
        "5550009",
        CallerIdentity {
            name: Some("Telemarketer".to_string()),
            send_to_voicemail: true,
            ..Default::default()
        },
    );
    let mut n = TestNotifier::new(NotifierConfig::default(), FakeVoicemail::ready("12345"), directory);

    n.dispatcher
        .handle()
        .incoming_call(SUB1, CorrelationId::from("conn-7"), "5550009")
        .unwrap();
    n.step(2).await;

    let decisions = n.calls.decisions();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].0, SUB1);
    assert_eq!(decisions[0].2, RingDecision::SendToVoicemail);
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_rings_with_default_after_timeout() {
    let directory = FakeDirectory::default()
        .with_entry("5550001", with_ringtone("Alice", "alice-tone"))
        .with_delay("5550001", Duration::from_secs(2));
    let mut n = TestNotifier::new(NotifierConfig::default(), FakeVoicemail::ready("12345"), directory);
    let start = tokio::time::Instant::now();

    n.dispatcher
        .handle()
        .incoming_call(SUB0, CorrelationId::from("conn-1"), "5550001")
        .unwrap();
    // incoming call, timeout
    n.step(2).await;
    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert_eq!(
        n.calls.decisions()[0].2,
        RingDecision::Ring { custom_ringtone: None }
    );

    // the late result is dropped
    n.step(1).await;
    assert_eq!(n.calls.decisions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_invalidates_pending_lookup() {
    let directory = FakeDirectory::default()
        .with_entry("5550001", with_ringtone("Alice", "alice-tone"))
        .with_delay("5550001", Duration::from_millis(200));
    let mut n = TestNotifier::new(NotifierConfig::default(), FakeVoicemail::ready("12345"), directory);
    let handle = n.dispatcher.handle();
    let conn = CorrelationId::from("conn-1");

    handle.incoming_call(SUB0, conn.clone(), "5550001").unwrap();
    handle.call_disconnected(conn).unwrap();
    n.step(3).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(n.dispatcher.drain_ready(), 0);
    assert!(n.calls.decisions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_startup_replay_posts_unseen_missed_calls() {
    let records = vec![
        MissedCallRecord {
            subscription: SUB0,
            number: Some("5550001".to_string()),
            when: Utc::now(),
        },
        MissedCallRecord {
            subscription: SUB1,
            number: Some("-2".to_string()),
            when: Utc::now(),
        },
    ];
    let directory = FakeDirectory::default().with_entry("5550001", CallerIdentity::named("Alice"));
    let mut n = TestNotifier::with_call_log(
        NotifierConfig::default(),
        FakeVoicemail::ready("12345"),
        directory,
        Some(FixedCallLog::new(records)),
    );

    n.dispatcher.replay_missed_calls();
    // call log loaded, private missed call, Alice's result, Alice's missed call
    n.step(4).await;

    assert_eq!(n.dispatcher.notification_state(SUB0).unwrap().missed_call_count, 1);
    assert_eq!(n.dispatcher.notification_state(SUB1).unwrap().missed_call_count, 1);

    let shows = n.presenter.shows();
    assert_eq!(shows.len(), 2);
    assert_eq!(shows[1].body, "2 missed calls");
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_call_log_is_logged() {
    let mut n = TestNotifier::with_call_log(
        NotifierConfig::default(),
        FakeVoicemail::ready("12345"),
        FakeDirectory::default(),
        Some(FixedCallLog::broken()),
    );
    let (warnings, _guard) = WarnCapture::install();

    n.dispatcher.replay_missed_calls();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(n.dispatcher.drain_ready(), 0);
    assert!(warnings.contains("Failed to read missed calls"));
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_processes_until_shutdown() {
    let directory = FakeDirectory::default().with_entry("5550001", CallerIdentity::named("Alice"));
    let records = vec![MissedCallRecord {
        subscription: SUB0,
        number: Some("5550001".to_string()),
        when: Utc::now(),
    }];
    let n = TestNotifier::with_call_log(
        NotifierConfig::default(),
        FakeVoicemail::ready("12345"),
        directory,
        Some(FixedCallLog::new(records)),
    );
    let presenter = n.presenter.clone();
    let handle = n.dispatcher.handle();
    let mut dispatcher = n.dispatcher;

    let task = tokio::spawn(async move {
        dispatcher.run().await.unwrap();
        dispatcher
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown().unwrap();
    let dispatcher = task.await.unwrap();

    assert_eq!(presenter.shows()[0].body, "Alice");
    assert_eq!(dispatcher.notification_state(SUB0).unwrap().missed_call_count, 1);

    drop(dispatcher);
    assert!(handle.shutdown().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_taken_by_drain_still_stops_run() {
    let mut n = TestNotifier::new(NotifierConfig::default(), FakeVoicemail::ready("12345"), FakeDirectory::default());
    let handle = n.dispatcher.handle();

    handle
        .telephony(SUB1, TelephonyEventKind::CfiChanged { visible: true })
        .unwrap();
    handle.shutdown().unwrap();
    assert_eq!(n.dispatcher.drain_ready(), 1);
    assert!(n.dispatcher.is_shut_down());

    let finished = tokio::time::timeout(Duration::from_secs(2), n.dispatcher.run()).await;
    assert!(finished.is_ok(), "run must return once a shutdown was drained");
    assert!(!n.dispatcher.process_next().await);
    assert_eq!(n.presenter.shows().len(), 1);
}
