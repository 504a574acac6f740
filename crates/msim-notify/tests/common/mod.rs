//! Shared harness for the integration tests
#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use rvoip_msim_notify::test_support::{
    FakeDirectory, FakeVoicemail, FixedCallLog, RecordingCallHandler, RecordingPresenter,
};
use rvoip_msim_notify::{EventDispatcher, NotifierBuilder, NotifierConfig};

/// Dispatcher wired to recording fakes, using the real tokio timer
pub struct TestNotifier {
    pub dispatcher: EventDispatcher,
    pub presenter: Arc<RecordingPresenter>,
    pub calls: Arc<RecordingCallHandler>,
    pub voicemail: Arc<FakeVoicemail>,
}

impl TestNotifier {
    pub fn new(config: NotifierConfig, voicemail: FakeVoicemail, directory: FakeDirectory) -> Self {
        Self::with_call_log(config, voicemail, directory, None)
    }

    pub fn with_call_log(
        config: NotifierConfig,
        voicemail: FakeVoicemail,
        directory: FakeDirectory,
        call_log: Option<FixedCallLog>,
    ) -> Self {
        let presenter = Arc::new(RecordingPresenter::default());
        let calls = Arc::new(RecordingCallHandler::default());
        let voicemail = Arc::new(voicemail);

        let mut builder = NotifierBuilder::new(presenter.clone(), voicemail.clone(), Arc::new(directory))
            .with_config(config)
            .with_call_handler(calls.clone());
        if let Some(call_log) = call_log {
            builder = builder.with_call_log(Arc::new(call_log));
        }

        Self {
            dispatcher: builder.build().unwrap(),
            presenter,
            calls,
            voicemail,
        }
    }

    /// Process exactly `n` events, waiting for each
    pub async fn step(&mut self, n: usize) {
        for _ in 0..n {
            assert!(self.dispatcher.process_next().await, "dispatcher stopped early");
        }
    }
}

/// Collects the messages of every WARN event
#[derive(Clone, Default)]
pub struct WarnCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl WarnCapture {
    /// Install as the thread's default subscriber until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.messages.lock().unwrap().push(visitor.message);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
