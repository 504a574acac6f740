//! Notifier Builder
//!
//! Wires configuration and collaborators into a [`NotifierContext`] and
//! builds the dispatcher around it.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::collaborators::{
    CallLogSource, DirectoryLookup, IncomingCallHandler, NotificationPresenter, TimerService,
    TokioTimer, VoicemailProvider,
};
use crate::config::NotifierConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::Result;

/// Configuration plus every collaborator the notifier talks to
///
/// Built once and owned by the dispatcher.
pub struct NotifierContext {
    pub(crate) config: Arc<NotifierConfig>,
    pub(crate) presenter: Arc<dyn NotificationPresenter>,
    pub(crate) voicemail: Arc<dyn VoicemailProvider>,
    pub(crate) directory: Arc<dyn DirectoryLookup>,
    pub(crate) call_log: Option<Arc<dyn CallLogSource>>,
    pub(crate) call_handler: Option<Arc<dyn IncomingCallHandler>>,
}

impl NotifierContext {
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }
}

/// Builder for creating an [`EventDispatcher`]
pub struct NotifierBuilder {
    config: NotifierConfig,
    presenter: Arc<dyn NotificationPresenter>,
    voicemail: Arc<dyn VoicemailProvider>,
    directory: Arc<dyn DirectoryLookup>,
    call_log: Option<Arc<dyn CallLogSource>>,
    call_handler: Option<Arc<dyn IncomingCallHandler>>,
    timer: Option<Arc<dyn TimerService>>,
}

impl NotifierBuilder {
    /// Create a builder with the required collaborators and default configuration
    pub fn new(
        presenter: Arc<dyn NotificationPresenter>,
        voicemail: Arc<dyn VoicemailProvider>,
        directory: Arc<dyn DirectoryLookup>,
    ) -> Self {
        Self {
            config: NotifierConfig::default(),
            presenter,
            voicemail,
            directory,
            call_log: None,
            call_handler: None,
            timer: None,
        }
    }

    pub fn with_config(mut self, config: NotifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of SIM slots
    pub fn with_subscription_count(mut self, count: u8) -> Self {
        self.config.subscription_count = count;
        self
    }

    /// Mark the device as data-only
    pub fn without_voice(mut self) -> Self {
        self.config.voice_capable = false;
        self
    }

    /// Source for replaying unseen missed calls at startup
    pub fn with_call_log(mut self, call_log: Arc<dyn CallLogSource>) -> Self {
        self.call_log = Some(call_log);
        self
    }

    /// Receiver of incoming-call ring decisions
    pub fn with_call_handler(mut self, handler: Arc<dyn IncomingCallHandler>) -> Self {
        self.call_handler = Some(handler);
        self
    }

    /// Replace the tokio-backed timer
    pub fn with_timer(mut self, timer: Arc<dyn TimerService>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Validate the configuration and build the dispatcher
    pub fn build(self) -> Result<EventDispatcher> {
        self.config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let timer = match self.timer {
            Some(timer) => timer,
            None => Arc::new(TokioTimer::new(tx.clone())) as Arc<dyn TimerService>,
        };

        debug!(
            "Building notifier for {} subscriptions (voice capable: {})",
            self.config.subscription_count, self.config.voice_capable
        );

        let context = NotifierContext {
            config: Arc::new(self.config),
            presenter: self.presenter,
            voicemail: self.voicemail,
            directory: self.directory,
            call_log: self.call_log,
            call_handler: self.call_handler,
        };

        Ok(EventDispatcher::new(context, timer, tx, rx))
    }
}
