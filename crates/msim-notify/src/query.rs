//! Caller identity lookups
//!
//! Lookups run on spawned tasks and report back through the dispatcher
//! queue, so they can finish late and in any order. Each correlation has at
//! most one authoritative query: starting a new one makes the previous one
//! stale, and a stale result is dropped when it finally arrives instead of
//! overwriting what the newer query produced.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::collaborators::{DirectoryLookup, EventSender};
use crate::events::{LookupOutcome, NotifierEvent};
use crate::types::{CallEventToken, CallerIdentity, CorrelationId, QueryHandle, SubscriptionId};

/// Lifecycle of one identity query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityQueryState {
    /// Never issued by this coordinator
    Idle,
    /// Waiting for the directory
    Querying,
    /// Result delivered; the record stays until released
    Ready,
    /// Superseded, timed out or released; results are discarded
    Stale,
}

/// What to do with the identity once it is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPurpose {
    /// Post a missed-call notification
    MissedCall {
        subscription: SubscriptionId,
        when: DateTime<Utc>,
    },
    /// Choose how an incoming call rings
    IncomingRing { subscription: SubscriptionId },
}

impl QueryPurpose {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            QueryPurpose::MissedCall { subscription, .. }
            | QueryPurpose::IncomingRing { subscription } => *subscription,
        }
    }
}

/// An authoritative result handed back to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCompletion {
    pub correlation: CorrelationId,
    pub purpose: QueryPurpose,
    /// Key the directory was asked about
    pub lookup_key: String,
    /// `None` when the directory had nothing or failed
    pub identity: Option<CallerIdentity>,
}

#[derive(Debug)]
struct QueryRecord {
    token: CallEventToken,
    purpose: QueryPurpose,
    lookup_key: String,
    state: IdentityQueryState,
    started_at: Instant,
}

/// Issues identity lookups and decides which results still count
pub struct IdentityQueryCoordinator {
    /// Arena of current queries, one per correlation
    queries: HashMap<CorrelationId, QueryRecord>,
    directory: Arc<dyn DirectoryLookup>,
    events: EventSender,
    next_token: u64,
    stale_results: u64,
}

impl IdentityQueryCoordinator {
    pub fn new(directory: Arc<dyn DirectoryLookup>, events: EventSender) -> Self {
        Self {
            queries: HashMap::new(),
            directory,
            events,
            next_token: 1,
            stale_results: 0,
        }
    }

    /// Start a lookup for `correlation`, superseding any query in flight for it.
    ///
    /// Returns at once; the result arrives later as
    /// [`NotifierEvent::QueryCompleted`]. Must be called inside a tokio runtime.
    pub fn start_query(
        &mut self,
        correlation: CorrelationId,
        lookup_key: impl Into<String>,
        purpose: QueryPurpose,
    ) -> QueryHandle {
        let lookup_key = lookup_key.into();
        let token = CallEventToken(self.next_token);
        self.next_token += 1;

        if let Some(previous) = self.queries.get(&correlation) {
            if previous.state == IdentityQueryState::Querying {
                debug!(
                    "Query {} for {} superseded by {}",
                    previous.token, correlation, token
                );
            }
        }

        self.queries.insert(
            correlation.clone(),
            QueryRecord {
                token,
                purpose,
                lookup_key: lookup_key.clone(),
                state: IdentityQueryState::Querying,
                started_at: Instant::now(),
            },
        );

        let handle = QueryHandle::new(correlation, token);
        debug!("Starting identity query {}", handle);

        let directory = self.directory.clone();
        let events = self.events.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            let outcome = match directory.lookup(&lookup_key).await {
                Ok(Some(identity)) => LookupOutcome::Found(identity),
                Ok(None) => LookupOutcome::NotFound,
                Err(e) => LookupOutcome::Failed(e.to_string()),
            };
            let event = NotifierEvent::QueryCompleted {
                handle: task_handle,
                outcome,
            };
            if events.send(event).is_err() {
                debug!("Identity query finished after the dispatcher stopped");
            }
        });

        handle
    }

    /// Accept or drop a lookup result.
    ///
    /// Returns the completion only if `handle` is still the authoritative
    /// query for its correlation and has not completed before.
    pub fn on_query_complete(
        &mut self,
        handle: &QueryHandle,
        outcome: LookupOutcome,
    ) -> Option<QueryCompletion> {
        let record = match self.queries.get_mut(handle.correlation()) {
            Some(record)
                if record.token == handle.token()
                    && record.state == IdentityQueryState::Querying =>
            {
                record
            }
            _ => {
                self.stale_results += 1;
                debug!("Dropping stale identity result for {}", handle);
                return None;
            }
        };

        record.state = IdentityQueryState::Ready;
        let elapsed = record.started_at.elapsed();

        let identity = match outcome {
            LookupOutcome::Found(identity) => Some(identity),
            LookupOutcome::NotFound => {
                debug!("No directory entry for {}", handle);
                None
            }
            LookupOutcome::Failed(reason) => {
                info!("Identity lookup for {} failed, treating caller as unknown: {}", handle, reason);
                None
            }
        };

        debug!("Identity query {} ready after {:?}", handle, elapsed);
        Some(QueryCompletion {
            correlation: handle.correlation().clone(),
            purpose: record.purpose.clone(),
            lookup_key: record.lookup_key.clone(),
            identity,
        })
    }

    /// Drop whatever query exists for `correlation`.
    ///
    /// A query still in flight becomes stale. Returns the state the record
    /// was in, or `None` if there was no record.
    pub fn release(&mut self, correlation: &CorrelationId) -> Option<IdentityQueryState> {
        let record = self.queries.remove(correlation)?;
        if record.state == IdentityQueryState::Querying {
            debug!("Invalidated in-flight query {} for {}", record.token, correlation);
        }
        Some(record.state)
    }

    /// Current state of the query behind `handle`
    pub fn state(&self, handle: &QueryHandle) -> IdentityQueryState {
        match self.queries.get(handle.correlation()) {
            Some(record) if record.token == handle.token() => record.state,
            _ if handle.token().0 < self.next_token => IdentityQueryState::Stale,
            _ => IdentityQueryState::Idle,
        }
    }

    /// Number of correlations with a query in flight
    pub fn in_flight(&self) -> usize {
        self.queries
            .values()
            .filter(|r| r.state == IdentityQueryState::Querying)
            .count()
    }

    /// Results dropped because they were no longer authoritative
    pub fn stale_results(&self) -> u64 {
        self.stale_results
    }
}
