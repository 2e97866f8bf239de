//! Fault reporting
//!
//! The pipeline never persists diagnostics itself. It hands each dropped
//! fragment to a [`FaultReporter`] passed in at construction. Reporting
//! must not block a run and a failed delivery must not fail it.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::query::Rejection;

#[derive(Debug, Clone, PartialEq)]
pub enum FaultKind {
    /// Required selectors resolved to nothing. Carries the fragment's
    /// outer HTML for diagnosis.
    MissingRequiredField {
        fields: Vec<String>,
        fragment_html: String,
    },
    /// The fragment was extracted but the query turned it away.
    QueryMismatch { reason: Rejection },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultEvent {
    pub vendor: String,
    pub query: String,
    /// Position of the fragment among the located listings.
    pub index: usize,
    pub kind: FaultKind,
    pub at: DateTime<Utc>,
}

impl FaultEvent {
    pub fn new(vendor: &str, query: &str, index: usize, kind: FaultKind) -> Self {
        Self {
            vendor: vendor.to_string(),
            query: query.to_string(),
            index,
            kind,
            at: Utc::now(),
        }
    }
}

pub trait FaultReporter: Send + Sync {
    fn report(&self, event: FaultEvent);
}

/// Writes events to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&self, event: FaultEvent) {
        match &event.kind {
            FaultKind::MissingRequiredField { fields, fragment_html } => warn!(
                vendor = %event.vendor,
                query = %event.query,
                index = event.index,
                ?fields,
                fragment = %fragment_html,
                "Dropped listing: missing required field(s)"
            ),
            FaultKind::QueryMismatch { reason } => debug!(
                vendor = %event.vendor,
                query = %event.query,
                index = event.index,
                %reason,
                "Dropped listing: query mismatch"
            ),
        }
    }
}

/// Hands events to a tokio channel; a background task consumes them.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<FaultEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FaultEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn `sink` on the current tokio runtime and feed it every event.
    /// The task ends once all reporters are dropped.
    pub fn spawn<F>(mut sink: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(FaultEvent) + Send + 'static,
    {
        let (reporter, mut rx) = Self::new();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink(event);
            }
        });
        (reporter, handle)
    }
}

impl FaultReporter for ChannelReporter {
    fn report(&self, event: FaultEvent) {
        if self.tx.send(event).is_err() {
            trace!("Fault sink closed, event discarded");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<FaultEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FaultEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl FaultReporter for MemoryReporter {
    fn report(&self, event: FaultEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
