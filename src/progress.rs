use crate::address::Address;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::{
    fmt::{self, Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// The observable pipeline stages
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Step {
    /// Status extraction and identifier resolution
    #[serde(rename = "extractPublisherAddress")]
    ExtractPublisherAddress,
    /// Blob retrieval from the configured providers
    #[serde(rename = "retrieveBlobData")]
    RetrieveBlobData,
    /// Cascade decoding
    #[serde(rename = "reconstructBFC")]
    ReconstructBfc,
    /// Membership test
    #[serde(rename = "checkRevocation")]
    CheckRevocation,
}

/// Where a stage is in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Emitted before the stage runs
    Started,
    /// Emitted after the stage succeeded
    Completed,
}

/// Stage specific data carried by a `completed` event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum StepMetrics {
    /// The resolved publisher
    Address {
        /// The publisher address
        address: Address,
    },
    /// The blob that was retrieved
    Blob {
        /// The provider that located the transaction
        provider: String,
        /// The blob carrying transaction
        transaction_hash: String,
        /// Its block
        block_number: u64,
    },
    /// The number of non empty cascade layers
    LevelCount {
        /// Layer count after sanitizing
        level_count: usize,
    },
    /// The final verdict
    Verdict {
        /// Whether the credential is revoked
        is_revoked: bool,
    },
}

/// A pipeline lifecycle event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The caller supplied correlation id
    pub client_id: Option<String>,
    /// The stage
    pub step: Step,
    /// The stage lifecycle point
    pub status: StepStatus,
    /// Stage data, only on `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_metrics: Option<StepMetrics>,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

/// Receives pipeline progress events
pub trait ProgressObserver: Send + Sync {
    /// Called once per event. Must not block.
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// An observer that turns progress into a stream the caller can receive from
pub fn progress_channel() -> (Arc<dyn ProgressObserver>, UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = unbounded_channel();
    let observer: Arc<dyn ProgressObserver> = Arc::new(move |event: &ProgressEvent| {
        // a dropped receiver only means nobody is listening
        let _ = tx.send(event.clone());
    });
    (observer, rx)
}

/// Optional per call context for a status check
#[derive(Clone, Default)]
pub struct StatusCheckOptions {
    /// Where progress events go
    pub observer: Option<Arc<dyn ProgressObserver>>,
    /// Correlation id copied into every event
    pub client_id: Option<String>,
}

impl StatusCheckOptions {
    /// Options reporting to `observer` tagged with `client_id`
    pub fn new(observer: Arc<dyn ProgressObserver>, client_id: impl Into<String>) -> Self {
        Self {
            observer: Some(observer),
            client_id: Some(client_id.into()),
        }
    }
}

impl Debug for StatusCheckOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusCheckOptions")
            .field("observer", &self.observer.as_ref().map(|_| "ProgressObserver"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Emits events for one pipeline run. A missing observer makes every call a no-op.
#[derive(Copy, Clone, Default)]
pub(crate) struct Reporter<'a> {
    observer: Option<&'a dyn ProgressObserver>,
    client_id: Option<&'a str>,
}

impl<'a> Reporter<'a> {
    pub fn new(options: Option<&'a StatusCheckOptions>) -> Self {
        match options {
            Some(o) => Self {
                observer: o.observer.as_deref(),
                client_id: o.client_id.as_deref(),
            },
            None => Self::default(),
        }
    }

    pub fn started(&self, step: Step) {
        self.emit(step, StepStatus::Started, None);
    }

    pub fn completed(&self, step: Step, metrics: StepMetrics) {
        self.emit(step, StepStatus::Completed, Some(metrics));
    }

    fn emit(&self, step: Step, status: StepStatus, additional_metrics: Option<StepMetrics>) {
        let Some(observer) = self.observer else {
            return;
        };
        let event = ProgressEvent {
            client_id: self.client_id.map(str::to_string),
            step,
            status,
            additional_metrics,
            timestamp: Utc::now(),
        };
        if panic::catch_unwind(AssertUnwindSafe(|| observer.on_progress(&event))).is_err() {
            warn!("progress observer panicked on {:?} {:?}", step, status);
        }
    }
}
