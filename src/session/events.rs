use crate::file_set::ListItem;
use crate::models::{Bounds, EntryId};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::info;

/// A user-facing warning
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    ConversionFailed { file_name: String, reason: String },
    MergeFailed { message: String },
    RendererUnavailable { reason: String },
}

impl Alert {
    pub fn message(&self) -> String {
        match self {
            Alert::ConversionFailed { file_name, reason } => {
                format!("Failed to convert {}: {}", file_name, reason)
            }
            Alert::MergeFailed { message } => message.clone(),
            Alert::RendererUnavailable { reason } => {
                format!("Map tracks could not be drawn: {}", reason)
            }
        }
    }
}

/// Notifications published by the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The file list changed; carries the full re-rendered list
    FileListChanged { items: Vec<ListItem> },
    ViewportApplied { generation: u64, bounds: Bounds },
    /// Every render of the generation reported
    CycleSettled {
        generation: u64,
        viewport: Option<Bounds>,
    },
    /// An ingestion result arrived for an entry that is gone or already settled
    IngestDiscarded { entry_id: EntryId },
    Alert(Alert),
    MergeReady { file_name: String, size: usize },
}

type SubscriptionId = u64;

/// Filter criteria for event subscriptions
#[derive(Debug, Clone)]
enum SubscriptionFilter {
    All,
    Alerts,
}

impl SubscriptionFilter {
    fn matches(&self, event: &SessionEvent) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Alerts => matches!(event, SessionEvent::Alert(_)),
        }
    }
}

struct Subscription {
    filter: SubscriptionFilter,
    tx: tokio_mpsc::UnboundedSender<SessionEvent>,
}

/// Handle for subscribing to session events
#[derive(Clone)]
pub struct SessionEventHandle {
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionEventHandle {
    /// Create a new event handle and spawn background task to dispatch events
    pub fn new(
        mut event_rx: tokio_mpsc::UnboundedReceiver<SessionEvent>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        runtime_handle.spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let mut subs = subscriptions_clone.lock().unwrap();
                let mut to_remove = Vec::new();

                for (id, subscription) in subs.iter() {
                    if subscription.filter.matches(&event) {
                        // If send fails, receiver was dropped - mark for removal
                        if subscription.tx.send(event.clone()).is_err() {
                            to_remove.push(*id);
                        }
                    }
                }

                for id in to_remove {
                    subs.remove(&id);
                }
            }
            info!("Session event channel closed, exiting");
        });

        Self {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to every session event.
    /// Subscription is automatically removed when receiver is dropped
    pub fn subscribe_all(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        self.subscribe(SubscriptionFilter::All)
    }

    /// Subscribe to user-facing alerts only
    pub fn subscribe_alerts(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        self.subscribe(SubscriptionFilter::Alerts)
    }

    fn subscribe(&self, filter: SubscriptionFilter) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.subscriptions
            .lock()
            .unwrap()
            .insert(id, Subscription { filter, tx });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }
}
