use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::expedition::ExpeditionStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "event dropped");
        }
    }
}

/// Domain events emitted by the expedition services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ExpeditionCreated {
        expedition_id: Uuid,
        number: String,
        user_id: Uuid,
    },
    ExpeditionUpdated(Uuid),
    ExpeditionStatusChanged {
        expedition_id: Uuid,
        from: ExpeditionStatus,
        to: ExpeditionStatus,
        automatic: bool,
        at: DateTime<Utc>,
    },
    ExpeditionDeleted {
        expedition_id: Uuid,
        number: String,
    },
}

/// Consumes the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ExpeditionCreated {
                expedition_id,
                number,
                user_id,
            } => {
                info!(%expedition_id, %number, %user_id, "expedition created");
            }
            Event::ExpeditionUpdated(expedition_id) => {
                info!(%expedition_id, "expedition updated");
            }
            Event::ExpeditionStatusChanged {
                expedition_id,
                from,
                to,
                automatic,
                at,
            } => {
                info!(
                    %expedition_id,
                    from = %from,
                    to = %to,
                    automatic,
                    at = %at,
                    "expedition status changed"
                );
            }
            Event::ExpeditionDeleted {
                expedition_id,
                number,
            } => {
                info!(%expedition_id, %number, "expedition deleted");
            }
        }
    }

    info!("Event processing loop stopped");
}
