use surrealdb::sql::Thing;
use tokio::sync::mpsc;
use tracing::{info, warn};

use common::Outcome;

/// Events handed to the external notification component. Delivery is
/// fire-and-forget; a dropped event never rolls back the transaction that
/// produced it.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    WagerProposed {
        wager: Thing,
        creator: Thing,
        responders: Vec<Thing>,
    },
    InvitationAnswered {
        wager: Thing,
        responder: Thing,
        accepted: bool,
    },
    OutcomeClaimed {
        wager: Thing,
        author: Thing,
        claimed: Outcome,
    },
    OutcomeConfirmed {
        wager: Thing,
        confirmer: Thing,
    },
    OutcomeDisputed {
        wager: Thing,
        disputer: Thing,
    },
    WagerCancelled {
        wager: Thing,
    },
}

#[derive(Clone)]
pub struct Notifier {
    events: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn new(events: mpsc::Sender<NotificationEvent>) -> Self {
        Self { events }
    }

    pub fn notify(&self, event: NotificationEvent) {
        if let Err(error) = self.events.try_send(event) {
            warn!(%error, "dropped notification event");
        }
    }
}

pub struct NotificationDispatcher {
    events: mpsc::Receiver<NotificationEvent>,
}

impl NotificationDispatcher {
    pub fn new(events: mpsc::Receiver<NotificationEvent>) -> Self {
        Self { events }
    }

    pub async fn dispatch(&mut self) {
        while let Some(event) = self.events.recv().await {
            // stands in for the external delivery channel
            info!(?event, "notification");
        }
    }
}
