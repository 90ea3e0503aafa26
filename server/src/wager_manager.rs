use chrono::{DateTime, Utc};
use surrealdb::sql::Thing;
use surrealdb::Connection;
use tokio::sync::mpsc;

use common::{ConfirmationResult, DeclarationResult, InvitationResult, Outcome, WagerStatus};

use crate::database_manager::Responder;
use crate::lifecycle::LifecycleController;

/// One variant per lifecycle operation; connection handlers never touch the
/// store directly.
pub enum WagerRequest {
    ProposeWager {
        creator: Thing,
        description: String,
        stake: u64,
        due_date: Option<DateTime<Utc>>,
        responders: Vec<Thing>,
        responder: Responder<Thing>,
    },
    RespondToInvitation {
        caller: Thing,
        participant: Thing,
        accept: bool,
        responder: Responder<InvitationResult>,
    },
    DeclareOutcome {
        caller: Thing,
        participant: Thing,
        outcome: Outcome,
        responder: Responder<DeclarationResult>,
    },
    ConfirmOutcome {
        caller: Thing,
        participant: Thing,
        responder: Responder<ConfirmationResult>,
    },
    DisputeOutcome {
        caller: Thing,
        participant: Thing,
        responder: Responder<WagerStatus>,
    },
    CancelWager {
        caller: Thing,
        wager: Thing,
        responder: Responder<WagerStatus>,
    },
}

pub struct WagerManager<Conn: Connection> {
    work_queue: mpsc::Receiver<WagerRequest>,
    controller: LifecycleController<Conn>,
}

//NOTE: No functions in this impl may crash
impl<Conn: Connection> WagerManager<Conn> {
    pub fn new(work_queue: mpsc::Receiver<WagerRequest>, controller: LifecycleController<Conn>) -> Self {
        Self {
            work_queue,
            controller,
        }
    }

    /// Requests are handled to completion one at a time; this is what
    /// serializes racing mutations on the same wager.
    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            // we do not care if the receiver has already disappeared
            match request {
                WagerRequest::ProposeWager {
                    creator,
                    description,
                    stake,
                    due_date,
                    responders,
                    responder,
                } => {
                    let result = self
                        .controller
                        .propose_wager(&creator, description, stake, due_date, &responders)
                        .await;
                    responder.send(result).ok();
                }
                WagerRequest::RespondToInvitation {
                    caller,
                    participant,
                    accept,
                    responder,
                } => {
                    let result = self
                        .controller
                        .respond_to_invitation(&caller, &participant, accept)
                        .await;
                    responder.send(result).ok();
                }
                WagerRequest::DeclareOutcome {
                    caller,
                    participant,
                    outcome,
                    responder,
                } => {
                    let result = self
                        .controller
                        .declare_outcome(&caller, &participant, outcome)
                        .await;
                    responder.send(result).ok();
                }
                WagerRequest::ConfirmOutcome {
                    caller,
                    participant,
                    responder,
                } => {
                    let result = self.controller.confirm_outcome(&caller, &participant).await;
                    responder.send(result).ok();
                }
                WagerRequest::DisputeOutcome {
                    caller,
                    participant,
                    responder,
                } => {
                    let result = self.controller.dispute_outcome(&caller, &participant).await;
                    responder.send(result).ok();
                }
                WagerRequest::CancelWager {
                    caller,
                    wager,
                    responder,
                } => {
                    let result = self.controller.cancel_wager(&caller, &wager).await;
                    responder.send(result).ok();
                }
            }
        }
    }
}
