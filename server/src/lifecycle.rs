use chrono::{DateTime, Utc};
use surrealdb::sql::Thing;
use tracing::info;

use common::{
    ConfirmationResult, DeclarationResult, InvitationResult, Outcome, ParticipantStatus,
    WagerError, WagerStatus,
};

use crate::aggregation::derive_wager_status;
use crate::database::{store_err, DatabaseConnection, DbParticipant, DbWager};
use crate::guard;
use crate::notifier::{NotificationEvent, Notifier};
use crate::opponent::{has_third_party, resolve_opponent};

pub type LifecycleResult<T> = Result<T, WagerError>;

/// The single authorized code path for every wager transition. Each public
/// operation authorizes the caller, resolves the counterpart row where one
/// exists, applies the mutation in one store transaction, and recomputes the
/// wager status from the full participant set.
///
/// Mutations are serialized by the owning `WagerManager`, so no two
/// operations interleave their reads and writes.
pub struct LifecycleController<C: surrealdb::Connection> {
    db: DatabaseConnection<C>,
    notifier: Notifier,
}

impl<C: surrealdb::Connection> LifecycleController<C> {
    pub fn new(db: DatabaseConnection<C>, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    pub async fn propose_wager(
        &mut self,
        creator: &Thing,
        description: String,
        stake: u64,
        due_date: Option<DateTime<Utc>>,
        responders: &[Thing],
    ) -> LifecycleResult<Thing> {
        if stake == 0 {
            return Err(WagerError::Validation("stake must be positive".into()));
        }
        if responders.is_empty() {
            return Err(WagerError::Validation(
                "at least one responder must be invited".into(),
            ));
        }
        for (n, responder) in responders.iter().enumerate() {
            if responder == creator {
                return Err(WagerError::Validation(
                    "the creator cannot invite themselves".into(),
                ));
            }
            if responders[..n].contains(responder) {
                return Err(WagerError::Validation(format!(
                    "duplicate responder: {}",
                    responder.id
                )));
            }
            if self
                .db
                .get_user(&responder.id.to_string())
                .await
                .map_err(store_err)?
                .is_none()
            {
                return Err(WagerError::NotFound(format!(
                    "no such user: {}",
                    responder.id
                )));
            }
        }

        let wager = DbWager::new(description, stake, due_date, creator.clone());
        let participants: Vec<DbParticipant> = responders
            .iter()
            .map(|responder| {
                DbParticipant::new(
                    wager.id.clone(),
                    responder.clone(),
                    ParticipantStatus::Invited,
                )
            })
            .collect();
        self.db
            .create_wager_with_participants(&wager, &participants)
            .await
            .map_err(store_err)?;

        info!(wager = %wager.id, creator = %creator.id, "wager proposed");
        self.notifier.notify(NotificationEvent::WagerProposed {
            wager: wager.id.clone(),
            creator: creator.clone(),
            responders: responders.to_vec(),
        });
        Ok(wager.id)
    }

    pub async fn respond_to_invitation(
        &mut self,
        caller: &Thing,
        participant_id: &Thing,
        accept: bool,
    ) -> LifecycleResult<InvitationResult> {
        let mut participant = self.load_participant(participant_id).await?;
        let mut wager = self.load_wager(&participant.wager).await?;
        guard::ensure_owns_participant(caller, &participant)?;

        if !matches!(wager.status, WagerStatus::Proposed | WagerStatus::Active) {
            return Err(WagerError::InvalidTransition(format!(
                "wager {} is {:?} and no longer accepts responses",
                wager.id.id, wager.status
            )));
        }
        if participant.status != ParticipantStatus::Invited {
            return Err(WagerError::InvalidTransition(format!(
                "participant {} has already responded ({:?})",
                participant.id.id, participant.status
            )));
        }

        participant.status = if accept {
            ParticipantStatus::Active
        } else {
            ParticipantStatus::Declined
        };
        wager.status = self.recomputed_status(&wager, &[&participant]).await?;
        self.db
            .update_participant_and_wager(&participant, &wager)
            .await
            .map_err(store_err)?;

        info!(wager = %wager.id, responder = %caller.id, accept, "invitation answered");
        self.notifier.notify(NotificationEvent::InvitationAnswered {
            wager: wager.id,
            responder: caller.clone(),
            accepted: accept,
        });
        Ok(InvitationResult {
            wager_status: wager.status,
            participant_status: participant.status,
        })
    }

    pub async fn declare_outcome(
        &mut self,
        caller: &Thing,
        participant_id: &Thing,
        outcome: Outcome,
    ) -> LifecycleResult<DeclarationResult> {
        let named = self.load_participant(participant_id).await?;
        let mut wager = self.load_wager(&named.wager).await?;

        // The caller either owns the named row, or is the creator declaring
        // against a responder's row; authorization comes first so an
        // unauthorized probe learns nothing about the wager's state.
        let owns_named = &named.responder == caller;
        if !owns_named {
            guard::ensure_creator(caller, &wager)?;
        }

        if wager.status != WagerStatus::Active {
            return Err(WagerError::InvalidTransition(format!(
                "wager {} is {:?}; outcomes can only be declared while it is Active",
                wager.id.id, wager.status
            )));
        }

        // The creator's own row is bound lazily by the resolver.
        let mut declarer = if owns_named {
            named
        } else {
            resolve_opponent(&self.db, &wager, &named).await?
        };

        if declarer.status != ParticipantStatus::Active {
            return Err(WagerError::InvalidTransition(format!(
                "participant {} cannot declare an outcome from {:?}",
                declarer.id.id, declarer.status
            )));
        }

        let opponent = match resolve_opponent(&self.db, &wager, &declarer).await {
            Ok(row) => Some(row),
            // a wager with one genuine side can still settle a self-declared loss
            Err(WagerError::OpponentNotFound(reason)) if outcome == Outcome::Lost => {
                info!(wager = %wager.id, %reason, "settling lost declaration unilaterally");
                None
            }
            Err(error) => return Err(error),
        };

        if let Some(opponent) = &opponent {
            let participants = self
                .db
                .get_participants_for_wager(&wager.id)
                .await
                .map_err(store_err)?;
            if has_third_party(&participants, &declarer.id, &opponent.id) {
                return Err(WagerError::InvalidTransition(format!(
                    "wager {} has more than two active participants; settlement is bilateral",
                    wager.id.id
                )));
            }
            if opponent.status != ParticipantStatus::Active {
                return Err(WagerError::InvalidTransition(format!(
                    "counterpart {} cannot settle from {:?}",
                    opponent.id.id, opponent.status
                )));
            }
        }

        match outcome {
            Outcome::Lost => {
                declarer.clear_claim(ParticipantStatus::Lost);
                match opponent {
                    Some(mut opponent) => {
                        opponent.clear_claim(ParticipantStatus::Won);
                        wager.status =
                            self.recomputed_status(&wager, &[&declarer, &opponent]).await?;
                        self.db
                            .apply_settlement(&wager, &declarer, &opponent)
                            .await
                            .map_err(store_err)?;
                    }
                    None => {
                        wager.status = self.recomputed_status(&wager, &[&declarer]).await?;
                        self.db
                            .update_participant_and_wager(&declarer, &wager)
                            .await
                            .map_err(store_err)?;
                    }
                }
                let wager_status = wager.status;
                info!(wager = %wager.id, loser = %caller.id, "loss declared, wager completed");
                self.notifier.notify(NotificationEvent::OutcomeClaimed {
                    wager: wager.id,
                    author: caller.clone(),
                    claimed: Outcome::Lost,
                });
                Ok(DeclarationResult {
                    requires_confirmation: false,
                    wager_status,
                })
            }
            Outcome::Won => {
                let Some(mut opponent) = opponent else {
                    return Err(WagerError::OpponentNotFound(format!(
                        "wager {} has no counterpart to confirm a win",
                        wager.id.id
                    )));
                };
                // both claims are written in one transaction, always opposite
                let now = Utc::now();
                declarer.set_claim(outcome, caller.clone(), now);
                opponent.set_claim(outcome.opposite(), caller.clone(), now);
                wager.status = self.recomputed_status(&wager, &[&declarer, &opponent]).await?;
                self.db
                    .apply_settlement(&wager, &declarer, &opponent)
                    .await
                    .map_err(store_err)?;

                let wager_status = wager.status;
                info!(wager = %wager.id, claimant = %caller.id, "win claimed, awaiting confirmation");
                self.notifier.notify(NotificationEvent::OutcomeClaimed {
                    wager: wager.id,
                    author: caller.clone(),
                    claimed: Outcome::Won,
                });
                Ok(DeclarationResult {
                    requires_confirmation: true,
                    wager_status,
                })
            }
        }
    }

    pub async fn confirm_outcome(
        &mut self,
        caller: &Thing,
        participant_id: &Thing,
    ) -> LifecycleResult<ConfirmationResult> {
        let confirmer = self.load_participant(participant_id).await?;
        let mut wager = self.load_wager(&confirmer.wager).await?;
        guard::ensure_owns_participant(caller, &confirmer)?;

        if confirmer.status != ParticipantStatus::OutcomePending {
            return Err(WagerError::InvalidTransition(format!(
                "participant {} has no pending claim to confirm",
                confirmer.id.id
            )));
        }
        guard::ensure_not_claim_author(caller, &confirmer)?;

        let opponent = resolve_opponent(&self.db, &wager, &confirmer).await?;
        let (Some(confirmer_outcome), Some(opponent_outcome)) =
            (confirmer.pending_outcome, opponent.pending_outcome)
        else {
            return Err(WagerError::InvalidTransition(format!(
                "claim on wager {} is missing its counterpart",
                wager.id.id
            )));
        };

        let mut confirmer = confirmer;
        let mut opponent = opponent;
        confirmer.clear_claim(confirmer_outcome.into());
        opponent.clear_claim(opponent_outcome.into());
        wager.status = self.recomputed_status(&wager, &[&confirmer, &opponent]).await?;
        self.db
            .apply_settlement(&wager, &confirmer, &opponent)
            .await
            .map_err(store_err)?;

        let wager_status = wager.status;
        info!(wager = %wager.id, confirmer = %caller.id, "claim confirmed, wager completed");
        self.notifier.notify(NotificationEvent::OutcomeConfirmed {
            wager: wager.id,
            confirmer: caller.clone(),
        });
        Ok(ConfirmationResult {
            wager_status,
            final_outcome: confirmer_outcome,
        })
    }

    pub async fn dispute_outcome(
        &mut self,
        caller: &Thing,
        participant_id: &Thing,
    ) -> LifecycleResult<WagerStatus> {
        let mut disputer = self.load_participant(participant_id).await?;
        let mut wager = self.load_wager(&disputer.wager).await?;
        // either pending party may dispute; the author retracting their own
        // claim is allowed
        guard::ensure_owns_participant(caller, &disputer)?;

        if disputer.status != ParticipantStatus::OutcomePending {
            return Err(WagerError::InvalidTransition(format!(
                "participant {} has no pending claim to dispute",
                disputer.id.id
            )));
        }

        let mut opponent = resolve_opponent(&self.db, &wager, &disputer).await?;
        disputer.clear_claim(ParticipantStatus::Active);
        opponent.clear_claim(ParticipantStatus::Active);
        // both rows drop back to Active; the outcome may be re-declared
        wager.status = self.recomputed_status(&wager, &[&disputer, &opponent]).await?;
        self.db
            .apply_settlement(&wager, &disputer, &opponent)
            .await
            .map_err(store_err)?;

        info!(wager = %wager.id, disputer = %caller.id, "claim disputed");
        self.notifier.notify(NotificationEvent::OutcomeDisputed {
            wager: wager.id,
            disputer: caller.clone(),
        });
        Ok(wager.status)
    }

    pub async fn cancel_wager(
        &mut self,
        caller: &Thing,
        wager_id: &Thing,
    ) -> LifecycleResult<WagerStatus> {
        let wager = self.load_wager(wager_id).await?;
        guard::ensure_creator(caller, &wager)?;

        if !matches!(wager.status, WagerStatus::Proposed | WagerStatus::Active) {
            return Err(WagerError::InvalidTransition(format!(
                "wager {} is {:?} and cannot be cancelled",
                wager.id.id, wager.status
            )));
        }
        let participants = self
            .db
            .get_participants_for_wager(&wager.id)
            .await
            .map_err(store_err)?;
        if participants.iter().any(|row| {
            matches!(
                row.status,
                ParticipantStatus::OutcomePending | ParticipantStatus::Won | ParticipantStatus::Lost
            )
        }) {
            return Err(WagerError::InvalidTransition(format!(
                "wager {} has settlement activity and cannot be cancelled",
                wager.id.id
            )));
        }

        if wager.status == WagerStatus::Proposed
            && participants
                .iter()
                .all(|row| row.status == ParticipantStatus::Invited)
        {
            // nobody has responded; the proposal is withdrawn outright
            self.db
                .delete_wager_with_participants(&wager.id)
                .await
                .map_err(store_err)?;
        } else {
            self.db
                .cancel_wager_rows(&wager.id)
                .await
                .map_err(store_err)?;
        }

        info!(wager = %wager.id, "wager cancelled");
        self.notifier
            .notify(NotificationEvent::WagerCancelled { wager: wager.id });
        Ok(WagerStatus::Cancelled)
    }

    async fn load_participant(&self, participant_id: &Thing) -> LifecycleResult<DbParticipant> {
        self.db
            .get_participant(participant_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| {
                WagerError::NotFound(format!("no such participant: {}", participant_id.id))
            })
    }

    async fn load_wager(&self, wager_id: &Thing) -> LifecycleResult<DbWager> {
        self.db
            .get_wager(wager_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| WagerError::NotFound(format!("no such wager: {}", wager_id.id)))
    }

    /// Derives the wager status with `changed` substituted into the current
    /// participant set. Changed rows the store has not seen yet (a lazily
    /// bound creator row) are counted as well.
    async fn recomputed_status(
        &self,
        wager: &DbWager,
        changed: &[&DbParticipant],
    ) -> LifecycleResult<WagerStatus> {
        let stored = self
            .db
            .get_participants_for_wager(&wager.id)
            .await
            .map_err(store_err)?;
        let mut statuses: Vec<ParticipantStatus> = stored
            .iter()
            .map(|row| {
                changed
                    .iter()
                    .find(|change| change.id == row.id)
                    .map_or(row.status, |change| change.status)
            })
            .collect();
        for change in changed {
            if !stored.iter().any(|row| row.id == change.id) {
                statuses.push(change.status);
            }
        }
        Ok(derive_wager_status(&statuses))
    }
}
