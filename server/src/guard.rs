use surrealdb::sql::Thing;

use common::WagerError;

use crate::database::{DbParticipant, DbWager};

/// Authorization checks for the lifecycle operations. Each check runs inside
/// the transaction that performs the mutation, against freshly read rows.
pub fn ensure_owns_participant(
    caller: &Thing,
    participant: &DbParticipant,
) -> Result<(), WagerError> {
    if &participant.responder == caller {
        Ok(())
    } else {
        Err(WagerError::Authorization(format!(
            "{} is not the responder of participant {}",
            caller.id, participant.id.id
        )))
    }
}

pub fn ensure_creator(caller: &Thing, wager: &DbWager) -> Result<(), WagerError> {
    if &wager.creator == caller {
        Ok(())
    } else {
        Err(WagerError::Authorization(format!(
            "{} is not the creator of wager {}",
            caller.id, wager.id.id
        )))
    }
}

/// Only the counterparty may confirm a claim; the author agreeing with
/// themselves settles nothing.
pub fn ensure_not_claim_author(
    caller: &Thing,
    participant: &DbParticipant,
) -> Result<(), WagerError> {
    match &participant.claim_author {
        Some(author) if author == caller => Err(WagerError::Authorization(format!(
            "{} authored the pending claim on wager {} and cannot confirm it",
            caller.id, participant.wager.id
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{user_key, DbParticipant, DbWager};
    use common::{Outcome, ParticipantStatus};

    fn wager_by(creator: &str) -> DbWager {
        DbWager::new("test", 1, None, user_key(creator))
    }

    #[test]
    fn ownership_is_checked_against_the_responder() {
        let wager = wager_by("alice");
        let row = DbParticipant::new(wager.id, user_key("bob"), ParticipantStatus::Invited);
        assert!(ensure_owns_participant(&user_key("bob"), &row).is_ok());
        assert!(matches!(
            ensure_owns_participant(&user_key("mallory"), &row),
            Err(WagerError::Authorization(_))
        ));
    }

    #[test]
    fn only_the_creator_passes_the_creator_check() {
        let wager = wager_by("alice");
        assert!(ensure_creator(&user_key("alice"), &wager).is_ok());
        assert!(matches!(
            ensure_creator(&user_key("bob"), &wager),
            Err(WagerError::Authorization(_))
        ));
    }

    #[test]
    fn the_claim_author_may_not_confirm() {
        let wager = wager_by("alice");
        let mut row = DbParticipant::new(wager.id, user_key("bob"), ParticipantStatus::Active);
        row.set_claim(Outcome::Won, user_key("bob"), chrono::Utc::now());
        assert!(matches!(
            ensure_not_claim_author(&user_key("bob"), &row),
            Err(WagerError::Authorization(_))
        ));
        assert!(ensure_not_claim_author(&user_key("alice"), &row).is_ok());
    }
}
