use surrealdb::sql::Thing;
use tracing::debug;

use common::{ParticipantStatus, WagerError};

use crate::database::{store_err, DatabaseConnection, DbParticipant, DbWager};

fn is_live(status: ParticipantStatus) -> bool {
    matches!(
        status,
        ParticipantStatus::Active | ParticipantStatus::OutcomePending
    )
}

/// Locates the counterpart row that must be updated in lock-step with
/// `participant` during settlement.
///
/// The creator's side of a wager is materialised lazily: if a responder's
/// counterpart row does not exist yet, a fresh Active row is returned
/// unwritten. It reaches the store only through the settlement transaction
/// that commits the operation, so a rejected operation leaves no trace.
pub async fn resolve_opponent<C: surrealdb::Connection>(
    db: &DatabaseConnection<C>,
    wager: &DbWager,
    participant: &DbParticipant,
) -> Result<DbParticipant, WagerError> {
    if participant.responder == wager.creator {
        let participants = db
            .get_participants_for_wager(&wager.id)
            .await
            .map_err(store_err)?;
        participants
            .into_iter()
            .filter(|row| row.responder != wager.creator && is_live(row.status))
            .min_by(|a, b| a.id.cmp(&b.id))
            .ok_or_else(|| {
                WagerError::OpponentNotFound(format!(
                    "wager {} has no active counterpart for the creator",
                    wager.id.id
                ))
            })
    } else {
        match db
            .find_participant(&wager.id, &wager.creator)
            .await
            .map_err(store_err)?
        {
            Some(row) => Ok(row),
            None => {
                debug!(wager = %wager.id, "creator participant row not materialised yet");
                Ok(creator_row(wager))
            }
        }
    }
}

fn creator_row(wager: &DbWager) -> DbParticipant {
    DbParticipant::new(
        wager.id.clone(),
        wager.creator.clone(),
        ParticipantStatus::Active,
    )
}

/// True when some third row besides `a` and `b` is still in play; settlement
/// is strictly bilateral.
pub fn has_third_party(participants: &[DbParticipant], a: &Thing, b: &Thing) -> bool {
    participants
        .iter()
        .any(|row| row.id != *a && row.id != *b && is_live(row.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::user_key;
    use surrealdb::engine::local::Db;

    async fn store_with(
        responders: &[(&str, ParticipantStatus)],
    ) -> (DatabaseConnection<Db>, DbWager) {
        let mut db = DatabaseConnection::connect_mem().await.unwrap();
        let wager = DbWager::new("test", 1, None, user_key("alice"));
        let rows: Vec<DbParticipant> = responders
            .iter()
            .map(|(name, status)| DbParticipant::new(wager.id.clone(), user_key(*name), *status))
            .collect();
        db.create_wager_with_participants(&wager, &rows)
            .await
            .unwrap();
        (db, wager)
    }

    fn creators_side(wager: &DbWager) -> DbParticipant {
        DbParticipant::new(
            wager.id.clone(),
            wager.creator.clone(),
            ParticipantStatus::Active,
        )
    }

    #[tokio::test]
    async fn declined_rows_are_never_picked_as_the_counterpart() {
        let (db, wager) = store_with(&[
            ("bob", ParticipantStatus::Declined),
            ("carol", ParticipantStatus::Active),
        ])
        .await;

        let opponent = resolve_opponent(&db, &wager, &creators_side(&wager))
            .await
            .unwrap();
        assert_eq!(opponent.responder, user_key("carol"));
    }

    #[tokio::test]
    async fn the_lowest_id_live_row_is_picked_deterministically() {
        let (db, wager) = store_with(&[
            ("bob", ParticipantStatus::Active),
            ("carol", ParticipantStatus::Active),
        ])
        .await;

        let rows = db.get_participants_for_wager(&wager.id).await.unwrap();
        let expected = rows.iter().min_by(|a, b| a.id.cmp(&b.id)).unwrap();

        let opponent = resolve_opponent(&db, &wager, &creators_side(&wager))
            .await
            .unwrap();
        assert_eq!(opponent.id, expected.id);
        // repeated resolution picks the same row
        let again = resolve_opponent(&db, &wager, &creators_side(&wager))
            .await
            .unwrap();
        assert_eq!(again.id, expected.id);
    }

    #[tokio::test]
    async fn a_missing_creator_row_is_returned_without_being_written() {
        let (db, wager) = store_with(&[("bob", ParticipantStatus::Active)]).await;
        let bob = db
            .find_participant(&wager.id, &user_key("bob"))
            .await
            .unwrap()
            .unwrap();

        let opponent = resolve_opponent(&db, &wager, &bob).await.unwrap();
        assert_eq!(opponent.responder, wager.creator);
        assert_eq!(opponent.status, ParticipantStatus::Active);
        // resolution alone persists nothing
        assert!(db
            .find_participant(&wager.id, &wager.creator)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn no_live_counterpart_is_an_error() {
        let (db, wager) = store_with(&[("bob", ParticipantStatus::Declined)]).await;

        let result = resolve_opponent(&db, &wager, &creators_side(&wager)).await;
        assert!(matches!(result, Err(WagerError::OpponentNotFound(_))));
    }
}
