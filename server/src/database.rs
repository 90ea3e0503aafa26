use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::sql::statements::{BeginStatement, CommitStatement};
use surrealdb::sql::{Datetime, Id, Thing};
use surrealdb::{Connection, Result, Surreal};

use common::{Outcome, ParticipantStatus, WagerError, WagerStatus};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Record {
    #[allow(dead_code)]
    pub id: Thing,
}

pub fn user_key(name: impl Into<String>) -> Thing {
    Thing {
        tb: "user".into(),
        id: Id::String(name.into()),
    }
}

pub fn wager_key(id: impl Into<String>) -> Thing {
    Thing {
        tb: "wager".into(),
        id: Id::String(id.into()),
    }
}

pub fn participant_key(id: impl Into<String>) -> Thing {
    Thing {
        tb: "participant".into(),
        id: Id::String(id.into()),
    }
}

/// Maps a store failure into the retryable arm of the error taxonomy.
pub fn store_err(error: surrealdb::Error) -> WagerError {
    WagerError::TransientStore(error.to_string())
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbUser {
    pub id: Thing,
    pub name: String,
}

impl DbUser {
    pub fn new(name: impl Into<String> + Clone) -> Self {
        Self {
            id: user_key(name.clone()),
            name: name.into(),
        }
    }
}

impl Into<common::User> for DbUser {
    fn into(self) -> common::User {
        common::User { name: self.name }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbWager {
    pub id: Thing,
    pub description: String,
    pub stake: u64,
    pub due_date: Option<Datetime>,
    pub created_at: Datetime,
    pub creator: Thing,
    pub status: WagerStatus,
}

impl DbWager {
    pub fn new(
        description: impl Into<String>,
        stake: u64,
        due_date: Option<DateTime<Utc>>,
        creator: Thing,
    ) -> Self {
        Self {
            id: Thing {
                tb: "wager".into(),
                id: Id::rand(),
            },
            description: description.into(),
            stake,
            due_date: due_date.map(Into::into),
            created_at: Utc::now().into(),
            creator,
            status: WagerStatus::Proposed,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbParticipant {
    pub id: Thing,
    pub wager: Thing,
    pub responder: Thing,
    pub status: ParticipantStatus,
    pub pending_outcome: Option<Outcome>,
    pub claim_author: Option<Thing>,
    pub claimed_at: Option<Datetime>,
}

impl DbParticipant {
    pub fn new(wager: Thing, responder: Thing, status: ParticipantStatus) -> Self {
        Self {
            id: Thing {
                tb: "participant".into(),
                id: Id::rand(),
            },
            wager,
            responder,
            status,
            pending_outcome: None,
            claim_author: None,
            claimed_at: None,
        }
    }

    /// Records an unconfirmed outcome claim. The counterpart row gets the
    /// opposite claim via the same call in the same transaction.
    pub fn set_claim(&mut self, pending: Outcome, author: Thing, at: DateTime<Utc>) {
        self.status = ParticipantStatus::OutcomePending;
        self.pending_outcome = Some(pending);
        self.claim_author = Some(author);
        self.claimed_at = Some(at.into());
    }

    /// Leaves OutcomePending for `status`, emptying every claim field.
    pub fn clear_claim(&mut self, status: ParticipantStatus) {
        self.status = status;
        self.pending_outcome = None;
        self.claim_author = None;
        self.claimed_at = None;
    }
}

fn assemble_view(wager: DbWager, participants: Vec<DbParticipant>) -> common::Wager {
    common::Wager {
        id: wager.id.id.to_string(),
        description: wager.description,
        stake: wager.stake,
        due_date: wager.due_date.map(|d| d.0),
        created_at: wager.created_at.0,
        creator: wager.creator.id.to_string(),
        status: wager.status,
        participants: participants
            .into_iter()
            .map(|participant| common::Participant {
                id: participant.id.id.to_string(),
                responder: participant.responder.id.to_string(),
                status: participant.status,
                pending_outcome: participant.pending_outcome,
                claim_author: participant.claim_author.map(|author| author.id.to_string()),
                claimed_at: participant.claimed_at.map(|d| d.0),
            })
            .collect(),
    }
}

pub struct DatabaseConnection<C: Connection> {
    connection: Surreal<C>,
}

impl<C: Connection> Clone for DatabaseConnection<C> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
        }
    }
}

impl DatabaseConnection<Client> {
    pub async fn connect(address: &str) -> Result<Self> {
        let db = Surreal::new::<Ws>(address).await?;

        db.signin(Root {
            username: "root",
            password: "root",
        })
        .await?;

        db.use_ns("wager").use_db("wager_service").await?;

        Ok(Self { connection: db })
    }
}

impl DatabaseConnection<Db> {
    pub async fn connect_mem() -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("wager").use_db("wager_service").await?;
        Ok(Self { connection: db })
    }
}

impl<C: Connection> DatabaseConnection<C> {
    pub async fn add_user(&mut self, user: &DbUser) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create(("user", &user.name))
            .content(user)
            .await?;

        Ok(())
    }

    pub async fn get_user(&self, name: &str) -> Result<Option<DbUser>> {
        self.connection.select(("user", name)).await
    }

    /// Creates the wager row and every invited participant row in one
    /// transaction; a partially created wager is never observable.
    pub async fn create_wager_with_participants(
        &mut self,
        wager: &DbWager,
        participants: &[DbParticipant],
    ) -> Result<()> {
        let mut chain = self
            .connection
            .query(BeginStatement)
            .query("CREATE $wager_id CONTENT $wager_content;")
            .bind(("wager_id", &wager.id))
            .bind(("wager_content", wager));
        for (n, participant) in participants.iter().enumerate() {
            chain = chain
                .query(format!("CREATE $participant_id_{n} CONTENT $participant_content_{n};").as_str())
                .bind((format!("participant_id_{n}"), &participant.id))
                .bind((format!("participant_content_{n}"), participant));
        }
        chain.query(CommitStatement).await?;
        Ok(())
    }

    pub async fn get_wager(&self, wager_id: &Thing) -> Result<Option<DbWager>> {
        self.connection.select(wager_id).await
    }

    pub async fn get_participant(&self, participant_id: &Thing) -> Result<Option<DbParticipant>> {
        self.connection.select(participant_id).await
    }

    pub async fn get_participants_for_wager(&self, wager_id: &Thing) -> Result<Vec<DbParticipant>> {
        self.connection
            .query("SELECT * FROM participant WHERE wager = $wager_id ORDER BY id;")
            .bind(("wager_id", wager_id))
            .await?
            .take(0)
    }

    pub async fn find_participant(
        &self,
        wager_id: &Thing,
        responder: &Thing,
    ) -> Result<Option<DbParticipant>> {
        let mut response = self
            .connection
            .query("SELECT * FROM participant WHERE wager = $wager_id AND responder = $responder_id;")
            .bind(("wager_id", wager_id))
            .bind(("responder_id", responder))
            .await?;
        let mut rows: Vec<DbParticipant> = response.take(0)?;
        Ok(rows.pop())
    }

    /// Writes both sides of a settlement plus the wager status in one
    /// transaction. Participant updates are issued in ascending id order so
    /// every racing writer takes the rows in the same order. UPDATE on a
    /// record id creates the record when it does not exist yet, which is how
    /// a lazily bound creator row is first written.
    pub async fn apply_settlement(
        &mut self,
        wager: &DbWager,
        first: &DbParticipant,
        second: &DbParticipant,
    ) -> Result<()> {
        let (a, b) = if first.id <= second.id {
            (first, second)
        } else {
            (second, first)
        };
        self.connection
            .query(BeginStatement)
            .query("UPDATE $a_id CONTENT $a_content;")
            .bind(("a_id", &a.id))
            .bind(("a_content", a))
            .query("UPDATE $b_id CONTENT $b_content;")
            .bind(("b_id", &b.id))
            .bind(("b_content", b))
            .query("UPDATE $target_id SET status = $target_status;")
            .bind(("target_id", &wager.id))
            .bind(("target_status", &wager.status))
            .query(CommitStatement)
            .await?;
        Ok(())
    }

    pub async fn update_participant_and_wager(
        &mut self,
        participant: &DbParticipant,
        wager: &DbWager,
    ) -> Result<()> {
        self.connection
            .query(BeginStatement)
            .query("UPDATE $participant_id CONTENT $participant_content;")
            .bind(("participant_id", &participant.id))
            .bind(("participant_content", participant))
            .query("UPDATE $target_id SET status = $target_status;")
            .bind(("target_id", &wager.id))
            .bind(("target_status", &wager.status))
            .query(CommitStatement)
            .await?;
        Ok(())
    }

    pub async fn cancel_wager_rows(&mut self, wager_id: &Thing) -> Result<()> {
        self.connection
            .query(BeginStatement)
            .query("UPDATE $wager_id SET status = $wager_cancelled;")
            .query("UPDATE participant SET status = $participant_cancelled, pending_outcome = NONE, claim_author = NONE, claimed_at = NONE WHERE wager = $wager_id;")
            .bind(("wager_id", wager_id))
            .bind(("wager_cancelled", WagerStatus::Cancelled))
            .bind(("participant_cancelled", ParticipantStatus::Cancelled))
            .query(CommitStatement)
            .await?;
        Ok(())
    }

    /// Hard deletion; only valid for a Proposed wager nobody has answered.
    pub async fn delete_wager_with_participants(&mut self, wager_id: &Thing) -> Result<()> {
        self.connection
            .query(BeginStatement)
            .query("DELETE participant WHERE wager = $wager_id;")
            .query("DELETE $wager_id;")
            .bind(("wager_id", wager_id))
            .query(CommitStatement)
            .await?;
        Ok(())
    }

    pub async fn get_wager_view(&self, wager_id: &Thing) -> Result<Option<common::Wager>> {
        let Some(wager) = self.get_wager(wager_id).await? else {
            return Ok(None);
        };
        let participants = self.get_participants_for_wager(wager_id).await?;
        Ok(Some(assemble_view(wager, participants)))
    }

    pub async fn get_all_wager_views(&self) -> Result<Vec<common::Wager>> {
        let wagers: Vec<DbWager> = self.connection.select("wager").await?;
        let mut views = Vec::with_capacity(wagers.len());
        for wager in wagers {
            let participants = self.get_participants_for_wager(&wager.id).await?;
            views.push(assemble_view(wager, participants));
        }
        Ok(views)
    }
}
