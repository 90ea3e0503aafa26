use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod network;

pub use error::WagerError;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum WagerStatus {
    Proposed,
    Active,
    Declined,
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParticipantStatus {
    Invited,
    Active,
    Declined,
    OutcomePending,
    Won,
    Lost,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Won,
    Lost,
}

impl Outcome {
    pub fn opposite(self) -> Self {
        match self {
            Outcome::Won => Outcome::Lost,
            Outcome::Lost => Outcome::Won,
        }
    }
}

impl From<Outcome> for ParticipantStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Won => ParticipantStatus::Won,
            Outcome::Lost => ParticipantStatus::Lost,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct User {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Wager {
    pub id: String,
    pub description: String,
    pub stake: u64,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub creator: String,
    pub status: WagerStatus,
    pub participants: Vec<Participant>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Participant {
    pub id: String,
    pub responder: String,
    pub status: ParticipantStatus,
    pub pending_outcome: Option<Outcome>,
    pub claim_author: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct InvitationResult {
    pub wager_status: WagerStatus,
    pub participant_status: ParticipantStatus,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct DeclarationResult {
    pub requires_confirmation: bool,
    pub wager_status: WagerStatus,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConfirmationResult {
    pub wager_status: WagerStatus,
    pub final_outcome: Outcome,
}
