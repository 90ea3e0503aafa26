use anyhow::bail;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{
    ConfirmationResult, DeclarationResult, InvitationResult, Outcome, WagerError, WagerStatus,
};

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub enum Request {
    Login { user: String }, // SuccessfulLogin response
    WhoAmI,
    WagerData,
    WagerDetail { wager_id: String },
    ProposeWager { description: String, stake: u64, due_date: Option<DateTime<Utc>>, responders: Vec<String> },
    RespondToInvitation { participant_id: String, accept: bool },
    DeclareOutcome { participant_id: String, outcome: Outcome },
    ConfirmOutcome { participant_id: String },
    DisputeOutcome { participant_id: String },
    CancelWager { wager_id: String },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Response {
    None,
    SuccessfulLogin { username: String },
    WhoAmI(String),
    WagerData(Vec<crate::Wager>),
    WagerDetail(Option<crate::Wager>),
    WagerProposed { wager_id: String },
    InvitationAnswered(InvitationResult),
    OutcomeDeclared(DeclarationResult),
    OutcomeConfirmed(ConfirmationResult),
    OutcomeDisputed { wager_status: WagerStatus },
    WagerCancelled { wager_status: WagerStatus },
    Failed(WagerError),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Packet {
    RequestPacket(Request),
    ResponsePacket(Response),
    Error,
}

pub struct Connection {
    socket: WebSocketStream<TcpStream>,
}

impl Connection {
    pub async fn from_tcp_stream(connection: TcpStream) -> anyhow::Result<Self> {
        let socket = tokio_tungstenite::accept_async(connection).await?;
        Ok(Self { socket })
    }

    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (socket, _) = tokio_tungstenite::client_async(format!("ws://{address}"), stream).await?;
        Ok(Self { socket })
    }

    pub async fn read(&mut self) -> anyhow::Result<Packet> {
        let message = self
            .socket
            .next()
            .await
            .ok_or(anyhow::anyhow!("connection closed"))??;
        match message {
            Message::Binary(data) => Ok(rmp_serde::from_slice(&data)?),
            _ => {
                bail!("incorrect data type received")
            }
        }
    }

    pub async fn send(&mut self, data: Packet) -> anyhow::Result<()> {
        let buf = rmp_serde::to_vec(&data)?;
        Ok(self.socket.send(Message::Binary(buf)).await?)
    }
}
