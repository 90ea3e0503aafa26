use anyhow::{anyhow, bail};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use common::network::{Connection, Packet, Request, Response};
use common::WagerError;

use crate::database::{participant_key, user_key, wager_key};
use crate::database_manager::DatabaseRequest;
use crate::wager_manager::WagerRequest;

/// Accepts clients on an already bound listener. The caller binds so the
/// chosen port is known before the accept loop starts.
pub async fn handle_listen_server(
    listener: TcpListener,
    db_tx: mpsc::Sender<DatabaseRequest>,
    wager_tx: mpsc::Sender<WagerRequest>,
) -> anyhow::Result<()> {
    info!(listen_address = %listener.local_addr()?, "listening");

    loop {
        let (connection, peer) = listener.accept().await?;
        let tx = db_tx.clone();
        let wage_tx = wager_tx.clone();

        tokio::spawn(async move {
            let connection = match Connection::from_tcp_stream(connection).await {
                Ok(connection) => connection,
                Err(cause) => {
                    warn!(%peer, %cause, "websocket handshake failed");
                    return;
                }
            };
            handle_connection(connection, tx, wage_tx).await;
        });
    }
}

async fn handle_connection(
    mut connection: Connection,
    mut db_tx: mpsc::Sender<DatabaseRequest>,
    wager_tx: mpsc::Sender<WagerRequest>,
) {
    let user = handle_login(&mut connection, &mut db_tx).await;
    if let Ok(username) = user {
        if let Err(cause) = handle_client(username, &mut connection, db_tx, wager_tx).await {
            error!(%cause, "client session ended abnormally");
            let _ = connection.send(Packet::Error).await;
        }
    } else {
        let _ = connection.send(Packet::Error).await;
    }
}

async fn handle_login(
    connection: &mut Connection,
    db_tx: &mut mpsc::Sender<DatabaseRequest>,
) -> anyhow::Result<String> {
    let packet = connection.read().await?;
    if let Packet::RequestPacket(request) = packet {
        match request {
            Request::Login { user } => {
                let (resp_tx, resp_rx) = oneshot::channel();

                let req = DatabaseRequest::GetUser {
                    name: user.clone(),
                    responder: resp_tx,
                };
                db_tx.send(req).await?;
                let response = resp_rx.await?;
                let user = response?.ok_or(std::io::Error::new(
                    ErrorKind::NotFound,
                    "no such user found",
                ))?;
                connection
                    .send(Packet::ResponsePacket(Response::SuccessfulLogin {
                        username: user.name.clone(),
                    }))
                    .await?;
                Ok(user.name)
            }
            _ => {
                bail!("bad login");
            }
        }
    } else {
        bail!("Invalid request at login: {:?}", packet);
    }
}

/// Maps one lifecycle result onto the wire. Classifiable failures go back as
/// `Response::Failed` with their error code; `Packet::Error` is reserved for
/// protocol-level breakage.
async fn reply<T>(
    connection: &mut Connection,
    result: Result<T, WagerError>,
    ok: impl FnOnce(T) -> Response,
) -> anyhow::Result<()> {
    match result {
        Ok(value) => connection.send(Packet::ResponsePacket(ok(value))).await,
        Err(error) => {
            connection
                .send(Packet::ResponsePacket(Response::Failed(error)))
                .await
        }
    }
}

async fn handle_client(
    username: String,
    connection: &mut Connection,
    db_tx: mpsc::Sender<DatabaseRequest>,
    wager_tx: mpsc::Sender<WagerRequest>,
) -> anyhow::Result<()> {
    let caller = user_key(username.clone());
    loop {
        let packet = connection.read().await;
        if let Ok(Packet::RequestPacket(request)) = packet {
            match request {
                Request::Login { user: _ } => {
                    warn!(%username, "duplicate login detected");
                    connection.send(Packet::Error).await?;
                    bail!("Attempted re-login - denied");
                }
                Request::WhoAmI => {
                    connection
                        .send(Packet::ResponsePacket(Response::WhoAmI(username.clone())))
                        .await?;
                }
                Request::WagerData => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    db_tx
                        .send(DatabaseRequest::GetAllWagerInfo { responder: resp_tx })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, Response::WagerData).await?;
                }
                Request::WagerDetail { wager_id } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    db_tx
                        .send(DatabaseRequest::GetWagerInfo {
                            id: wager_key(wager_id),
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, Response::WagerDetail).await?;
                }
                Request::ProposeWager {
                    description,
                    stake,
                    due_date,
                    responders,
                } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::ProposeWager {
                            creator: caller.clone(),
                            description,
                            stake,
                            due_date,
                            responders: responders.into_iter().map(user_key).collect(),
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, |wager_id| Response::WagerProposed {
                        wager_id: wager_id.id.to_string(),
                    })
                    .await?;
                }
                Request::RespondToInvitation {
                    participant_id,
                    accept,
                } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::RespondToInvitation {
                            caller: caller.clone(),
                            participant: participant_key(participant_id),
                            accept,
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, Response::InvitationAnswered).await?;
                }
                Request::DeclareOutcome {
                    participant_id,
                    outcome,
                } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::DeclareOutcome {
                            caller: caller.clone(),
                            participant: participant_key(participant_id),
                            outcome,
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, Response::OutcomeDeclared).await?;
                }
                Request::ConfirmOutcome { participant_id } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::ConfirmOutcome {
                            caller: caller.clone(),
                            participant: participant_key(participant_id),
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, Response::OutcomeConfirmed).await?;
                }
                Request::DisputeOutcome { participant_id } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::DisputeOutcome {
                            caller: caller.clone(),
                            participant: participant_key(participant_id),
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, |wager_status| Response::OutcomeDisputed {
                        wager_status,
                    })
                    .await?;
                }
                Request::CancelWager { wager_id } => {
                    let (resp_tx, resp_rx) = oneshot::channel();
                    wager_tx
                        .send(WagerRequest::CancelWager {
                            caller: caller.clone(),
                            wager: wager_key(wager_id),
                            responder: resp_tx,
                        })
                        .await?;
                    let result = resp_rx.await?;
                    reply(connection, result, |wager_status| Response::WagerCancelled {
                        wager_status,
                    })
                    .await?;
                }
            }
        } else {
            return match packet {
                Ok(pack) => bail!("incorrect packet type: {:?}", pack),
                Err(error) => {
                    match &error
                        .downcast_ref::<std::io::Error>()
                        .ok_or(anyhow!("not an std error"))?
                        .kind()
                    {
                        ErrorKind::ConnectionAborted => Ok(()), //connection aborted is considered successful,
                        _ => Err(error)?,
                    }
                }
            };
        }
    }
}
