use surrealdb::sql::Thing;
use surrealdb::Connection;
use tokio::sync::{mpsc, oneshot};

use common::WagerError;

use crate::database::{store_err, DatabaseConnection, DbUser};

pub type Responder<T> = oneshot::Sender<Result<T, WagerError>>;

/// Read-side requests; mutations go through the `WagerManager`.
pub enum DatabaseRequest {
    GetUser {
        name: String,
        responder: Responder<Option<DbUser>>,
    },
    GetAllWagerInfo {
        responder: Responder<Vec<common::Wager>>,
    },
    GetWagerInfo {
        id: Thing,
        responder: Responder<Option<common::Wager>>,
    },
}

pub struct DatabaseManager<Conn: Connection> {
    db_connection: DatabaseConnection<Conn>,
    work_queue: mpsc::Receiver<DatabaseRequest>,
}

impl<Conn: Connection> DatabaseManager<Conn> {
    pub fn new(
        db_connection: DatabaseConnection<Conn>,
        work_queue: mpsc::Receiver<DatabaseRequest>,
    ) -> Self {
        Self {
            db_connection,
            work_queue,
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            match request {
                DatabaseRequest::GetUser { name, responder } => {
                    let resp = self.db_connection.get_user(&name).await.map_err(store_err);
                    let _ = responder.send(resp);
                }
                DatabaseRequest::GetAllWagerInfo { responder } => {
                    let resp = self
                        .db_connection
                        .get_all_wager_views()
                        .await
                        .map_err(store_err);
                    let _ = responder.send(resp);
                }
                DatabaseRequest::GetWagerInfo { id, responder } => {
                    let resp = self
                        .db_connection
                        .get_wager_view(&id)
                        .await
                        .map_err(store_err);
                    let _ = responder.send(resp);
                }
            }
        }
    }
}
