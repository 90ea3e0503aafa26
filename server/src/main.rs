use anyhow::Result;
use tokio::join;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::connection_manager::handle_listen_server;
use server::database::{DatabaseConnection, DbUser};
use server::database_manager::DatabaseManager;
use server::lifecycle::LifecycleController;
use server::notifier::{NotificationDispatcher, Notifier};
use server::wager_manager::WagerManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_address = std::env::var("DB_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".into());
    let listen_address =
        std::env::var("LISTEN_ADDRESS").unwrap_or_else(|_| "127.0.0.1:6379".into());

    let mut database = DatabaseConnection::connect(&db_address).await?;
    info!(%db_address, "connected to database");

    if let Ok(seed_users) = std::env::var("SEED_USERS") {
        for name in seed_users.split(',').filter(|name| !name.is_empty()) {
            // do not care about failure, as the user could already have been created
            let _ = database.add_user(&DbUser::new(name)).await;
        }
    }

    let (event_tx, event_rx) = mpsc::channel(64);
    let notifier = Notifier::new(event_tx);
    let mut dispatcher = NotificationDispatcher::new(event_rx);
    let notify_task = tokio::spawn(async move {
        dispatcher.dispatch().await;
    });

    let (db_tx, db_rx) = mpsc::channel(32);
    let mut db_manager = DatabaseManager::new(database.clone(), db_rx);
    let db_task = tokio::spawn(async move {
        db_manager.manage().await;
    });

    let (wager_tx, wager_rx) = mpsc::channel(32);
    let controller = LifecycleController::new(database, notifier);
    let mut wager_manager = WagerManager::new(wager_rx, controller);
    let wager_task = tokio::spawn(async move {
        wager_manager.manage().await;
    });

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    let listen_task =
        tokio::spawn(async move { handle_listen_server(listener, db_tx, wager_tx).await });

    let (res1, res2, res3, res4) = join!(db_task, wager_task, listen_task, notify_task);
    res1?;
    res2?;
    res3??;
    res4?;
    Ok(())
}
