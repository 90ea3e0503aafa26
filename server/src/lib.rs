pub mod aggregation;
pub mod connection_manager;
pub mod database;
pub mod database_manager;
pub mod guard;
pub mod lifecycle;
pub mod notifier;
pub mod opponent;
pub mod wager_manager;
