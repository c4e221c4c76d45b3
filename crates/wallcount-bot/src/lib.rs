//! Wallcount bot: polls the gym portal, keeps the observation history, and
//! answers chat commands about how many climbers are on the wall.

pub mod client;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod format;
pub mod scheduler;
pub mod sync;

pub use client::{PageSource, PortalClient};
pub use commands::{ChatCommand, CommandHandler, Notification, Reply};
pub use config::Settings;
pub use error::{BotError, BotResult};
pub use format::describe;
pub use sync::{sync_latest, SyncOutcome};
