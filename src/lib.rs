pub mod args;
pub mod auth;
pub mod bot;
pub mod catalog;
pub mod config;
pub mod format;
pub mod inspector;
pub mod logging;
pub mod messengers;
pub mod router;
pub mod runner;

// Re-export the types most callers need at crate root for convenience
pub use config::Config;
pub use inspector::{Inspector, Section};
pub use messengers::{Messenger, MessengerEvent, TelegramMessenger};
pub use router::{Reply, Router};
