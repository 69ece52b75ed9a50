//! Restaurant point-of-sale back office: orders from cart to settlement.
//!
//! The command functions in [`commands`] are the operations; each runs as one
//! SQLite transaction on a shared [`Database`]. [`api`] exposes them over
//! HTTP.

pub mod api;
pub mod assembly;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod models;
pub mod money;


pub use api::AppState;
pub use config::Config;
pub use db::Database;
pub use error::{PosError, PosResult};
pub use money::Money;
