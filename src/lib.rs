pub mod assign;
pub mod calls;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod reclaim;

pub use db::Database;
pub use error::{CrmError, Result};
