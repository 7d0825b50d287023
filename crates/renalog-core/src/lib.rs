//! renalog-core - Core library for Renalog
//!
//! This crate contains the offline-first data layer shared by every Renalog
//! interface: the embedded store and its repositories, the sync queue and
//! replay engine, local authentication, and the reminder scheduling seam.

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod sync;
pub mod util;

pub use db::Database;
pub use error::{Error, Result};
pub use models::RecordId;
