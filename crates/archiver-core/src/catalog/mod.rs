//! Persistent archive/download catalog (SQLite via sqlx).
//!
//! Stores archives (one per Internet Archive item key) and the downloads
//! discovered under each. Reconciliation and the CLI talk to it through the
//! [`DownloadStore`] trait; archive CRUD is inherent on [`CatalogDb`].

mod archives;
pub mod db;
mod downloads;
pub mod store;
pub mod types;

pub use db::CatalogDb;
pub use store::DownloadStore;
pub use types::*;

#[cfg(test)]
mod tests;
