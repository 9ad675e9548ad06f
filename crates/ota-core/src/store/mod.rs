//! Persisted update record (SQLite via sqlx).
//!
//! Keeps the last-seen device identity, the newest update found by a check,
//! the user's notification settings and a history of finished downloads.

mod db;
mod history;
mod record;
mod types;


pub use db::UpdateStore;
pub use types::DownloadRecord;
