//! Data models
//!
//! Shared between the loyalty server and the admin UI (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), timestamps are Unix millis.

pub mod history;
pub mod member;

// Re-exports
pub use history::*;
pub use member::*;
