//! Loyalty Server - punch-card loyalty engine for a single store
//!
//! # Modules
//!
//! ```text
//! loyalty-server/src/
//! ├── core/      # config, state, server, startup errors
//! ├── auth/      # staff JWT validation
//! ├── api/       # HTTP routes and handlers
//! ├── loyalty/   # punch arithmetic, ledger, reconciliation, stats
//! ├── db/        # SQLite pool and repositories
//! └── utils/     # errors, logging, time, validation
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod loyalty;
pub mod utils;

pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use loyalty::{LoyaltyService, OverflowPolicy};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
  +-----------------------------+
  |  o o o o o o o o o  [FREE]  |
  |      Loyalty Server         |
  +-----------------------------+
    "#
    );
}
