use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::JwtService;
use crate::core::{Config, Result, ServerError};
use crate::db::DbService;
use crate::loyalty::LoyaltyService;

/// Server state - shared handles for every request
///
/// Cheap to clone: the pool and services are reference counted.
///
/// | Field | Type | Notes |
/// |-------|------|-------|
/// | config | Config | immutable |
/// | pool | SqlitePool | embedded SQLite |
/// | loyalty | LoyaltyService | punch-card engine |
/// | jwt_service | Arc<JwtService> | staff token validation |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub loyalty: LoyaltyService,
    pub jwt_service: Arc<JwtService>,
}

impl ServerState {
    pub fn new(config: Config, db: DbService) -> Self {
        let loyalty = LoyaltyService::new(
            db.pool.clone(),
            config.overflow_policy,
            config.store_retry,
            config.business_timezone,
        );
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        Self {
            config,
            pool: db.pool,
            loyalty,
            jwt_service,
        }
    }

    /// Prepare the work directory and open the database file
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            ServerError::Config(format!("Cannot create work dir {}: {e}", config.work_dir))
        })?;
        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServerError::Config(format!("Cannot create database dir: {e}"))
            })?;
        }

        let db = DbService::new(&config.database_path)
            .await
            .map_err(|e| ServerError::Database(e.message))?;

        tracing::info!(
            policy = %config.overflow_policy,
            timezone = %config.business_timezone,
            "Loyalty engine ready"
        );
        Ok(Self::new(config.clone(), db))
    }

    /// State over a private in-memory database
    pub async fn in_memory(config: Config) -> Result<Self> {
        let db = DbService::in_memory()
            .await
            .map_err(|e| ServerError::Database(e.message))?;
        Ok(Self::new(config, db))
    }
}
