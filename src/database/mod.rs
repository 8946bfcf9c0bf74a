use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config;

pub mod table;

/// PostgreSQL 連線池封裝
///
/// 由程式進入點建立一次，再把 [`PostgresSQL::pool`] 的複本交給各資料表使用。
#[derive(Clone)]
pub struct PostgresSQL {
    pool: PgPool,
}

impl PostgresSQL {
    /// 建立連線池，實際連線在第一次使用時才建立
    pub fn new(settings: &config::PostgreSQL) -> Result<PostgresSQL> {
        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}?application_name=stock_history_sync",
            settings.user, settings.password, settings.host, settings.port, settings.db
        );
        let pool = PgPoolOptions::new()
            .max_lifetime(Some(Duration::from_secs(1800))) // 30 分鐘
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600))) // 10 分鐘
            .connect_lazy(&database_url)
            .with_context(|| {
                format!(
                    "wrong database URL postgres://{}@{}:{}/{}",
                    settings.user, settings.host, settings.port, settings.db
                )
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
