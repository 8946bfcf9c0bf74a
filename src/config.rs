use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    pub postgresql: PostgreSQL,
    #[serde(default)]
    pub sync: SyncOptions,
}

const POSTGRESQL_HOST: &str = "POSTGRESQL_HOST";
const POSTGRESQL_PORT: &str = "POSTGRESQL_PORT";
const POSTGRESQL_USER: &str = "POSTGRESQL_USER";
const POSTGRESQL_PASSWORD: &str = "POSTGRESQL_PASSWORD";
const POSTGRESQL_DB: &str = "POSTGRESQL_DB";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct PostgreSQL {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: String,
}

const SYNC_CONCURRENCY: &str = "SYNC_CONCURRENCY";
const SYNC_PAUSE_MILLIS: &str = "SYNC_PAUSE_MILLIS";
const SYNC_RETRY_ATTEMPTS: &str = "SYNC_RETRY_ATTEMPTS";
const SYNC_RETRY_DELAY_MILLIS: &str = "SYNC_RETRY_DELAY_MILLIS";

/// 歷史股價同步的執行參數
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SyncOptions {
    /// 同時進行同步的股票數量，1 代表逐檔處理
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 每檔股票同步完後的暫停時間 (毫秒)
    #[serde(default = "default_pause_millis")]
    pub pause_millis: u64,
    /// 抓取歷史資料的最多嘗試次數
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    /// 每次重試之間的間隔 (毫秒)
    #[serde(default = "default_retry_delay_millis")]
    pub retry_delay_millis: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_pause_millis() -> u64 {
    3000
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_millis() -> u64 {
    2000
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            concurrency: default_concurrency(),
            pause_millis: default_pause_millis(),
            retry_attempts: default_retry_attempts(),
            retry_delay_millis: default_retry_delay_millis(),
        }
    }
}

impl SyncOptions {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| App::get().expect("Config error"));

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        App::from_env()
    }

    /// 從 env 中讀取設定值
    fn from_env() -> Result<Self> {
        let app = App {
            postgresql: PostgreSQL {
                host: env::var(POSTGRESQL_HOST).context(POSTGRESQL_HOST)?,
                port: i32::from_str(
                    &env::var(POSTGRESQL_PORT).unwrap_or_else(|_| "5432".to_string()),
                )
                .unwrap_or(5432),
                user: env::var(POSTGRESQL_USER).context(POSTGRESQL_USER)?,
                password: env::var(POSTGRESQL_PASSWORD).context(POSTGRESQL_PASSWORD)?,
                db: env::var(POSTGRESQL_DB).context(POSTGRESQL_DB)?,
            },
            sync: Default::default(),
        };

        Ok(app.override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(host) = env::var(POSTGRESQL_HOST) {
            self.postgresql.host = host;
        }

        if let Ok(port) = env::var(POSTGRESQL_PORT) {
            self.postgresql.port = i32::from_str(&port).unwrap_or(5432);
        }

        if let Ok(user) = env::var(POSTGRESQL_USER) {
            self.postgresql.user = user;
        }

        if let Ok(password) = env::var(POSTGRESQL_PASSWORD) {
            self.postgresql.password = password;
        }

        if let Ok(db) = env::var(POSTGRESQL_DB) {
            self.postgresql.db = db;
        }

        if let Some(concurrency) = parse_env::<usize>(SYNC_CONCURRENCY) {
            self.sync.concurrency = concurrency.max(1);
        }

        if let Some(pause) = parse_env::<u64>(SYNC_PAUSE_MILLIS) {
            self.sync.pause_millis = pause;
        }

        if let Some(attempts) = parse_env::<usize>(SYNC_RETRY_ATTEMPTS) {
            self.sync.retry_attempts = attempts.max(1);
        }

        if let Some(delay) = parse_env::<u64>(SYNC_RETRY_DELAY_MILLIS) {
            self.sync.retry_delay_millis = delay;
        }

        self
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let sync = SyncOptions::default();
        assert_eq!(sync.concurrency, 1);
        assert_eq!(sync.pause(), Duration::from_secs(3));
        assert_eq!(sync.retry_attempts, 3);
        assert_eq!(sync.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_deserialize_without_sync_section() {
        let json = r#"{"postgresql":{"host":"localhost","port":5432,"user":"u","password":"p","db":"stock"}}"#;
        let app = serde_json::from_str::<App>(json).unwrap();
        assert_eq!(app.postgresql.db, "stock");
        assert_eq!(app.sync.retry_attempts, 3);
        assert_eq!(app.sync.pause_millis, 3000);
    }

    #[test]
    fn test_deserialize_partial_sync_section() {
        let json = r#"{"postgresql":{},"sync":{"concurrency":4,"retry_delay_millis":10}}"#;
        let app = serde_json::from_str::<App>(json).unwrap();
        assert_eq!(app.sync.concurrency, 4);
        assert_eq!(app.sync.retry_delay(), Duration::from_millis(10));
        assert_eq!(app.sync.retry_attempts, 3);
        assert_eq!(app.postgresql.port, 0);
    }
}
