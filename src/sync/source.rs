use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::{config, logging, sync::record::FetchedBar};

/// 歷史股價資料源
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// 取得指定股票自 `start_year` 年 `start_month` 月起至今的所有日資料
    async fn fetch(
        &self,
        symbol: &str,
        start_year: i32,
        start_month: u32,
    ) -> Result<Vec<FetchedBar>>;
}

/// 抓取失敗時的重試策略：固定間隔、有限次數
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 總嘗試次數（含第一次）
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&config::SyncOptions> for RetryPolicy {
    fn from(options: &config::SyncOptions) -> Self {
        RetryPolicy {
            attempts: options.retry_attempts.max(1),
            delay: options.retry_delay(),
        }
    }
}

/// 帶重試的抓取結果
#[derive(Debug)]
pub enum FetchResult {
    Fetched(Vec<FetchedBar>),
    /// 資料源正常回應但沒有任何資料
    Empty,
    /// 重試次數用盡，保留最後一次的錯誤
    Failed(anyhow::Error),
}

/// 以 `policy` 重試呼叫 `source.fetch`
///
/// 用盡重試次數時不回傳 `Err`，而是 [`FetchResult::Failed`]，
/// 呼叫端可以與「沒有新資料」區分，同時不會中斷整批同步。
pub async fn fetch_with_retry<S>(
    source: &S,
    symbol: &str,
    start_year: i32,
    start_month: u32,
    policy: &RetryPolicy,
) -> FetchResult
where
    S: HistorySource + ?Sized,
{
    let strategy = FixedInterval::new(policy.delay).take(policy.attempts.saturating_sub(1));
    let mut attempt = 0;
    let retry_future = Retry::spawn(strategy, || {
        attempt += 1;
        let current = attempt;
        async move {
            source
                .fetch(symbol, start_year, start_month)
                .await
                .map_err(|why| {
                    logging::warn_file_async(format!(
                        "{} 第 {} 次抓取失敗: {:?}",
                        symbol, current, why
                    ));
                    why
                })
        }
    });

    match retry_future.await {
        Ok(bars) if bars.is_empty() => FetchResult::Empty,
        Ok(bars) => FetchResult::Fetched(bars),
        Err(why) => {
            logging::error_file_async(format!(
                "{} 沒有抓到資料，已嘗試 {} 次. because {:?}",
                symbol, policy.attempts, why
            ));
            FetchResult::Failed(why)
        }
    }
}
