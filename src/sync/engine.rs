use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

use crate::{
    logging,
    sync::{
        cleaner::{self, DropCounts},
        source::{self, FetchResult, HistorySource, RetryPolicy},
        store::{UpsertSink, WatermarkStore},
    },
};

/// 沒有任何歷史資料時的起始日
pub const DEFAULT_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(2015, 1, 1) {
    Some(date) => date,
    None => panic!("invalid epoch"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// 資料源沒有回傳任何資料
    EmptyFetch,
    /// 有資料但全部被清理掉
    FilteredOut(DropCounts),
}

/// 單一股票同步一次的結果
#[derive(Debug)]
pub enum SyncOutcome {
    NoNewData(NoDataReason),
    Updated { rows: u64, dropped: DropCounts },
    /// 重試用盡仍抓不到資料，資料庫維持原狀
    FetchFailed(anyhow::Error),
}

/// 讀取最後日期 → 計算起始月份 → 抓取 → 清理 → 寫入
pub struct SyncEngine<S, W, U> {
    source: S,
    watermarks: W,
    sink: U,
    retry: RetryPolicy,
    epoch: NaiveDate,
}

impl<S, W, U> SyncEngine<S, W, U>
where
    S: HistorySource,
    W: WatermarkStore,
    U: UpsertSink,
{
    pub fn new(source: S, watermarks: W, sink: U, retry: RetryPolicy) -> Self {
        SyncEngine {
            source,
            watermarks,
            sink,
            retry,
            epoch: DEFAULT_EPOCH,
        }
    }

    pub fn with_epoch(mut self, epoch: NaiveDate) -> Self {
        self.epoch = epoch;
        self
    }

    /// 同步單一股票
    ///
    /// 抓取失敗以 [`SyncOutcome::FetchFailed`] 回報；
    /// 只有讀取最後日期或寫入資料庫失敗時才回傳 `Err`。
    pub async fn sync(&self, symbol: &str) -> Result<SyncOutcome> {
        let watermark = self
            .watermarks
            .last_date(symbol)
            .await
            .with_context(|| format!("Failed to read the last date of {}", symbol))?;
        let start = fetch_start(watermark, self.epoch);

        logging::debug_file_async(format!(
            "{} 最後日期 {:?}，自 {} 年 {} 月開始抓取",
            symbol,
            watermark,
            start.year(),
            start.month()
        ));

        let bars = match source::fetch_with_retry(
            &self.source,
            symbol,
            start.year(),
            start.month(),
            &self.retry,
        )
        .await
        {
            FetchResult::Fetched(bars) => bars,
            FetchResult::Empty => return Ok(SyncOutcome::NoNewData(NoDataReason::EmptyFetch)),
            FetchResult::Failed(why) => return Ok(SyncOutcome::FetchFailed(why)),
        };

        let cleaned = cleaner::clean(bars, watermark);
        if cleaned.records.is_empty() {
            return Ok(SyncOutcome::NoNewData(NoDataReason::FilteredOut(
                cleaned.dropped,
            )));
        }

        let rows = self
            .sink
            .upsert(&cleaned.records)
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert {} records of {}",
                    cleaned.records.len(),
                    symbol
                )
            })?;

        Ok(SyncOutcome::Updated {
            rows,
            dropped: cleaned.dropped,
        })
    }
}

/// 有最後日期時從隔天開始，否則從 `epoch` 開始
pub fn fetch_start(watermark: Option<NaiveDate>, epoch: NaiveDate) -> NaiveDate {
    match watermark {
        Some(last) => last.succ_opt().unwrap_or(last),
        None => epoch,
    }
}
