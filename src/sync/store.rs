use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::sync::record::Record;

/// 查詢每檔股票已寫入的最後日期
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// 沒有任何資料時回傳 `None`
    async fn last_date(&self, symbol: &str) -> Result<Option<NaiveDate>>;
}

/// 以 (股號, 日期) 為鍵寫入或覆蓋股價
#[async_trait]
pub trait UpsertSink: Send + Sync {
    /// 整批寫入必須在同一個交易內完成，失敗時不得留下部分資料。
    /// 回傳受影響的筆數。
    async fn upsert(&self, records: &[Record]) -> Result<u64>;
}
