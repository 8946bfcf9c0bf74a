//! 歷史股價增量同步。
//!
//! 每檔股票的流程：讀取資料庫中最後一筆日期（watermark）→ 計算抓取起點 →
//! 透過 [`source::HistorySource`] 抓取 → [`cleaner::clean`] 清理 →
//! [`store::UpsertSink`] 寫入。[`batch`] 負責逐檔驅動並隔離單檔失敗。

pub mod batch;
pub mod cleaner;
pub mod engine;
pub mod record;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use batch::BatchReport;
pub use cleaner::{Cleaned, DropCounts};
pub use engine::{NoDataReason, SyncEngine, SyncOutcome};
pub use record::{FetchedBar, Record};
pub use source::{FetchResult, HistorySource, RetryPolicy};
pub use store::{UpsertSink, WatermarkStore};
