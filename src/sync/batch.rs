use std::time::Duration;

use anyhow::Result;
use futures::{stream, StreamExt};
use hashbrown::HashSet;

use crate::{
    logging,
    sync::{
        cleaner::DropCounts,
        engine::{NoDataReason, SyncEngine, SyncOutcome},
        source::HistorySource,
        store::{UpsertSink, WatermarkStore},
    },
};

/// 整批同步的統計
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// 有寫入資料的股票數
    pub updated: usize,
    /// 寫入的總筆數
    pub rows: u64,
    pub no_new_data: usize,
    pub fetch_failed: usize,
    /// 讀取最後日期或寫入資料庫失敗的股票數
    pub sink_failed: usize,
    pub dropped: DropCounts,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.updated + self.no_new_data + self.fetch_failed + self.sink_failed
    }

    fn record(&mut self, symbol: &str, outcome: Result<SyncOutcome>) {
        match outcome {
            Ok(SyncOutcome::Updated { rows, dropped }) => {
                self.updated += 1;
                self.rows += rows;
                self.dropped += dropped;
                logging::info_file_async(format!(
                    "{} 更新完成，新增/更新 {} 筆資料，剔除 {} 筆",
                    symbol,
                    rows,
                    dropped.total()
                ));
            }
            Ok(SyncOutcome::NoNewData(reason)) => {
                self.no_new_data += 1;
                match reason {
                    NoDataReason::EmptyFetch => {
                        logging::info_file_async(format!("{} 沒有新的資料", symbol));
                    }
                    NoDataReason::FilteredOut(dropped) => {
                        self.dropped += dropped;
                        logging::info_file_async(format!(
                            "{} 沒有新的資料，清理後剔除 {} 筆 {:?}",
                            symbol,
                            dropped.total(),
                            dropped
                        ));
                    }
                }
            }
            Ok(SyncOutcome::FetchFailed(why)) => {
                self.fetch_failed += 1;
                logging::error_file_async(format!(
                    "{} 抓取失敗，維持原有資料. because {:?}",
                    symbol, why
                ));
            }
            Err(why) => {
                self.sink_failed += 1;
                logging::error_file_async(format!("Failed to sync {} because {:?}", symbol, why));
            }
        }
    }
}

/// 依序同步所有股票
///
/// 重複的股號只會同步一次，同一檔股票不會同時有兩個同步在進行；
/// 單一股票失敗只記錄在報告中，不影響其他股票。`concurrency` 為同時進行的股票數，
/// 每檔股票完成後暫停 `pause` 再交出位置。
pub async fn run<S, W, U>(
    engine: &SyncEngine<S, W, U>,
    symbols: &[String],
    concurrency: usize,
    pause: Duration,
) -> BatchReport
where
    S: HistorySource,
    W: WatermarkStore,
    U: UpsertSink,
{
    let unique = unique_symbols(symbols);
    let last = unique.len().saturating_sub(1);

    logging::info_file_async(format!(
        "開始同步 {} 檔股票，同時進行 {} 檔",
        unique.len(),
        concurrency.max(1)
    ));

    let report = stream::iter(unique.into_iter().enumerate())
        .map(|(index, symbol)| async move {
            let outcome = engine.sync(symbol).await;
            if index < last && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            (symbol, outcome)
        })
        .buffered(concurrency.max(1))
        .fold(BatchReport::default(), |mut report, (symbol, outcome)| async move {
            report.record(symbol, outcome);
            report
        })
        .await;

    logging::info_file_async(format!(
        "同步結束，更新 {} 檔共 {} 筆，無新資料 {} 檔，抓取失敗 {} 檔，寫入失敗 {} 檔",
        report.updated, report.rows, report.no_new_data, report.fetch_failed, report.sink_failed
    ));

    report
}

/// 去除重複的股號並保留原本順序
fn unique_symbols(symbols: &[String]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols
        .iter()
        .map(|symbol| symbol.trim())
        .filter(|symbol| !symbol.is_empty() && seen.insert(*symbol))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::sync::{
        memory::{MemoryFeed, MemoryStore},
        record::FetchedBar,
        source::RetryPolicy,
    };

    fn bar(symbol: &str, day: u32) -> FetchedBar {
        FetchedBar {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2015, 1, day),
            open: Some(50.0),
            high: Some(51.0),
            low: Some(49.0),
            close: Some(50.5),
            capacity: Some(1_000),
            turnover: Some(50_500),
            change: Some(0.5),
            transaction: Some(3),
        }
    }

    fn symbols(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|code| code.to_string()).collect()
    }

    fn engine(
        feed: MemoryFeed,
        store: &MemoryStore,
    ) -> SyncEngine<MemoryFeed, MemoryStore, MemoryStore> {
        let retry = RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(1),
        };
        SyncEngine::new(feed, store.clone(), store.clone(), retry)
    }

    #[test]
    fn test_unique_symbols_keeps_order() {
        let codes = symbols(&["2330", "1101", "2330", " ", "2317 ", "1101"]);
        assert_eq!(unique_symbols(&codes), vec!["2330", "1101", "2317"]);
    }

    #[tokio::test]
    async fn test_failure_of_one_symbol_does_not_stop_batch() {
        let feed = MemoryFeed::new();
        feed.set_bars("2330", vec![bar("2330", 5), bar("2330", 6)]);
        feed.set_bars("1101", vec![bar("1101", 5)]);
        feed.fail_next("1101", 10);
        feed.set_bars("2317", vec![bar("2317", 5)]);
        let store = MemoryStore::new();
        let engine = engine(feed, &store);

        let report = run(
            &engine,
            &symbols(&["2330", "1101", "2317", "0050"]),
            1,
            Duration::ZERO,
        )
        .await;

        assert_eq!(report.updated, 2);
        assert_eq!(report.rows, 3);
        assert_eq!(report.fetch_failed, 1);
        assert_eq!(report.no_new_data, 1);
        assert_eq!(report.total(), 4);
        assert_eq!(store.count("2317"), 1);
        assert_eq!(store.count("1101"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_symbols_sync_once() {
        let feed = MemoryFeed::new();
        feed.set_bars("2330", vec![bar("2330", 5)]);
        let store = MemoryStore::new();
        let engine = engine(feed, &store);

        let report = run(&engine, &symbols(&["2330", "2330", "2330"]), 3, Duration::ZERO).await;

        assert_eq!(report.total(), 1);
        assert_eq!(report.updated, 1);
    }

    #[tokio::test]
    async fn test_sink_failures_are_counted() {
        let feed = MemoryFeed::new();
        feed.set_bars("2330", vec![bar("2330", 5)]);
        feed.set_bars("2317", vec![bar("2317", 5)]);
        let store = MemoryStore::new();
        store.fail_upsert(true);
        let engine = engine(feed, &store);

        let report = run(&engine, &symbols(&["2330", "2317"]), 2, Duration::ZERO).await;

        assert_eq!(report.sink_failed, 2);
        assert_eq!(report.rows, 0);
    }

    #[tokio::test]
    async fn test_pause_between_symbols() {
        let store = MemoryStore::new();
        let engine = engine(MemoryFeed::new(), &store);

        let start = std::time::Instant::now();
        run(
            &engine,
            &symbols(&["2330", "2317", "1101"]),
            1,
            Duration::from_millis(30),
        )
        .await;

        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
