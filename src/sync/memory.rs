//! 測試用的記憶體資料源與資料庫

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use hashbrown::HashMap;

use crate::sync::{
    record::{FetchedBar, Record},
    source::HistorySource,
    store::{UpsertSink, WatermarkStore},
};

#[derive(Default)]
struct FeedState {
    bars: HashMap<String, Vec<FetchedBar>>,
    failures: HashMap<String, usize>,
    requests: Vec<(String, i32, u32)>,
}

/// 依股號回傳預先設定好的資料，可指定前幾次請求失敗
#[derive(Default)]
pub struct MemoryFeed {
    state: Mutex<FeedState>,
    calls: AtomicUsize,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<FetchedBar>) {
        self.state.lock().unwrap().bars.insert(symbol.to_string(), bars);
    }

    pub fn fail_next(&self, symbol: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(symbol.to_string(), times);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次請求的 (股號, 起始年, 起始月)
    pub fn requests(&self) -> Vec<(String, i32, u32)> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl HistorySource for MemoryFeed {
    async fn fetch(
        &self,
        symbol: &str,
        start_year: i32,
        start_month: u32,
    ) -> Result<Vec<FetchedBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state
            .requests
            .push((symbol.to_string(), start_year, start_month));

        if let Some(remaining) = state.failures.get_mut(symbol) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!("simulated transient fault for {}", symbol));
            }
        }

        let from = NaiveDate::from_ymd_opt(start_year, start_month, 1)
            .ok_or_else(|| anyhow!("invalid month {}-{}", start_year, start_month))?;

        Ok(state
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.date.is_none_or(|date| date >= from))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// 以 (股號, 日期) 為唯一鍵的記憶體資料表
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<BTreeMap<(String, NaiveDate), Record>>>,
    fail_upsert: Arc<Mutex<bool>>,
    fail_watermark: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, records: Vec<Record>) {
        let mut rows = self.rows.lock().unwrap();
        for record in records {
            rows.insert((record.symbol.clone(), record.date), record);
        }
    }

    pub fn fail_upsert(&self, fail: bool) {
        *self.fail_upsert.lock().unwrap() = fail;
    }

    pub fn fail_watermark(&self, fail: bool) {
        *self.fail_watermark.lock().unwrap() = fail;
    }

    pub fn count(&self, symbol: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(s, _)| s == symbol)
            .count()
    }

    pub fn get(&self, symbol: &str, date: NaiveDate) -> Option<Record> {
        self.rows
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), date))
            .cloned()
    }

    /// 依股號、日期排序的全部資料
    pub fn rows(&self) -> Vec<Record> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn last_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        if *self.fail_watermark.lock().unwrap() {
            return Err(anyhow!("simulated database outage"));
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, date)| *date)
            .max())
    }
}

#[async_trait]
impl UpsertSink for MemoryStore {
    async fn upsert(&self, records: &[Record]) -> Result<u64> {
        if *self.fail_upsert.lock().unwrap() {
            return Err(anyhow!("simulated write failure"));
        }

        let mut rows = self.rows.lock().unwrap();
        for record in records {
            rows.insert((record.symbol.clone(), record.date), record.clone());
        }

        Ok(records.len() as u64)
    }
}
