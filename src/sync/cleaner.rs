use std::ops::{Add, AddAssign};

use chrono::NaiveDate;
use hashbrown::HashSet;

use crate::sync::record::{FetchedBar, Record};

/// 各清理步驟剔除的筆數
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounts {
    /// 日期未晚於資料庫最後日期
    pub stale: usize,
    /// 開高低收皆為零
    pub zero_price: usize,
    /// 含有無限大或缺值的欄位
    pub dirty: usize,
    /// 缺少股號或日期
    pub incomplete: usize,
    /// 同股號同日期的重複資料
    pub duplicate: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.stale + self.zero_price + self.dirty + self.incomplete + self.duplicate
    }
}

impl Add for DropCounts {
    type Output = DropCounts;

    fn add(self, rhs: Self) -> Self::Output {
        DropCounts {
            stale: self.stale + rhs.stale,
            zero_price: self.zero_price + rhs.zero_price,
            dirty: self.dirty + rhs.dirty,
            incomplete: self.incomplete + rhs.incomplete,
            duplicate: self.duplicate + rhs.duplicate,
        }
    }
}

impl AddAssign for DropCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Cleaned {
    pub records: Vec<Record>,
    pub dropped: DropCounts,
}

/// 清理抓回來的資料，步驟順序固定：
///
/// 1. 只保留日期晚於 `watermark` 的資料
/// 2. 移除開高低收皆為零（停牌日）
/// 3. 無限大改為缺值後，移除含缺值的資料
/// 4. 移除股號或日期為空的資料
/// 5. 同股號同日期只保留第一筆
///
/// 輸出維持輸入順序。
pub fn clean(bars: Vec<FetchedBar>, watermark: Option<NaiveDate>) -> Cleaned {
    let mut dropped = DropCounts::default();

    let fresh: Vec<FetchedBar> = bars
        .into_iter()
        .filter(|bar| {
            let keep = match watermark {
                Some(last) => bar.date.is_some_and(|date| date > last),
                None => true,
            };
            if !keep {
                dropped.stale += 1;
            }
            keep
        })
        .collect();

    let trading: Vec<FetchedBar> = fresh
        .into_iter()
        .filter(|bar| {
            let zero = bar.is_zero_price();
            if zero {
                dropped.zero_price += 1;
            }
            !zero
        })
        .collect();

    let sanitized: Vec<FetchedBar> = trading
        .into_iter()
        .map(FetchedBar::sanitized)
        .filter(|bar| {
            let dirty = bar.has_undefined_value();
            if dirty {
                dropped.dirty += 1;
            }
            !dirty
        })
        .collect();

    let complete: Vec<Record> = sanitized
        .into_iter()
        .filter_map(|bar| {
            let record = bar.into_record();
            if record.is_none() {
                dropped.incomplete += 1;
            }
            record
        })
        .collect();

    let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(complete.len());
    let records: Vec<Record> = complete
        .into_iter()
        .filter(|record| {
            let first = seen.insert((record.symbol.clone(), record.date));
            if !first {
                dropped.duplicate += 1;
            }
            first
        })
        .collect();

    Cleaned { records, dropped }
}
