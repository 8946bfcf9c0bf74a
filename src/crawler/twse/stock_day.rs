use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use concat_string::concat_string;
use serde::Deserialize;

use crate::{
    crawler::twse,
    logging,
    sync::{FetchedBar, HistorySource},
    util::{datetime, http, text},
};

/// 漲跌欄位前綴的 X 表示除權息
const EX_RIGHTS_MARKER: char = 'X';

#[derive(Deserialize, Debug, Default)]
struct StockDayResponse {
    pub stat: Option<String>,
    pub data: Option<Vec<Vec<String>>>,
}

/// 上市個股日成交資訊 (STOCK_DAY)，一次請求回傳一個月份
#[derive(Debug, Default, Clone, Copy)]
pub struct TwseHistory;

impl TwseHistory {
    pub fn new() -> Self {
        TwseHistory
    }

    async fn visit_month(&self, symbol: &str, month: NaiveDate) -> Result<Vec<FetchedBar>> {
        let url = concat_string!(
            "https://www.",
            twse::HOST,
            "/exchangeReport/STOCK_DAY?response=json&date=",
            month.format("%Y%m01").to_string(),
            "&stockNo=",
            symbol
        );

        let res = http::get_json::<StockDayResponse>(&url).await?;
        if res.stat.as_deref() != Some("OK") {
            logging::debug_file_async(format!(
                "{} {} 沒有資料 stat:{:?}",
                symbol,
                month.format("%Y-%m"),
                res.stat
            ));
            return Ok(Vec::new());
        }

        Ok(res
            .data
            .unwrap_or_default()
            .iter()
            .map(|row| parse_row(symbol, row))
            .collect())
    }
}

#[async_trait]
impl HistorySource for TwseHistory {
    async fn fetch(
        &self,
        symbol: &str,
        start_year: i32,
        start_month: u32,
    ) -> Result<Vec<FetchedBar>> {
        let months = datetime::months_until(start_year, start_month, Local::now().date_naive());
        let mut bars = Vec::with_capacity(months.len() * 23);

        for month in months {
            bars.extend(self.visit_month(symbol, month).await?);
        }

        Ok(bars)
    }
}

/// 解析一列 `[日期, 成交股數, 成交金額, 開盤價, 最高價, 最低價, 收盤價, 漲跌價差, 成交筆數]`
///
/// 欄位不足或無法解析的值以缺值表示，交由清理步驟處理。
fn parse_row(symbol: &str, row: &[String]) -> FetchedBar {
    let field = |index: usize| row.get(index).map(String::as_str).unwrap_or("--");

    FetchedBar {
        symbol: symbol.to_string(),
        date: datetime::parse_taiwan_date(field(0)),
        capacity: text::parse_optional_i64(field(1), None),
        turnover: text::parse_optional_i64(field(2), None),
        open: text::parse_optional_f64(field(3), None),
        high: text::parse_optional_f64(field(4), None),
        low: text::parse_optional_f64(field(5), None),
        close: text::parse_optional_f64(field(6), None),
        change: text::parse_optional_f64(field(7), Some(vec![EX_RIGHTS_MARKER])),
        transaction: text::parse_optional_i64(field(8), None),
    }
}
