use chrono::NaiveDate;
use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};

/// 資料表中價格欄位的小數位數 (NUMERIC(10,2))
const PRICE_SCALE: u32 = 2;

/// NUMERIC(10,2) 整數部分最多 8 位，絕對值需小於 1 億
const PRICE_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// 從資料源取回、尚未清理的單日股價
///
/// 除了股票代號以外的欄位都可能缺值；價格與漲跌維持資料源提供的浮點數，
/// 因此 `inf`、`NaN` 也可能出現，由 [`crate::sync::cleaner`] 負責排除。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedBar {
    pub symbol: String,
    pub date: Option<NaiveDate>,
    /// 開盤價
    pub open: Option<f64>,
    /// 最高價
    pub high: Option<f64>,
    /// 最低價
    pub low: Option<f64>,
    /// 收盤價
    pub close: Option<f64>,
    /// 成交股數
    pub capacity: Option<i64>,
    /// 成交金額
    pub turnover: Option<i64>,
    /// 漲跌價差
    pub change: Option<f64>,
    /// 成交筆數
    pub transaction: Option<i64>,
}

impl FetchedBar {
    pub fn new(symbol: String) -> Self {
        FetchedBar {
            symbol,
            ..Default::default()
        }
    }

    /// 開高低收皆為零，代表當日停牌或無交易
    pub fn is_zero_price(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|price| *price == Some(0.0))
    }

    /// 將非有限值與超出價格欄位精度的數值改為缺值
    pub fn sanitized(mut self) -> Self {
        for price in [
            &mut self.open,
            &mut self.high,
            &mut self.low,
            &mut self.close,
            &mut self.change,
        ] {
            *price = price.filter(|v| to_price(*v).is_some());
        }

        for volume in [&mut self.capacity, &mut self.turnover, &mut self.transaction] {
            *volume = volume.filter(|v| *v >= 0);
        }

        self
    }

    /// 任一數值欄位缺值
    pub fn has_undefined_value(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.change]
            .iter()
            .any(Option::is_none)
            || [self.capacity, self.turnover, self.transaction]
                .iter()
                .any(Option::is_none)
    }

    /// 轉成可寫入資料庫的 [`Record`]，鍵值 (股號、日期) 或任一欄位缺值時回傳 `None`
    pub fn into_record(self) -> Option<Record> {
        if self.symbol.trim().is_empty() {
            return None;
        }

        Some(Record {
            date: self.date?,
            open: self.open.and_then(to_price)?,
            high: self.high.and_then(to_price)?,
            low: self.low.and_then(to_price)?,
            close: self.close.and_then(to_price)?,
            capacity: self.capacity?,
            turnover: self.turnover?,
            change: self.change.and_then(to_price)?,
            transaction: self.transaction?,
            symbol: self.symbol,
        })
    }
}

/// 寫入 `stock_prices` 的單日股價，(symbol, date) 為唯一鍵
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Record {
    #[sqlx(rename = "stock_no")]
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub capacity: i64,
    pub turnover: i64,
    pub change: Decimal,
    pub transaction: i64,
}

/// 浮點價格轉為兩位小數，非有限值或超出 NUMERIC(10,2) 時回傳 `None`
fn to_price(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }

    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero))
        .filter(|d| d.abs() < PRICE_LIMIT)
}
