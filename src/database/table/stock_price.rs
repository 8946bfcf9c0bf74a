use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::sync::{Record, UpsertSink, WatermarkStore};

/// 單一 INSERT 的最大筆數，每筆 10 個參數，需低於 PostgreSQL 的 65535 個參數上限
const UPSERT_CHUNK_SIZE: usize = 1000;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stock_prices (
    id BIGSERIAL PRIMARY KEY,
    stock_no VARCHAR(10) NOT NULL,
    "date" DATE NOT NULL,
    open NUMERIC(10, 2),
    high NUMERIC(10, 2),
    low NUMERIC(10, 2),
    close NUMERIC(10, 2),
    capacity BIGINT,
    turnover BIGINT,
    "change" NUMERIC(10, 2),
    "transaction" BIGINT,
    UNIQUE (stock_no, "date")
)"#;

const INSERT_INTO: &str = r#"INSERT INTO stock_prices (stock_no, "date", open, high, low, close, capacity, turnover, "change", "transaction") "#;

const ON_CONFLICT: &str = r#"
ON CONFLICT (stock_no, "date") DO UPDATE SET
    open = EXCLUDED.open,
    high = EXCLUDED.high,
    low = EXCLUDED.low,
    close = EXCLUDED.close,
    capacity = EXCLUDED.capacity,
    turnover = EXCLUDED.turnover,
    "change" = EXCLUDED."change",
    "transaction" = EXCLUDED."transaction""#;

/// 個股歷史日成交資訊 (`stock_prices`)
#[derive(Clone)]
pub struct StockPriceTable {
    pool: PgPool,
}

impl StockPriceTable {
    pub fn new(pool: PgPool) -> Self {
        StockPriceTable { pool }
    }

    pub async fn create_table_if_not_exists(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .context("Failed to create table stock_prices")?;

        Ok(())
    }

    /// 取得指定股票全部的資料，依日期排序
    #[cfg(test)]
    async fn fetch_by_symbol(&self, symbol: &str) -> Result<Vec<Record>> {
        let sql = r#"
SELECT stock_no, "date", open, high, low, close, capacity, turnover, "change", "transaction"
FROM stock_prices
WHERE stock_no = $1
ORDER BY "date""#;

        sqlx::query_as::<_, Record>(sql)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch_by_symbol({}) from database", symbol))
    }

    fn build_upsert(records: &[Record]) -> QueryBuilder<'_, Postgres> {
        let mut builder = QueryBuilder::new(INSERT_INTO);
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.symbol.as_str())
                .push_bind(record.date)
                .push_bind(record.open)
                .push_bind(record.high)
                .push_bind(record.low)
                .push_bind(record.close)
                .push_bind(record.capacity)
                .push_bind(record.turnover)
                .push_bind(record.change)
                .push_bind(record.transaction);
        });
        builder.push(ON_CONFLICT);
        builder
    }
}

#[async_trait]
impl WatermarkStore for StockPriceTable {
    async fn last_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        sqlx::query_scalar::<_, Option<NaiveDate>>(
            r#"SELECT MAX("date") FROM stock_prices WHERE stock_no = $1"#,
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to last_date({}) from database", symbol))
    }
}

#[async_trait]
impl UpsertSink for StockPriceTable {
    /// 所有筆數分段寫入但在同一個交易內，任一段失敗即整批還原
    async fn upsert(&self, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for chunk in records.chunks(UPSERT_CHUNK_SIZE) {
            let result = Self::build_upsert(chunk).build().execute(&mut *tx).await;
            match result {
                Ok(r) => affected += r.rows_affected(),
                Err(why) => {
                    tx.rollback().await?;
                    return Err(why).context(format!(
                        "Failed to upsert {} records into stock_prices",
                        records.len()
                    ));
                }
            }
        }

        tx.commit().await?;

        Ok(affected)
    }
}
