use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::{crawler::twse::isin::CodeRegistry, logging};

/// 需要同步的股票代號 (`stock_codes`)
pub struct SymbolUniverse {
    pool: PgPool,
    registry: CodeRegistry,
}

impl SymbolUniverse {
    /// `registry` 為啟動時重新下載的上市代號清單，只用來檢查 `stock_codes` 的內容
    pub fn new(pool: PgPool, registry: CodeRegistry) -> Self {
        SymbolUniverse { pool, registry }
    }

    /// `stock_codes` 中的全部代號，依代號排序
    pub async fn symbols(&self) -> Result<Vec<String>> {
        let codes =
            sqlx::query_scalar::<_, String>("SELECT stock_no FROM stock_codes ORDER BY stock_no")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list stock_codes from database")?;

        self.report_unknown(&codes);

        Ok(codes)
    }

    /// 不在上市清單中的代號，清單為空時不檢查
    fn unknown_codes<'a>(&self, codes: &'a [String]) -> Vec<&'a str> {
        if self.registry.is_empty() {
            return Vec::new();
        }

        codes
            .iter()
            .map(String::as_str)
            .filter(|code| !self.registry.contains(code))
            .collect()
    }

    fn report_unknown(&self, codes: &[String]) {
        let unknown = self.unknown_codes(codes);
        if !unknown.is_empty() {
            logging::warn_file_async(format!(
                "{} 檔股票不在上市清單中，仍會同步: {:?}",
                unknown.len(),
                unknown
            ));
        }
    }
}
