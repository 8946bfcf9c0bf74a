#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Result};
use stock_history_sync::{
    config::SETTINGS,
    crawler::twse::{
        isin::{self, CodeRegistry},
        stock_day::TwseHistory,
    },
    database::{
        table::{stock_code::SymbolUniverse, stock_price::StockPriceTable},
        PostgresSQL,
    },
    logging,
    sync::{batch, RetryPolicy, SyncEngine},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    logging::info_console("stock_history_sync 啟動".to_string());

    let db = PostgresSQL::new(&SETTINGS.postgresql)?;
    let prices = StockPriceTable::new(db.pool().clone());
    prices.create_table_if_not_exists().await?;

    let registry = match isin::refresh_registry().await {
        Ok(registry) => registry,
        Err(why) => {
            logging::error_file_async(format!(
                "Failed to refresh_registry, stock_codes will not be checked. because {:?}",
                why
            ));
            CodeRegistry::default()
        }
    };

    let symbols = SymbolUniverse::new(db.pool().clone(), registry)
        .symbols()
        .await?;

    let engine = SyncEngine::new(
        TwseHistory::new(),
        prices.clone(),
        prices,
        RetryPolicy::from(&SETTINGS.sync),
    );

    let report = batch::run(
        &engine,
        &symbols,
        SETTINGS.sync.concurrency,
        SETTINGS.sync.pause(),
    )
    .await;

    logging::info_console(format!(
        "同步結束，共 {} 檔，更新 {} 檔 ({} 筆)，無新資料 {} 檔，抓取失敗 {} 檔，寫入失敗 {} 檔",
        report.total(),
        report.updated,
        report.rows,
        report.no_new_data,
        report.fetch_failed,
        report.sink_failed
    ));

    // 等待背景日誌線程寫完
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    Ok(())
}
