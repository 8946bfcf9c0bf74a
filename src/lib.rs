/// 設定檔
pub mod config;
/// 資料來源
pub mod crawler;
/// 資料庫操作
pub mod database;
/// 日誌
pub mod logging;
/// 增量同步
pub mod sync;
/// 工具
pub mod util;
