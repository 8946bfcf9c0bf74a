/// 上市股票代號
pub mod stock_code;
/// 個股歷史日成交資訊
pub mod stock_price;
