/// 國際證券辨識號碼一覽表
pub mod isin;
/// 個股日成交資訊
pub mod stock_day;

const HOST: &str = "twse.com.tw";
