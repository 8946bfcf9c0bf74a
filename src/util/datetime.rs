use chrono::{Datelike, NaiveDate};

/// Convert ROC year to Gregorian year.
pub fn to_gregorian_year(year: i32) -> i32 {
    year + 1911
}

/// Parse a date string in the format of ROC calendar (`104/01/05`)
/// and return it as a NaiveDate in the Gregorian calendar.
pub fn parse_taiwan_date(date_str: &str) -> Option<NaiveDate> {
    let split_date: Vec<&str> = date_str.trim().split(['/', '-']).collect();
    if split_date.len() != 3 {
        return None;
    }

    let year = to_gregorian_year(parse_date_part::<i32>(split_date[0])?);
    let month = parse_date_part::<u32>(split_date[1])?;
    let day = parse_date_part::<u32>(split_date[2])?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Try to parse a string as a date part and return it as an Option.
fn parse_date_part<T: std::str::FromStr>(date_part_str: &str) -> Option<T> {
    date_part_str.trim().parse::<T>().ok()
}

/// 回傳從 `(year, month)` 起到 `until` 所在月份（含）的每個月份的第一天
///
/// 起始月份晚於 `until` 或月份不合法時回傳空集合。
pub fn months_until(year: i32, month: u32, until: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let Some(mut cursor) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return months;
    };

    let last = NaiveDate::from_ymd_opt(until.year(), until.month(), 1).unwrap_or(until);
    while cursor <= last {
        months.push(cursor);
        cursor = match cursor.checked_add_months(chrono::Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    months
}
