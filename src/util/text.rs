use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};

const NUMBER_ESCAPE_CHAR: &[char] = &['元', '%', ',', ' ', '"', '\n'];

/// 證交所以 `--` 表示當日無此數值
const MISSING_VALUE: &str = "--";

/// Converts a Big5 encoded byte slice to a UTF-8 `String`.
///
/// Malformed sequences are replaced instead of failing the whole page.
pub fn big5_2_utf8(data: &[u8]) -> Result<String> {
    let (text, _, had_errors) = encoding_rs::BIG5.decode(data);
    if had_errors && text.is_empty() {
        return Err(anyhow!("Failed to BIG5.decode {} bytes", data.len()));
    }

    Ok(text.into_owned())
}

/// Parses an `i64` value from a given string, e.g. `"28,131,977"`.
pub fn parse_i64(s: &str, escape_chars: Option<Vec<char>>) -> Result<i64> {
    let cleaned = clean_escape_chars(s, escape_chars);
    i64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as i64 because: {:?}", cleaned, why))
}

/// Parses an `f64` value from a given string, e.g. `"+1,234.50"`.
///
/// `inf` and `NaN` are accepted as-is; filtering them is up to the caller.
pub fn parse_f64(s: &str, escape_chars: Option<Vec<char>>) -> Result<f64> {
    let cleaned = clean_escape_chars(s, escape_chars);
    f64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as f64 because: {:?}", cleaned, why))
}

/// 解析證交所的數值欄位，`--` 或無法解析時回傳 `None`
pub fn parse_optional_f64(s: &str, escape_chars: Option<Vec<char>>) -> Option<f64> {
    if s.trim() == MISSING_VALUE {
        return None;
    }

    parse_f64(s, escape_chars).ok()
}

/// 同 [`parse_optional_f64`]，用於股數、金額、筆數等整數欄位
pub fn parse_optional_i64(s: &str, escape_chars: Option<Vec<char>>) -> Option<i64> {
    if s.trim() == MISSING_VALUE {
        return None;
    }

    parse_i64(s, escape_chars).ok()
}

/// Removes `NUMBER_ESCAPE_CHAR` and the optional `escape_chars` from `s`.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    // 注意這個慣用法：在 tests 模組中，從外部範疇匯入所有名字。
    use super::*;

    #[test]
    fn test_big5_2_utf8() {
        // "台積電" in Big5
        let bytes = [0xA5, 0x78, 0xBF, 0x6E, 0xB9, 0x71];
        assert_eq!(big5_2_utf8(&bytes).unwrap(), "台積電");
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_i64("28,131,977", None).unwrap(), 28_131_977);
        assert_eq!(parse_f64("+0.40", None).unwrap(), 0.4);
        assert_eq!(parse_f64("X0.00", Some(vec!['X'])).unwrap(), 0.0);
        assert!(parse_i64("abc", None).is_err());
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional_f64("--", None), None);
        assert_eq!(parse_optional_f64(" -- ", None), None);
        assert_eq!(parse_optional_f64("-1.50", None), Some(-1.5));
        assert_eq!(parse_optional_i64("--", None), None);
        assert_eq!(parse_optional_i64("12,278", None), Some(12_278));
        assert!(parse_optional_f64("inf", None).is_some_and(f64::is_infinite));
    }

    #[test]
    fn test_clean_escape_chars() {
        let result = clean_escape_chars("台積電% 元 ,", Some(vec!['元', '%', '%', ',']));
        assert_eq!(result, "台積電");
    }
}
