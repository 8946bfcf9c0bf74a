use anyhow::{anyhow, Result};
use hashbrown::HashSet;
use scraper::{Html, Selector};

use crate::{logging, util::http};

/// 上市:2 上櫃:4 興櫃:5
const LISTED_MODE: u32 = 2;

/// 只收錄這些分類底下的證券，以分類名稱開頭比對（如「受益證券-不動產投資信託」）
const REQUIRED_CATEGORIES: [&str; 8] = [
    "股票",
    "特別股",
    "普通股",
    "創新板",
    "ETF",
    "ETN",
    "臺灣存託憑證",
    "受益證券",
];

/// 證交所國際證券辨識號碼一覽表中的上市股票代號
#[derive(Debug, Default, Clone)]
pub struct CodeRegistry {
    codes: HashSet<String>,
}

impl CodeRegistry {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CodeRegistry {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

/// 重新下載上市股票代號清單
pub async fn refresh_registry() -> Result<CodeRegistry> {
    let url = format!(
        "https://isin.twse.com.tw/isin/C_public.jsp?strMode={}",
        LISTED_MODE
    );

    let html = http::get_use_big5(&url).await?;
    let registry = parse_registry(&html)?;

    logging::info_file_async(format!("取得上市股票代號 {} 筆", registry.len()));

    Ok(registry)
}

fn is_required_category_title(title: &str) -> bool {
    REQUIRED_CATEGORIES
        .iter()
        .any(|category| title.starts_with(category))
}

/// 解析一覽表，只有一個欄位的列為分類標題，其餘列第一欄為「代號　名稱」
fn parse_registry(html: &str) -> Result<CodeRegistry> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("table.h4 tr")
        .map_err(|why| anyhow!("Failed to Selector::parse because: {:?}", why))?;
    let cell_selector =
        Selector::parse("td").map_err(|why| anyhow!("Failed to Selector::parse because: {:?}", why))?;

    let mut codes = HashSet::with_capacity(2048);
    let mut is_required_category = false;

    for row in document.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        match cells.len() {
            0 => continue,
            1 => {
                is_required_category = is_required_category_title(&cells[0]);
                continue;
            }
            _ => {}
        }

        if !is_required_category {
            continue;
        }

        let mut split = cells[0].split('\u{3000}');
        match (split.next(), split.next()) {
            (Some(code), Some(_name)) if !code.trim().is_empty() => {
                codes.insert(code.trim().to_string());
            }
            // 名稱和代碼有缺
            _ => continue,
        }
    }

    Ok(CodeRegistry { codes })
}
