use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

use crate::{logging::Logger, util};

/// 限制最多 5 個並發請求，避免被目標網站封禁。
static SEMAPHORE: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(5));

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// 每次請求後的等待時間，證交所對短時間大量請求會暫時封鎖 IP
const REQUEST_DELAY: Duration = Duration::from_millis(300);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.6943.60 Safari/537.36";

/// Converts the body of a reqwest::Response from Big5 encoding to UTF-8 encoding.
#[async_trait]
pub trait TextForceBig5 {
    async fn text_force_big5(self) -> Result<String>;
}

#[async_trait]
impl TextForceBig5 for Response {
    async fn text_force_big5(self) -> Result<String> {
        util::text::big5_2_utf8(self.bytes().await?.as_ref())
    }
}

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            .timeout(Duration::from_secs(15))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .referer(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and deserializes the JSON response into `RES`.
pub async fn get_json<RES: DeserializeOwned>(url: &str) -> Result<RES> {
    let body = send(Method::GET, url)
        .await?
        .text()
        .await
        .map_err(|e| anyhow!("Error reading response body: {:?}", e))?;

    serde_json::from_str(&body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", body, e))
}

/// Performs an HTTP GET request and returns the response as Big5 decoded text.
pub async fn get_use_big5(url: &str) -> Result<String> {
    send(Method::GET, url)
        .await?
        .text_force_big5()
        .await
        .map_err(|e| anyhow!("Error parsing response text use BIG5: {:?}", e))
}

/// Sends one HTTP request.
///
/// There is no retry here; callers own their retry policy. Non-success status
/// codes are returned as errors so that a retry policy sees them.
async fn send(method: Method, url: &str) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let rb = get_client()?.request(method, url);

    let permit = SEMAPHORE.acquire().await;
    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    // 請求延遲，避免被目標網站封禁
    tokio::time::sleep(REQUEST_DELAY).await;
    drop(permit);

    match res {
        Ok(response) if response.status().is_success() => {
            LOGGER.info(format!("{} {} ms", visit_log, elapsed));
            Ok(response)
        }
        Ok(response) => {
            let status = response.status();
            LOGGER.error(format!("{} status {}. {} ms", visit_log, status, elapsed));
            Err(anyhow!("Request to {} returned status {}", url, status))
        }
        Err(why) => {
            LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
            Err(anyhow!("Failed to send request to {} because {:?}", url, why))
        }
    }
}
