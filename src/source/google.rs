//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了基于 Google Sheets / Drive HTTP 接口的数据源。

use super::auth::ServiceAccountAuth;
use super::{DataSource, Row, SheetSelector};
use crate::config::SheetsConfig;
use crate::error::{I18nError, Result};
use crate::metrics::GLOBAL_METRICS;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct BatchValues {
    #[serde(default, rename = "valueRanges")]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileMeta {
    etag: Option<String>,
}

/// 单次重试等待的上限
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Sheets 对不存在的工作表返回 400 及此消息
const UNKNOWN_RANGE: &str = "Unable to parse range";

/// 单次 HTTP 调用的失败分类
#[derive(Debug)]
enum Attempt {
    Retryable(I18nError),
    Fatal(I18nError),
}

impl Attempt {
    /// 按状态码与响应体分类失败的响应
    fn classify(status: StatusCode, body: &str, what: &str) -> Self {
        let message = format!("{} returned {}: {}", what, status, body);
        match status {
            StatusCode::NOT_FOUND => Attempt::Fatal(I18nError::NotFound(message)),
            StatusCode::BAD_REQUEST if body.contains(UNKNOWN_RANGE) => {
                Attempt::Fatal(I18nError::NotFound(message))
            }
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retryable(I18nError::Source(message)),
            s if s.is_server_error() => Attempt::Retryable(I18nError::Source(message)),
            _ => Attempt::Fatal(I18nError::Source(message)),
        }
    }
}

/// Google Sheets 数据源
pub struct GoogleSheetsSource {
    client: Client,
    auth: ServiceAccountAuth,
    spreadsheet_ids: BTreeMap<String, String>,
    range: String,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
    sheets_base_url: String,
    drive_base_url: String,
}

impl std::fmt::Debug for GoogleSheetsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsSource")
            .field("issuers", &self.spreadsheet_ids.keys().collect::<Vec<_>>())
            .field("sheets_base_url", &self.sheets_base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

impl GoogleSheetsSource {
    /// 根据配置创建数据源
    ///
    /// 凭据缺失或私钥无效时返回错误
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let credentials = config.credentials.as_ref().ok_or_else(|| {
            I18nError::Config("Google Sheet configurations not complete".to_string())
        })?;
        let auth = ServiceAccountAuth::new(credentials, &config.token_url)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| I18nError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth,
            spreadsheet_ids: config.spreadsheet_ids.clone(),
            range: config.range.clone(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            sheets_base_url: config.sheets_base_url.clone(),
            drive_base_url: config.drive_base_url.clone(),
        })
    }

    fn spreadsheet_id(&self, issuer: &str) -> Result<&str> {
        self.spreadsheet_ids
            .get(issuer)
            .map(String::as_str)
            .ok_or_else(|| {
                I18nError::NotFound(format!("Spreadsheet ID not found for issuer: {}", issuer))
            })
    }

    /// 在基础地址后追加路径段，各段会被正确转义
    fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| I18nError::Config(format!("Invalid base URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| I18nError::Config(format!("Base URL cannot be a base: {}", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 发送一次带认证的 GET 请求
    async fn send_once(&self, url: &Url, what: &str) -> std::result::Result<reqwest::Response, Attempt> {
        let token = self
            .auth
            .access_token(&self.client)
            .await
            .map_err(Attempt::Fatal)?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| Attempt::Retryable(I18nError::Source(format!("{} request failed: {}", what, e))))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Attempt::classify(status, &body, what))
    }


    /// 发送请求，暂时性错误按指数退避重试
    async fn get_with_retry(&self, url: &Url, what: &str) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(url, what).await {
                Ok(response) => return Ok(response),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(e)) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let backoff = backoff_delay(self.retry_backoff, attempt);
                    attempt += 1;
                    warn!("{}th attempt failed: {}; retry backoff {:?}", attempt, e, backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url, what: &str) -> Result<T> {
        let response = self.get_with_retry(url, what).await?;
        response
            .json()
            .await
            .map_err(|e| I18nError::Source(format!("Invalid {} response: {}", what, e)))
    }

    async fn fetch_sheet(&self, spreadsheet_id: &str, sheet: &str) -> Result<Vec<Row>> {
        let range = format!("{}!{}", sheet, self.range);
        let url = Self::endpoint(
            &self.sheets_base_url,
            &["spreadsheets", spreadsheet_id, "values", &range],
        )?;
        let data: ValueRange = self.get_json(&url, "values.get").await?;
        Ok(data.values)
    }

    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>> {
        let mut url = Self::endpoint(&self.sheets_base_url, &["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("includeGridData", "false")
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = self.get_json(&url, "spreadsheets.get").await?;
        Ok(meta
            .sheets
            .into_iter()
            .filter_map(|s| s.properties.and_then(|p| p.title))
            .filter(|t| !t.is_empty())
            .collect())
    }

    async fn fetch_batch(&self, spreadsheet_id: &str, titles: &[String]) -> Result<Vec<Row>> {
        let mut url = Self::endpoint(
            &self.sheets_base_url,
            &["spreadsheets", spreadsheet_id, "values:batchGet"],
        )?;
        {
            let mut query = url.query_pairs_mut();
            for title in titles {
                query.append_pair("ranges", &format!("'{}'!{}", title, self.range));
            }
            query.append_pair("fields", "valueRanges.values");
        }
        let data: BatchValues = self.get_json(&url, "values.batchGet").await?;
        Ok(data
            .value_ranges
            .into_iter()
            .flat_map(|vr| vr.values)
            .collect())
    }

    async fn fetch_all(&self, issuer: &str, spreadsheet_id: &str) -> Result<Vec<Row>> {
        let titles = self.sheet_titles(spreadsheet_id).await?;
        let rows = collect_in_batches(&titles, self.batch_size, |batch| {
            self.fetch_batch(spreadsheet_id, batch)
        })
        .await;
        info!(
            "Sheet batch fetch done: issuer={}, sheets={}, rows={}",
            issuer,
            titles.len(),
            rows.len()
        );
        Ok(rows)
    }
}

/// 第 `attempt` 次重试前的等待时间，翻倍增长并封顶
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// 按批读取并拼接结果
///
/// 单批失败只记录日志并跳过，整体仍然成功
pub async fn collect_in_batches<'a, F, Fut>(
    titles: &'a [String],
    batch_size: usize,
    mut fetch: F,
) -> Vec<Row>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: Future<Output = Result<Vec<Row>>>,
{
    let mut rows = Vec::new();
    for batch in titles.chunks(batch_size.max(1)) {
        debug!("Sheet batch fetch: titles={:?}", batch);
        match fetch(batch).await {
            Ok(batch_rows) => rows.extend(batch_rows),
            Err(e) => {
                GLOBAL_METRICS.record("source", "batch_failed");
                error!("Error fetching sheet batch {:?}: {}", batch, e);
            }
        }
    }
    rows
}

#[async_trait]
impl DataSource for GoogleSheetsSource {
    fn tenants(&self) -> Vec<String> {
        self.spreadsheet_ids.keys().cloned().collect()
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_rows(&self, tenant: &str, sheet: &SheetSelector) -> Result<Vec<Row>> {
        let spreadsheet_id = self.spreadsheet_id(tenant)?;
        info!("Fetch Google Sheet: issuer={}, sheet={}", tenant, sheet);
        match sheet {
            SheetSelector::All => self.fetch_all(tenant, spreadsheet_id).await,
            SheetSelector::Named(name) => self.fetch_sheet(spreadsheet_id, name).await,
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_change_token(&self, tenant: &str) -> Result<String> {
        let spreadsheet_id = self.spreadsheet_id(tenant)?;
        let mut url = Self::endpoint(&self.drive_base_url, &["files", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "etag");

        let response = self.get_with_retry(&url, "files.get").await.map_err(|e| {
            error!("Error fetching etag for issuer {}: {}", tenant, e);
            e
        })?;

        let header_etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let etag = match header_etag {
            Some(etag) => etag,
            None => {
                let meta: FileMeta = response.json().await.map_err(|e| {
                    I18nError::Source(format!("Invalid files.get response: {}", e))
                })?;
                meta.etag.unwrap_or_default()
            }
        };
        debug!("Google Sheet etag: issuer={}, etag={}", tenant, etag);
        Ok(etag)
    }
}
