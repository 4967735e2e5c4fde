use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use hedge_models::MarketDataConfig;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::DataUnavailableError;

/// Point-in-time market data for a ticker, returned as an opaque (JSON-shaped) string.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<String, DataUnavailableError>;
}

/// Gateway over a Polygon-compatible REST API.
///
/// One `fetch` issues the overview, daily aggregates and (optionally)
/// balance sheet requests in sequence. No caching, no retries.
pub struct HttpMarketData {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    history_days: u32,
    include_balance_sheets: bool,
}

impl HttpMarketData {
    pub fn new(config: &MarketDataConfig, api_key: Option<String>) -> Result<Self, DataUnavailableError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            history_days: config.history_days,
            include_balance_sheets: config.include_balance_sheets,
        })
    }

    /// Build a gateway reading the API key from the env var named in the config.
    pub fn from_env(config: &MarketDataConfig) -> Result<Self, DataUnavailableError> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "Market data API key not set; requests are unauthenticated");
        }
        Self::new(config, api_key)
    }

    /// `base_url` with `segments` appended. Each segment is percent-encoded, so a
    /// ticker can never add path components.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects bases that cannot take a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn overview_url(&self, ticker: &str) -> Url {
        self.endpoint(&["v3", "reference", "tickers", ticker])
    }

    pub fn history_url(&self, ticker: &str, today: NaiveDate) -> Url {
        let from = today
            .checked_sub_days(Days::new(u64::from(self.history_days)))
            .unwrap_or(today)
            .to_string();
        let to = today.to_string();
        let mut url = self.endpoint(&[
            "v2", "aggs", "ticker", ticker, "range", "1", "day", &from, &to,
        ]);
        url.query_pairs_mut()
            .append_pair("adjusted", "true")
            .append_pair("sort", "asc");
        url
    }

    pub fn balance_sheets_url(&self, ticker: &str) -> Url {
        let mut url = self.endpoint(&["stocks", "financials", "v1", "balance-sheets"]);
        url.query_pairs_mut()
            .append_pair("tickers", ticker)
            .append_pair("limit", "4")
            .append_pair("sort", "period_end.desc");
        url
    }

    async fn get_json(&self, url: Url) -> Result<serde_json::Value, DataUnavailableError> {
        debug!(url = %url, "Market data request");
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataUnavailableError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DataUnavailableError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketDataGateway for HttpMarketData {
    async fn fetch(&self, ticker: &str) -> Result<String, DataUnavailableError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(DataUnavailableError::EmptyTicker);
        }

        let overview = match self.get_json(self.overview_url(ticker)).await {
            Err(DataUnavailableError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Err(DataUnavailableError::NotFound(ticker.to_string()));
            }
            other => other?,
        };

        let today = Utc::now().date_naive();
        let history = self.get_json(self.history_url(ticker, today)).await?;

        let mut combined = serde_json::json!({
            "ticker": ticker,
            "overview": overview.get("results").cloned().unwrap_or(overview),
            "history": history.get("results").cloned().unwrap_or(history),
        });

        if self.include_balance_sheets {
            let sheets = self.get_json(self.balance_sheets_url(ticker)).await?;
            combined["balance_sheets"] = sheets.get("results").cloned().unwrap_or(sheets);
        }

        serde_json::to_string(&combined).map_err(|e| DataUnavailableError::Decode(e.to_string()))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, DataUnavailableError> {
    let invalid = |reason: String| DataUnavailableError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot take a path".to_string()));
    }
    Ok(url)
}
