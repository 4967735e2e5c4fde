//! Test doubles for the pipeline's external collaborators.
//!
//! `ScriptedStage` stands in for a reasoning stage and records every prompt it
//! receives; `StaticMarketData` serves canned market data per ticker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{DataUnavailableError, StageError};
use crate::market_data::MarketDataGateway;
use crate::stage::ReasoningStage;

type Responder = Box<dyn Fn(usize, &str) -> Result<String, StageError> + Send + Sync>;

/// A reasoning stage driven by a closure of `(call_index, prompt)`.
pub struct ScriptedStage {
    name: String,
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedStage {
    pub fn new<F>(name: &str, responder: F) -> Self
    where
        F: Fn(usize, &str) -> Result<String, StageError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`.
    pub fn fixed(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(text.clone()))
    }

    /// Answers `"{name} #{n}"`, numbering calls from 1.
    pub fn numbered(name: &str) -> Self {
        let label = name.to_string();
        Self::new(name, move |n, _| Ok(format!("{label} #{}", n + 1)))
    }

    /// Always fails as unreachable.
    pub fn failing(name: &str) -> Self {
        let label = name.to_string();
        Self::new(name, move |_, _| {
            Err(StageError::Unavailable(format!("{label} is unreachable")))
        })
    }

    /// Answers `"{name} #{n}"`, but fails for prompts containing `needle`.
    pub fn failing_on(name: &str, needle: &str) -> Self {
        let label = name.to_string();
        let needle = needle.to_string();
        Self::new(name, move |n, prompt| {
            if prompt.contains(&needle) {
                Err(StageError::Cli(format!("{label} failed on {needle}")))
            } else {
                Ok(format!("{label} #{}", n + 1))
            }
        })
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningStage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, prompt: &str) -> Result<String, StageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        // Yield so concurrent callers can interleave.
        tokio::task::yield_now().await;
        (self.responder)(n, prompt)
    }
}

/// Canned market data keyed by ticker. Unknown tickers are `NotFound`.
#[derive(Default)]
pub struct StaticMarketData {
    data: HashMap<String, String>,
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, data: &str) -> Self {
        self.data.insert(ticker.to_string(), data.to_string());
        self
    }

    /// Serve `{"ticker": T, "close": ...}` for each ticker.
    pub fn for_tickers(tickers: &[&str]) -> Self {
        tickers.iter().enumerate().fold(Self::new(), |gw, (i, t)| {
            let data = serde_json::json!({"ticker": t, "close": 100.0 + i as f64}).to_string();
            gw.with(t, &data)
        })
    }

    /// Make `ticker` fail with a transport-style error.
    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(ticker.to_string());
        self
    }

    /// Tickers requested so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MarketDataGateway for StaticMarketData {
    async fn fetch(&self, ticker: &str) -> Result<String, DataUnavailableError> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ticker.to_string());
        tokio::task::yield_now().await;

        if ticker.trim().is_empty() {
            return Err(DataUnavailableError::EmptyTicker);
        }
        if self.failing.contains(ticker) {
            return Err(DataUnavailableError::Status {
                status: 503,
                body: format!("upstream unavailable for {ticker}"),
            });
        }
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| DataUnavailableError::NotFound(ticker.to_string()))
    }
}
