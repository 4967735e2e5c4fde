//! Typed wrappers binding a reasoning stage to one pipeline role.
//!
//! Each adapter formats its role template, invokes the stage, and returns
//! the raw text unmodified. An optional [`OutputValidator`] may reject it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::AdapterError;
use crate::market_data::MarketDataGateway;
use crate::parser::{parse_ticker_list, OutputValidator};
use crate::prompts;
use crate::stage::ReasoningStage;

/// Invoke a stage with the shared context header and run the validator, if any.
async fn run_stage(
    stage: &dyn ReasoningStage,
    validator: Option<&dyn OutputValidator>,
    task: Option<&str>,
    body: &str,
) -> Result<String, AdapterError> {
    let prompt = format!("{}{body}", prompts::agent_context(task, Utc::now()));
    let output = stage.invoke(&prompt).await?;
    if let Some(validator) = validator {
        validator.validate(&output)?;
    }
    debug!(stage = stage.name(), output_len = output.len(), "Stage returned");
    Ok(output)
}

/// Trading director: writes the thesis and makes the final call.
pub struct Director {
    stage: Arc<dyn ReasoningStage>,
    market_data: Arc<dyn MarketDataGateway>,
    validator: Option<Arc<dyn OutputValidator>>,
}

impl Director {
    pub fn new(stage: Arc<dyn ReasoningStage>, market_data: Arc<dyn MarketDataGateway>) -> Self {
        Self {
            stage,
            market_data,
            validator: None,
        }
    }

    /// Validate thesis and decision outputs.
    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Fetch market data for `ticker`, then ask for a thesis. Returns `(thesis, market_data)`.
    pub async fn generate_thesis(
        &self,
        task: &str,
        ticker: &str,
    ) -> Result<(String, String), AdapterError> {
        info!(ticker, "Generating thesis");
        let market_data = self.market_data.fetch(ticker).await?;
        let body = prompts::thesis_prompt(task, ticker, &market_data);
        let thesis =
            run_stage(self.stage.as_ref(), self.validator.as_deref(), Some(task), &body).await?;
        Ok((thesis, market_data))
    }

    /// Decide on `combined`, the order, market data and risk assessment merged as text.
    pub async fn make_decision(
        &self,
        combined: &str,
        thesis: &str,
        task: Option<&str>,
    ) -> Result<String, AdapterError> {
        let body = prompts::decision_prompt(thesis, combined);
        run_stage(self.stage.as_ref(), self.validator.as_deref(), task, &body).await
    }

    /// Ask the director which tickers the task concerns.
    pub async fn discover_tickers(&self, task: &str) -> Result<Vec<String>, AdapterError> {
        let body = prompts::ticker_discovery_prompt(task);
        let raw = run_stage(self.stage.as_ref(), None, Some(task), &body).await?;
        let tickers = parse_ticker_list(&raw);
        info!(count = tickers.len(), tickers = ?tickers, "Discovered tickers");
        Ok(tickers)
    }
}

pub struct QuantAnalyst {
    stage: Arc<dyn ReasoningStage>,
    validator: Option<Arc<dyn OutputValidator>>,
}

impl QuantAnalyst {
    pub fn new(stage: Arc<dyn ReasoningStage>) -> Self {
        Self {
            stage,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// `stock` is the ticker followed by its market data.
    pub async fn analyze(
        &self,
        stock: &str,
        thesis: &str,
        task: Option<&str>,
    ) -> Result<String, AdapterError> {
        let body = prompts::quant_prompt(stock, thesis);
        run_stage(self.stage.as_ref(), self.validator.as_deref(), task, &body).await
    }
}

pub struct RiskManager {
    stage: Arc<dyn ReasoningStage>,
    validator: Option<Arc<dyn OutputValidator>>,
}

impl RiskManager {
    pub fn new(stage: Arc<dyn ReasoningStage>) -> Self {
        Self {
            stage,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub async fn assess_risk(
        &self,
        stock: &str,
        thesis: &str,
        quant_analysis: &str,
        task: Option<&str>,
    ) -> Result<String, AdapterError> {
        let body = prompts::risk_prompt(stock, thesis, quant_analysis);
        run_stage(self.stage.as_ref(), self.validator.as_deref(), task, &body).await
    }
}

pub struct ExecutionAgent {
    stage: Arc<dyn ReasoningStage>,
    validator: Option<Arc<dyn OutputValidator>>,
}

impl ExecutionAgent {
    pub fn new(stage: Arc<dyn ReasoningStage>) -> Self {
        Self {
            stage,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn OutputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub async fn generate_order(
        &self,
        ticker: &str,
        thesis: &str,
        risk_assessment: &str,
        task: Option<&str>,
    ) -> Result<String, AdapterError> {
        let body = prompts::execution_prompt(ticker, thesis, risk_assessment);
        run_stage(self.stage.as_ref(), self.validator.as_deref(), task, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataUnavailableError, ParseError, StageError};
    use crate::parser::JsonObject;
    use crate::test_support::{ScriptedStage, StaticMarketData};

    fn director(stage: Arc<ScriptedStage>) -> Director {
        Director::new(
            stage,
            Arc::new(StaticMarketData::new().with("NVDA", r#"{"close": 121.4}"#)),
        )
    }

    #[tokio::test]
    async fn thesis_prompt_includes_market_data_and_task() {
        let stage = Arc::new(ScriptedStage::fixed("Trading-Director", "Long NVDA"));
        let (thesis, market_data) = director(stage.clone())
            .generate_thesis("Analyze NVDA for 50k allocation", "NVDA")
            .await
            .unwrap();

        assert_eq!(thesis, "Long NVDA");
        assert_eq!(market_data, r#"{"close": 121.4}"#);

        let prompts = stage.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Current time: "));
        assert!(prompts[0].contains("Task: Analyze NVDA for 50k allocation"));
        assert!(prompts[0].contains(r#"Market Data: {"close": 121.4}"#));
    }

    #[tokio::test]
    async fn missing_market_data_skips_stage() {
        let stage = Arc::new(ScriptedStage::fixed("Trading-Director", "unused"));
        let result = director(stage.clone())
            .generate_thesis("Analyze AMD", "AMD")
            .await;

        assert!(matches!(
            result,
            Err(AdapterError::Data(DataUnavailableError::NotFound(_)))
        ));
        assert!(stage.prompts().is_empty());
    }

    #[tokio::test]
    async fn output_is_returned_unmodified() {
        let raw = "  ```\nnot json at all\n```  ";
        let stage = Arc::new(ScriptedStage::fixed("Quant-Analyst", raw));
        let analysis = QuantAnalyst::new(stage)
            .analyze("NVDA\n{}", "Long", None)
            .await
            .unwrap();
        assert_eq!(analysis, raw);
    }

    #[tokio::test]
    async fn validator_rejects_malformed_output() {
        let stage = Arc::new(ScriptedStage::fixed("Risk-Manager", "looks risky"));
        let result = RiskManager::new(stage)
            .with_validator(Arc::new(JsonObject))
            .assess_risk("NVDA\n{}", "Long", "{}", Some("task"))
            .await;
        assert!(matches!(
            result,
            Err(AdapterError::Malformed(ParseError::NoJson(_)))
        ));
    }

    #[tokio::test]
    async fn stage_failure_propagates() {
        let stage = Arc::new(ScriptedStage::failing("Execution-Agent"));
        let result = ExecutionAgent::new(stage)
            .generate_order("NVDA", "Long", "size 2%", None)
            .await;
        assert!(matches!(
            result,
            Err(AdapterError::Stage(StageError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn decision_prompt_carries_combined_context() {
        let stage = Arc::new(ScriptedStage::fixed("Trading-Director", "Execute"));
        let decision = director(stage.clone())
            .make_decision("BUY 100\n{\"close\": 1}\nrisk ok", "Long", Some("task"))
            .await
            .unwrap();
        assert_eq!(decision, "Execute");
        assert!(stage.prompts()[0]
            .contains("should we execute this order: BUY 100\n{\"close\": 1}\nrisk ok"));
    }

    #[tokio::test]
    async fn discover_tickers_parses_answer() {
        let stage = Arc::new(ScriptedStage::fixed("Trading-Director", "[\"XOM\", \"CVX\"]"));
        let tickers = director(stage)
            .discover_tickers("Analyze the oil market")
            .await
            .unwrap();
        assert_eq!(tickers, vec!["XOM", "CVX"]);
    }
}
