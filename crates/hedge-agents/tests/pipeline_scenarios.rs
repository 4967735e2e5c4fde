//! End-to-end pipeline runs against scripted stages and canned market data.
//!
//! Every stage is a `ScriptedStage`, so each run is deterministic and the
//! ledger contents can be asserted exactly.

use std::sync::{Arc, OnceLock};

use hedge_agents::parser::parse_json;
use hedge_agents::test_support::{ScriptedStage, StaticMarketData};
use hedge_agents::{
    DataUnavailableError, Director, ExecutionAgent, MarketDataGateway, ParseError, Pipeline,
    PipelineError, PipelineStages, QuantAnalyst, QuantMetricsCheck, ReasoningStage, RiskManager,
    StageError,
};
use hedge_models::{
    OutputMode, QuantMetrics, RenderedLedger, Role, RoleContent, RunConfig, TickerConcurrency,
};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

const QUANT_JSON: &str = r#"{
    "ticker": "NVDA",
    "technical_score": 0.72,
    "volume_score": 0.6,
    "trend_strength": 0.8,
    "volatility": 0.35,
    "probability_score": 0.66,
    "key_levels": {"support": 112.5, "resistance": 131.0, "pivot": 120.0}
}"#;

struct Fixture {
    director: Arc<ScriptedStage>,
    quant: Arc<ScriptedStage>,
    risk: Arc<ScriptedStage>,
    execution: Arc<ScriptedStage>,
    market_data: Arc<StaticMarketData>,
}

impl Fixture {
    fn new(market_data: StaticMarketData) -> Self {
        Self {
            director: Arc::new(ScriptedStage::numbered("Trading-Director")),
            quant: Arc::new(ScriptedStage::numbered("Quant-Analyst")),
            risk: Arc::new(ScriptedStage::numbered("Risk-Manager")),
            execution: Arc::new(ScriptedStage::numbered("Execution-Agent")),
            market_data: Arc::new(market_data),
        }
    }

    fn for_tickers(tickers: &[&str]) -> Self {
        Self::new(StaticMarketData::for_tickers(tickers))
    }

    fn stages(&self) -> PipelineStages {
        PipelineStages {
            director: Director::new(
                self.director.clone() as Arc<dyn ReasoningStage>,
                self.market_data.clone() as Arc<dyn MarketDataGateway>,
            ),
            quant: QuantAnalyst::new(self.quant.clone()),
            risk: RiskManager::new(self.risk.clone()),
            execution: ExecutionAgent::new(self.execution.clone()),
        }
    }

    fn pipeline(&self, tickers: &[&str]) -> Pipeline {
        Pipeline::new(self.stages(), config(tickers, TickerConcurrency::Sequential))
    }
}

fn config(tickers: &[&str], concurrency: TickerConcurrency) -> RunConfig {
    RunConfig {
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        concurrency,
        ..RunConfig::default()
    }
}

const STAGE_ORDER: [Role; 5] = [
    Role::Director,
    Role::Quant,
    Role::Risk,
    Role::Execution,
    Role::Director,
];

// =============================================================================
// Scenario A: single ticker, full pass
// =============================================================================

#[tokio::test]
async fn single_ticker_run_appends_five_stage_entries() {
    let fixture = Fixture::for_tickers(&["NVDA"]);
    let outcome = fixture
        .pipeline(&["NVDA"])
        .run("Analyze NVDA for 50k allocation")
        .await
        .unwrap();

    assert_eq!(
        outcome.ledger.roles(),
        vec![
            Role::User,
            Role::Director,
            Role::Quant,
            Role::Risk,
            Role::Execution,
            Role::Director,
        ]
    );
    assert_eq!(
        outcome.ledger.entries()[0].content,
        "Task: Analyze NVDA for 50k allocation"
    );
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.name, "autohedge");
    assert!(outcome.finished_at >= outcome.started_at);
}

// =============================================================================
// Scenario B: data failure on the second ticker
// =============================================================================

#[tokio::test]
async fn data_failure_aborts_after_earlier_ticker() {
    let fixture = Fixture::new(StaticMarketData::for_tickers(&["AAPL"]).failing("BADTICKER"));
    let err = fixture
        .pipeline(&["AAPL", "BADTICKER"])
        .run("Rebalance the tech sleeve")
        .await
        .unwrap_err();

    match &err.error {
        PipelineError::DataUnavailable { ticker, source } => {
            assert_eq!(ticker, "BADTICKER");
            assert!(matches!(source, DataUnavailableError::Status { status: 503, .. }));
        }
        other => panic!("expected DataUnavailable, got {other:?}"),
    }

    let mut expected = vec![Role::User];
    expected.extend(STAGE_ORDER);
    assert_eq!(err.ledger.roles(), expected);
    assert_eq!(err.completed.len(), 1);
    assert_eq!(err.completed[0].ticker, "AAPL");
    assert_eq!(err.tickers, vec!["AAPL", "BADTICKER"]);

    // No stage ran for the failing ticker.
    assert_eq!(fixture.director.call_count(), 2);
    assert_eq!(fixture.quant.call_count(), 1);
}

// =============================================================================
// Ordering and completeness
// =============================================================================

#[tokio::test]
async fn tickers_are_processed_in_order_one_at_a_time() {
    let tickers = ["AAPL", "MSFT", "GOOG"];
    let fixture = Fixture::for_tickers(&tickers);
    let outcome = fixture.pipeline(&tickers).run("Rank megacaps").await.unwrap();

    let entries = outcome.ledger.entries();
    assert_eq!(entries.len(), 1 + 5 * tickers.len());
    for (i, ticker) in tickers.iter().enumerate() {
        let block = &entries[1 + 5 * i..1 + 5 * (i + 1)];
        let roles: Vec<Role> = block.iter().map(|e| e.role).collect();
        assert_eq!(roles, STAGE_ORDER);
        assert!(block[0].content.starts_with(&format!("Ticker: {ticker}\n")));
        // Sequential entries are untagged.
        assert!(block.iter().all(|e| e.ticker.is_none()));
    }
    assert_eq!(fixture.market_data.fetched(), tickers);
}

#[tokio::test]
async fn successful_run_has_complete_result_per_ticker() {
    let tickers = ["AAPL", "MSFT"];
    let fixture = Fixture::for_tickers(&tickers);
    let outcome = fixture.pipeline(&tickers).run("Rank megacaps").await.unwrap();

    let result_tickers: Vec<&str> = outcome.results.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(result_tickers, tickers);
    assert!(outcome.results.iter().all(|r| r.is_complete()));
    assert_eq!(outcome.results[1].quant_analysis, "Quant-Analyst #2");
    assert_eq!(outcome.results[1].decision, "Trading-Director #4");
}

#[tokio::test]
async fn duplicate_tickers_run_twice() {
    let tickers = ["NVDA", "NVDA"];
    let fixture = Fixture::for_tickers(&["NVDA"]);
    let outcome = fixture.pipeline(&tickers).run("Double down").await.unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert!(outcome
        .results
        .iter()
        .all(|r| r.ticker == "NVDA" && r.is_complete()));
    assert_eq!(outcome.ledger.len(), 11);
    assert_eq!(outcome.results[0].quant_analysis, "Quant-Analyst #1");
    assert_eq!(outcome.results[1].quant_analysis, "Quant-Analyst #2");
    assert_eq!(fixture.market_data.fetched(), tickers);
}

#[tokio::test]
async fn downstream_stages_see_upstream_outputs() {
    let fixture = Fixture::new(StaticMarketData::new().with("NVDA", "MD-NVDA"));
    fixture.pipeline(&["NVDA"]).run("task").await.unwrap();

    let quant_prompts = fixture.quant.prompts();
    let quant_prompt = &quant_prompts[0];
    assert!(quant_prompt.contains("NVDA\nMD-NVDA"));
    assert!(quant_prompt.contains("Trading-Director #1"));

    let risk_prompts = fixture.risk.prompts();
    let risk_prompt = &risk_prompts[0];
    assert!(risk_prompt.contains("Quant-Analyst #1"));

    let execution_prompts = fixture.execution.prompts();
    let execution_prompt = &execution_prompts[0];
    assert!(execution_prompt.contains("Risk-Manager #1"));
}

// =============================================================================
// Abort semantics
// =============================================================================

#[tokio::test]
async fn stage_failure_stops_run_mid_ticker() {
    let mut fixture = Fixture::for_tickers(&["AAPL", "TSLA", "MSFT"]);
    fixture.risk = Arc::new(ScriptedStage::failing_on("Risk-Manager", "TSLA"));

    let err = fixture
        .pipeline(&["AAPL", "TSLA", "MSFT"])
        .run("Size positions for next week")
        .await
        .unwrap_err();

    assert!(matches!(
        err.error,
        PipelineError::Stage {
            role: Role::Risk,
            source: StageError::Cli(_),
            ..
        }
    ));
    assert_eq!(err.error.ticker(), Some("TSLA"));
    // user + AAPL's five + TSLA's thesis and quant analysis
    assert_eq!(err.ledger.len(), 8);
    assert_eq!(err.completed.len(), 1);
    assert!(!fixture.market_data.fetched().contains(&"MSFT".to_string()));
}

#[tokio::test]
async fn validator_rejection_is_malformed_output() {
    let fixture = Fixture::for_tickers(&["NVDA"]);
    let mut stages = fixture.stages();
    stages.quant =
        QuantAnalyst::new(fixture.quant.clone()).with_validator(Arc::new(QuantMetricsCheck));
    let pipeline = Pipeline::new(stages, config(&["NVDA"], TickerConcurrency::Sequential));

    let err = pipeline.run("task").await.unwrap_err();
    assert!(matches!(
        err.error,
        PipelineError::MalformedOutput {
            role: Role::Quant,
            source: ParseError::NoJson(_),
            ..
        }
    ));
    assert_eq!(err.ledger.roles(), vec![Role::User, Role::Director]);
}

#[tokio::test]
async fn validator_accepts_well_formed_output() {
    let fixture = Fixture::for_tickers(&["NVDA"]);
    let mut stages = fixture.stages();
    let quant = Arc::new(ScriptedStage::fixed(
        "Quant-Analyst",
        &format!("```json\n{QUANT_JSON}\n```"),
    ));
    stages.quant = QuantAnalyst::new(quant).with_validator(Arc::new(QuantMetricsCheck));
    let pipeline = Pipeline::new(stages, config(&["NVDA"], TickerConcurrency::Sequential));

    let outcome = pipeline.run("task").await.unwrap();
    // The raw text is kept, fences and all.
    let raw = &outcome.results[0].quant_analysis;
    assert!(raw.starts_with("```json"));

    let metrics: QuantMetrics = parse_json(raw).unwrap();
    assert_eq!(metrics.probability_score, dec!(0.66));
    assert_eq!(metrics.key_levels.support, dec!(112.5));
}

#[tokio::test]
async fn cancellation_takes_effect_at_next_stage_boundary() {
    let slot: Arc<OnceLock<CancellationToken>> = Arc::new(OnceLock::new());
    let mut fixture = Fixture::for_tickers(&["NVDA", "MSFT"]);
    let trigger = slot.clone();
    fixture.quant = Arc::new(ScriptedStage::new("Quant-Analyst", move |_, _| {
        if let Some(token) = trigger.get() {
            token.cancel();
        }
        Ok("quant done".to_string())
    }));

    let pipeline = fixture.pipeline(&["NVDA", "MSFT"]);
    slot.set(pipeline.cancel_token()).unwrap();

    let err = pipeline.run("task").await.unwrap_err();
    assert!(matches!(err.error, PipelineError::Cancelled));
    assert_eq!(
        err.ledger.roles(),
        vec![Role::User, Role::Director, Role::Quant]
    );
    assert_eq!(fixture.risk.call_count(), 0);
    assert!(err.completed.is_empty());
}

// =============================================================================
// Rendering
// =============================================================================

#[tokio::test]
async fn render_modes_project_the_same_entries() {
    let fixture = Fixture::for_tickers(&["NVDA"]);
    for mode in [OutputMode::List, OutputMode::Dict, OutputMode::Str] {
        let mut settings = config(&["NVDA"], TickerConcurrency::Sequential);
        settings.output_mode = mode;
        let outcome = Pipeline::new(fixture.stages(), settings)
            .run("task")
            .await
            .unwrap();

        let entries = outcome.ledger.entries();
        match outcome.output {
            RenderedLedger::List(list) => assert_eq!(list, entries),
            RenderedLedger::Dict(pairs) => {
                let expected: Vec<RoleContent> = entries.iter().map(RoleContent::from).collect();
                assert_eq!(pairs, expected);
            }
            RenderedLedger::Str(text) => {
                let joined = entries
                    .iter()
                    .map(|e| format!("{}: {}", e.role, e.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                assert_eq!(text, joined);
            }
        }
    }
}

#[tokio::test]
async fn failed_run_ledger_is_prefix_of_full_run() {
    let tickers = ["AAPL", "BADTICKER"];
    let ok = Fixture::new(StaticMarketData::for_tickers(&tickers))
        .pipeline(&tickers)
        .run("task")
        .await
        .unwrap();
    let failed = Fixture::new(StaticMarketData::for_tickers(&tickers).failing("BADTICKER"))
        .pipeline(&tickers)
        .run("task")
        .await
        .unwrap_err();

    let short = failed.ledger.to_dict();
    let long = ok.ledger.to_dict();
    assert_eq!(short[..], long[..short.len()]);
}

// =============================================================================
// Concurrent per-ticker mode
// =============================================================================

#[tokio::test]
async fn per_ticker_mode_tags_entries_and_keeps_result_order() {
    let tickers = ["AAPL", "MSFT", "GOOG", "AMZN"];
    let fixture = Fixture::for_tickers(&tickers);
    let pipeline = Pipeline::new(
        fixture.stages(),
        config(&tickers, TickerConcurrency::PerTicker),
    );

    let outcome = pipeline.run("Rank megacaps").await.unwrap();
    assert_eq!(outcome.ledger.len(), 1 + 5 * tickers.len());

    let result_tickers: Vec<&str> = outcome.results.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(result_tickers, tickers);
    assert!(outcome.results.iter().all(|r| r.is_complete()));

    // Entries may interleave across tickers, but each ticker's own five stay in stage order.
    for ticker in tickers {
        let roles: Vec<Role> = outcome
            .ledger
            .entries()
            .iter()
            .filter(|e| e.ticker.as_deref() == Some(ticker))
            .map(|e| e.role)
            .collect();
        assert_eq!(roles, STAGE_ORDER, "stage order for {ticker}");
    }
}

#[tokio::test]
async fn per_ticker_mode_reports_the_real_failure() {
    let tickers = ["AAPL", "BADTICKER", "MSFT"];
    let fixture = Fixture::new(StaticMarketData::for_tickers(&["AAPL", "MSFT"]).failing("BADTICKER"));
    let pipeline = Pipeline::new(
        fixture.stages(),
        config(&tickers, TickerConcurrency::PerTicker),
    );

    let err = pipeline.run("task").await.unwrap_err();
    assert!(matches!(err.error, PipelineError::DataUnavailable { .. }));
    assert_eq!(err.error.ticker(), Some("BADTICKER"));
    assert!(err.completed.iter().all(|r| r.ticker != "BADTICKER"));
    assert!(err
        .ledger
        .entries()
        .iter()
        .all(|e| e.ticker.as_deref() != Some("BADTICKER")));
}

// =============================================================================
// Ticker discovery
// =============================================================================

#[tokio::test]
async fn discovery_failure_is_reported_as_discovery() {
    let mut fixture = Fixture::for_tickers(&[]);
    fixture.director = Arc::new(ScriptedStage::failing("Trading-Director"));

    let err = fixture.pipeline(&[]).run("Analyze the oil market").await.unwrap_err();
    assert!(matches!(err.error, PipelineError::Discovery(_)));
    assert_eq!(err.ledger.roles(), vec![Role::User]);
    assert!(err.tickers.is_empty());
}

#[tokio::test]
async fn explicit_tickers_override_configured_ones() {
    let fixture = Fixture::for_tickers(&["AAPL", "XOM"]);
    let pipeline = fixture.pipeline(&["AAPL"]);
    let outcome = pipeline
        .run_with_tickers("Energy check", &["XOM".to_string()])
        .await
        .unwrap();
    assert_eq!(outcome.tickers, vec!["XOM"]);
    assert_eq!(fixture.market_data.fetched(), vec!["XOM"]);
}
