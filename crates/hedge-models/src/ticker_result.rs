use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ticker's full pass through the pipeline, fields in production order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerTickerResult {
    pub ticker: String,
    /// Opaque pass-through from the market data gateway.
    pub market_data: String,
    pub thesis: String,
    pub quant_analysis: String,
    pub risk_assessment: String,
    pub order: String,
    pub decision: String,
    pub completed_at: DateTime<Utc>,
}

impl PerTickerResult {
    /// True when every stage output is non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.market_data,
            &self.thesis,
            &self.quant_analysis,
            &self.risk_assessment,
            &self.order,
            &self.decision,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}
