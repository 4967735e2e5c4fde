use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The structured answer the quant prompt asks for.
///
/// Stage output is opaque text by default; this type is only used when a
/// typed validator is installed on the quant analyst.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuantMetrics {
    pub ticker: String,
    /// 0.0 to 1.0
    pub technical_score: Decimal,
    /// 0.0 to 1.0
    pub volume_score: Decimal,
    /// 0.0 to 1.0
    pub trend_strength: Decimal,
    pub volatility: Decimal,
    /// 0.0 to 1.0
    pub probability_score: Decimal,
    pub key_levels: KeyLevels,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyLevels {
    pub support: Decimal,
    pub resistance: Decimal,
    pub pivot: Decimal,
}

impl QuantMetrics {
    /// Scores that are documented as unit-interval values.
    pub fn unit_scores(&self) -> [(&'static str, Decimal); 4] {
        [
            ("technical_score", self.technical_score),
            ("volume_score", self.volume_score),
            ("trend_strength", self.trend_strength),
            ("probability_score", self.probability_score),
        ]
    }

    /// Name of the first score outside `[0, 1]`, if any.
    pub fn out_of_range_score(&self) -> Option<&'static str> {
        self.unit_scores()
            .into_iter()
            .find(|(_, v)| *v < Decimal::ZERO || *v > Decimal::ONE)
            .map(|(name, _)| name)
    }
}
