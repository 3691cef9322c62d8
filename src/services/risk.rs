use crate::models::coach::{
    finite_or_zero, Insight, Metrics, RiskProfile, RiskTier, SentimentResult, Severity,
};

const AGGRESSIVE_FLOOR: f64 = 75.0;
const BALANCED_FLOOR: f64 = 45.0;
const OVERTRADING_THRESHOLD: f64 = 600.0;
const OVERTRADING_PENALTY: f64 = 8.0;

/// Weighted parts of the risk score, before clipping the total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBreakdown {
    pub profitability: f64,
    pub consistency: f64,
    pub sentiment: f64,
    pub severity_penalty: f64,
    pub activity_penalty: f64,
}

impl RiskBreakdown {
    pub fn compute(metrics: &Metrics, insights: &[Insight], sentiment: &SentimentResult) -> Self {
        Self {
            profitability: ((finite_or_zero(metrics.point_factor) - 0.8) * 35.0).clamp(0.0, 35.0),
            consistency: ((finite_or_zero(metrics.win_rate) - 40.0) * 0.6).clamp(0.0, 25.0),
            sentiment: (finite_or_zero(sentiment.score) * 20.0).clamp(0.0, 20.0),
            severity_penalty: insights.iter().map(|i| severity_weight(i.severity)).sum(),
            activity_penalty: if finite_or_zero(metrics.total_trades) > OVERTRADING_THRESHOLD {
                OVERTRADING_PENALTY
            } else {
                0.0
            },
        }
    }

    pub fn score(&self) -> f64 {
        let raw = self.profitability + self.consistency + self.sentiment
            - self.severity_penalty
            - self.activity_penalty;
        (raw.clamp(0.0, 100.0) * 10.0).round() / 10.0
    }
}

fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::High => 14.0,
        Severity::Medium => 6.0,
        Severity::Low => 2.0,
        Severity::Other => 0.0,
    }
}

pub fn tier_for(score: f64) -> RiskTier {
    if score >= AGGRESSIVE_FLOOR {
        RiskTier::Aggressive
    } else if score >= BALANCED_FLOOR {
        RiskTier::Balanced
    } else {
        RiskTier::Conservative
    }
}

pub fn score_risk(
    metrics: &Metrics,
    insights: &[Insight],
    sentiment: &SentimentResult,
) -> RiskProfile {
    let breakdown = RiskBreakdown::compute(metrics, insights, sentiment);
    let score = breakdown.score();
    RiskProfile {
        score,
        tier: tier_for(score),
        rationale: format!(
            "Profitability {:.1}/35, consistency {:.1}/25, sentiment {:.1}/20, \
             insight penalty -{:.1}, activity penalty -{:.1}.",
            breakdown.profitability,
            breakdown.consistency,
            breakdown.sentiment,
            breakdown.severity_penalty,
            breakdown.activity_penalty
        ),
    }
}
