use crate::models::coach::{finite_or_zero, CoachResponse, Insight, Metrics, SentimentLabel};
use crate::services::risk::score_risk;
use crate::services::sentiment::analyze_sentiment;

pub const HEURISTIC_SOURCE: &str = "heuristic";

const MAX_SUGGESTIONS: usize = 3;
const MAX_BIAS_TRIGGERS: usize = 3;
const RATIO_EPSILON: f64 = 1e-6;
const LOSS_WIN_RATIO_LIMIT: f64 = 1.4;
const WIN_RATE_FLOOR: f64 = 50.0;
const POINT_FACTOR_FLOOR: f64 = 1.2;

const STABLE_ZONE: &str = "Metrics sit in a stable zone; keep position sizing consistent and \
                           review outlier trades weekly before changing anything.";

const FIXED_BIAS_TRIGGERS: [&str; 2] = [
    "After two consecutive losses, watch for revenge entries that break your sizing rules.",
    "Following a large win, guard against overconfidence and oversized follow-up positions.",
];

const NEGATIVE_MOOD_TRIGGER: &str = "Your notes carry stress signals; pause before the next \
                                     entry whenever fear or frustration shows up.";

const COACHING_PROMPTS: [&str; 3] = [
    "Which trade this week followed your plan most closely, and what made that possible?",
    "What early signal tells you that you are about to break a rule?",
    "If you could only take one setup next week, which would it be and why?",
];

/// Rule-based coaching. Total on every input.
pub fn generate_coach(metrics: &Metrics, insights: &[Insight], trader_notes: &str) -> CoachResponse {
    let sentiment = analyze_sentiment(trader_notes);
    let risk_profile = score_risk(metrics, insights, &sentiment);

    let performance = if metrics.total_pnl > 0.0 {
        "Net P&L is positive, so the priority is protecting the edge you already have."
    } else {
        "Net P&L is flat or negative, so the priority is tightening risk before adding size."
    };
    let summary = format!(
        "Your risk profile reads as {} with a {:.1}% win rate and a point factor of {:.2}, \
         and your notes read {}. {}",
        risk_profile.tier.as_str().to_lowercase(),
        finite_or_zero(metrics.win_rate),
        finite_or_zero(metrics.point_factor),
        sentiment.label.as_str(),
        performance
    );

    let mut future_bias_triggers: Vec<String> =
        FIXED_BIAS_TRIGGERS.iter().map(|s| s.to_string()).collect();
    if sentiment.label == SentimentLabel::Negative {
        future_bias_triggers.push(NEGATIVE_MOOD_TRIGGER.to_string());
    }
    future_bias_triggers.truncate(MAX_BIAS_TRIGGERS);

    CoachResponse {
        summary,
        sentiment,
        risk_profile,
        optimization_suggestions: suggestions(metrics),
        future_bias_triggers,
        coaching_prompts: COACHING_PROMPTS.iter().map(|s| s.to_string()).collect(),
        source: HEURISTIC_SOURCE.to_string(),
    }
}

fn suggestions(metrics: &Metrics) -> Vec<String> {
    let avg_loss = finite_or_zero(metrics.avg_loss).abs();
    let avg_profit = finite_or_zero(metrics.avg_profit).abs();
    let loss_win_ratio = avg_loss / avg_profit.max(RATIO_EPSILON);

    let mut out: Vec<String> = Vec::new();
    let mut push = |text: String| {
        if !out.contains(&text) {
            out.push(text);
        }
    };

    if loss_win_ratio > LOSS_WIN_RATIO_LIMIT {
        push(format!(
            "Average loss is {:.2}x the average win; tighten stops or cut losers earlier \
             to rebalance reward-to-risk.",
            loss_win_ratio.min(999.0)
        ));
    }
    if finite_or_zero(metrics.win_rate) < WIN_RATE_FLOOR {
        push(
            "Win rate is below 50%; tighten entry criteria and skip lower-conviction setups."
                .to_string(),
        );
    }
    if finite_or_zero(metrics.point_factor) < POINT_FACTOR_FLOOR {
        push(
            "Point factor under 1.2 leaves little margin; let winners run longer or scale out \
             in stages."
                .to_string(),
        );
    }
    if out.is_empty() {
        out.push(STABLE_ZONE.to_string());
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coach::{RiskTier, Severity};

    #[test]
    fn empty_input_is_conservative_and_neutral() {
        let response = generate_coach(&Metrics::default(), &[], "");
        assert_eq!(response.risk_profile.tier, RiskTier::Conservative);
        assert_eq!(response.sentiment.label, SentimentLabel::Neutral);
        assert!(response.summary.contains("conservative"));
        assert!(response.summary.contains("neutral"));
        assert!(response.summary.contains("0.0% win rate"));
        assert!(response.summary.contains("point factor of 0.00"));
        assert_eq!(response.source, "heuristic");
    }

    #[test]
    fn weak_metrics_fire_all_rules_in_order() {
        let metrics = Metrics {
            win_rate: 38.0,
            point_factor: 0.9,
            avg_profit: 50.0,
            avg_loss: -100.0,
            ..Metrics::default()
        };
        let response = generate_coach(&metrics, &[], "");
        let suggestions = &response.optimization_suggestions;
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions[0].starts_with("Average loss is 2.00x"));
        assert!(suggestions[1].starts_with("Win rate is below 50%"));
        assert!(suggestions[2].starts_with("Point factor under 1.2"));
    }

    #[test]
    fn healthy_metrics_get_stable_zone() {
        let metrics = Metrics {
            win_rate: 62.0,
            point_factor: 1.9,
            avg_profit: 120.0,
            avg_loss: -80.0,
            total_pnl: 4200.0,
            ..Metrics::default()
        };
        let response = generate_coach(&metrics, &[], "calm and focused");
        assert_eq!(response.optimization_suggestions, vec![STABLE_ZONE.to_string()]);
        assert!(response.summary.contains("Net P&L is positive"));
    }

    #[test]
    fn zero_average_profit_does_not_divide_by_zero() {
        let metrics = Metrics {
            avg_loss: -5.0,
            win_rate: 70.0,
            point_factor: 2.0,
            ..Metrics::default()
        };
        let response = generate_coach(&metrics, &[], "");
        assert_eq!(response.optimization_suggestions.len(), 1);
        assert!(response.optimization_suggestions[0].starts_with("Average loss is 999.00x"));
    }

    #[test]
    fn negative_notes_add_third_trigger() {
        let calm = generate_coach(&Metrics::default(), &[], "calm");
        assert_eq!(calm.future_bias_triggers.len(), 2);

        let stressed = generate_coach(&Metrics::default(), &[], "panic fear fomo angry");
        assert_eq!(stressed.sentiment.label, SentimentLabel::Negative);
        assert_eq!(stressed.future_bias_triggers.len(), 3);
        assert_eq!(stressed.future_bias_triggers[2], NEGATIVE_MOOD_TRIGGER);
    }

    #[test]
    fn list_sizes_hold_across_inputs() {
        let insight = Insight {
            severity: Severity::High,
            severity_label: Some("high".into()),
            title: None,
            detail: None,
        };
        for win_rate in [0.0, 45.0, 55.0, 99.0] {
            for point_factor in [0.0, 1.0, 1.5, 3.0] {
                let metrics = Metrics {
                    win_rate,
                    point_factor,
                    avg_profit: 10.0,
                    avg_loss: -20.0,
                    total_trades: 700.0,
                    ..Metrics::default()
                };
                let response = generate_coach(&metrics, &[insight.clone()], "revenge");
                assert!((1..=3).contains(&response.optimization_suggestions.len()));
                assert!((2..=3).contains(&response.future_bias_triggers.len()));
                assert_eq!(response.coaching_prompts.len(), 3);
            }
        }
    }
}
