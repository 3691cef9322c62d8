use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trade statistics supplied by the client. Anything missing or unusable is 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_trades: f64,
    pub win_rate: f64,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub point_factor: f64,
    pub total_pnl: f64,
}

impl Metrics {
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| map.get(*k))
                .map(coerce_number)
                .unwrap_or(0.0)
        };

        Self {
            total_trades: field(&["total_trades", "trade_count"]),
            win_rate: field(&["win_rate"]),
            avg_profit: field(&["avg_profit", "avg_win"]),
            avg_loss: field(&["avg_loss"]),
            point_factor: field(&["point_factor", "profit_factor"]),
            total_pnl: field(&["total_pnl", "total_profit_loss", "net_pnl"]),
        }
    }
}

fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    finite_or_zero(n)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Other,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Other,
        }
    }
}

/// A behavioral flag raised by the client-side journal analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    #[serde(skip)]
    pub severity: Severity,
    #[serde(rename = "severity")]
    pub severity_label: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
}

impl Insight {
    pub fn list_from_value(value: Option<&Value>) -> Vec<Insight> {
        let Some(Value::Array(items)) = value else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
                let severity_label = text("severity");
                Insight {
                    severity: severity_label
                        .as_deref()
                        .map(Severity::parse)
                        .unwrap_or(Severity::Other),
                    severity_label,
                    title: text("title"),
                    detail: text("detail").or_else(|| text("message")),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
    pub evidence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Aggressive,
    Balanced,
    Conservative,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Aggressive => "Aggressive",
            RiskTier::Balanced => "Balanced",
            RiskTier::Conservative => "Conservative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub score: f64,
    pub tier: RiskTier,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachResponse {
    pub summary: String,
    pub sentiment: SentimentResult,
    pub risk_profile: RiskProfile,
    pub optimization_suggestions: Vec<String>,
    pub future_bias_triggers: Vec<String>,
    pub coaching_prompts: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Parsed body of `POST /api/ai/coach`.
#[derive(Debug, Clone)]
pub struct CoachRequest {
    pub metrics: Metrics,
    pub insights: Vec<Insight>,
    pub trader_notes: String,
}

/// Parsed body of `POST /api/ai/chat`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub metrics: Metrics,
    pub insights: Vec<Insight>,
    pub trader_notes: String,
}

const MAX_HISTORY_TURNS: usize = 8;

impl CoachRequest {
    pub fn from_body(body: &serde_json::Map<String, Value>) -> Self {
        Self {
            metrics: Metrics::from_value(body.get("metrics")),
            insights: Insight::list_from_value(body.get("insights")),
            trader_notes: notes_from(body),
        }
    }
}

impl ChatRequest {
    /// Returns `None` when `message` is missing or blank.
    pub fn from_body(body: &serde_json::Map<String, Value>) -> Option<Self> {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())?
            .to_string();

        Some(Self {
            message,
            history: history_from(body.get("history")),
            metrics: Metrics::from_value(body.get("metrics")),
            insights: Insight::list_from_value(body.get("insights")),
            trader_notes: notes_from(body),
        })
    }
}

fn notes_from(body: &serde_json::Map<String, Value>) -> String {
    body.get("trader_notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Keeps the last few well-formed user/assistant turns.
fn history_from(value: Option<&Value>) -> Vec<ChatTurn> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let valid: Vec<ChatTurn> = items
        .iter()
        .filter_map(|item| {
            let role = item.get("role")?.as_str()?;
            let content = item.get("content")?.as_str()?.trim();
            if !matches!(role, "user" | "assistant") || content.is_empty() {
                return None;
            }
            Some(ChatTurn {
                role: role.to_string(),
                content: content.to_string(),
            })
        })
        .collect();
    let skip = valid.len().saturating_sub(MAX_HISTORY_TURNS);
    valid.into_iter().skip(skip).collect()
}
