use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::coach::{
    finite_or_zero, ChatRequest, ChatResponse, ChatTurn, CoachRequest, CoachResponse,
    RiskProfile, SentimentResult,
};
use crate::services::chat::respond;
use crate::services::coach::generate_coach;
use crate::services::llm_bridge::{coach_schema, Completion, CompletionPrompt, CompletionProvider};

const COACH_SYSTEM_PROMPT: &str = "You are a trading performance coach. You receive a trader's \
    metrics, flagged behavioral insights, free-text notes, and a rule-based baseline analysis. \
    Return a JSON object with a short summary, a sentiment read of the notes, a risk profile, \
    1-3 optimization suggestions, 1-3 future bias triggers, and 3-5 coaching prompts. Be \
    concrete and refer to the numbers provided.";

const CHAT_SYSTEM_PROMPT: &str = "You are a supportive, practical trading coach. Answer the \
    trader's question directly and concisely. Use the context below when it is relevant.";

/// Chooses between the completion provider and the rule-based generators.
pub struct Assistant {
    provider: Option<Arc<dyn CompletionProvider>>,
}

#[derive(Deserialize)]
struct CoachDraft {
    summary: String,
    sentiment: SentimentResult,
    risk_profile: RiskProfile,
    optimization_suggestions: Vec<String>,
    future_bias_triggers: Vec<String>,
    coaching_prompts: Vec<String>,
}

impl Assistant {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        match &provider {
            Some(p) => info!("AI endpoints will use {}", p.source()),
            None => info!("No completion provider configured; AI endpoints use heuristics"),
        }
        Self { provider }
    }

    pub async fn coach(&self, request: &CoachRequest) -> CoachResponse {
        let baseline = generate_coach(&request.metrics, &request.insights, &request.trader_notes);
        let Some(provider) = &self.provider else {
            return baseline;
        };

        let prompt = CompletionPrompt::Structured {
            system: COACH_SYSTEM_PROMPT.to_string(),
            input: json!({
                "metrics": request.metrics,
                "insights": request.insights,
                "trader_notes": request.trader_notes,
                "baseline": baseline,
            }),
            schema: coach_schema(),
        };

        match provider.complete(&prompt).await.and_then(|c| coach_from(c, provider.source())) {
            Ok(response) => response,
            Err(e) => {
                warn!("Coach completion failed, using heuristic: {}", e);
                baseline
            }
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        if let Some(provider) = &self.provider {
            let context = json!({
                "metrics": request.metrics,
                "insights": request.insights,
                "trader_notes": request.trader_notes,
            });
            let mut turns = request.history.clone();
            turns.push(ChatTurn {
                role: "user".to_string(),
                content: request.message.clone(),
            });
            let prompt = CompletionPrompt::Conversation {
                system: format!("{CHAT_SYSTEM_PROMPT}\n\nContext: {context}"),
                turns,
            };

            match provider.complete(&prompt).await {
                Ok(Completion::Text(reply)) if !reply.trim().is_empty() => {
                    return ChatResponse {
                        reply,
                        source: provider.source(),
                    };
                }
                Ok(_) => warn!("Chat completion returned no usable text, using heuristic"),
                Err(e) => warn!("Chat completion failed, using heuristic: {}", e),
            }
        }

        respond(&request.message, &request.metrics, &request.trader_notes)
    }
}

/// Checks a structured completion has the coach response shape.
fn coach_from(completion: Completion, source: String) -> Result<CoachResponse, AppError> {
    let Completion::Structured(value) = completion else {
        return Err(AppError::ExternalService("expected a structured completion".into()));
    };
    let draft: CoachDraft = serde_json::from_value(value)
        .map_err(|e| AppError::ExternalService(format!("malformed coach response: {e}")))?;

    let clean = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    let optimization_suggestions = clean(draft.optimization_suggestions);
    let future_bias_triggers = clean(draft.future_bias_triggers);
    let coaching_prompts = clean(draft.coaching_prompts);

    if draft.summary.trim().is_empty()
        || !(1..=3).contains(&optimization_suggestions.len())
        || !(1..=3).contains(&future_bias_triggers.len())
        || !(3..=5).contains(&coaching_prompts.len())
    {
        return Err(AppError::ExternalService(
            "coach response is outside the expected shape".into(),
        ));
    }

    let mut sentiment = draft.sentiment;
    sentiment.score = bounded(sentiment.score, 1.0);
    let mut risk_profile = draft.risk_profile;
    risk_profile.score = bounded(risk_profile.score, 100.0);

    Ok(CoachResponse {
        summary: draft.summary.trim().to_string(),
        sentiment,
        risk_profile,
        optimization_suggestions,
        future_bias_triggers,
        coaching_prompts,
        source,
    })
}

fn bounded(value: f64, max: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, max)
}
