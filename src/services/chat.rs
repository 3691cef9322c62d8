use std::collections::HashSet;

use crate::models::coach::{finite_or_zero, ChatResponse, Metrics};
use crate::services::coach::HEURISTIC_SOURCE;
use crate::services::sentiment::{analyze_sentiment, tokenize};

const ECHO_LIMIT: usize = 120;

struct ReplyRule {
    keywords: &'static [&'static str],
    reply: &'static str,
}

/// Checked in order; the first group with a matching word answers.
const REPLY_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["loss", "losses", "losing", "lose", "lost", "drawdown", "drawdowns"],
        reply: "Loss control first: cap risk per trade at a fixed fraction of equity, set a daily \
                loss limit, and stop trading for the session once it is hit.",
    },
    ReplyRule {
        keywords: &["win", "wins", "winning", "improve", "improving", "better", "profit", "profitable"],
        reply: "To improve results, review your best setups and repeat what worked: same entry \
                conditions, same size, same exit plan. Cut the setups with the weakest expectancy.",
    },
    ReplyRule {
        keywords: &["risk", "size", "sizing", "position", "leverage", "stop", "stops"],
        reply: "On risk and sizing: size positions from the stop distance so every trade risks the \
                same amount, and avoid adding leverage after a losing streak.",
    },
    ReplyRule {
        keywords: &["emotion", "emotions", "emotional", "feel", "feeling", "tilt", "fear", "stress", "stressed", "anxious", "angry", "frustrated"],
        reply: "Emotions are data, not signals. When you notice stress or tilt, step away for ten \
                minutes, write down what you feel, and only return once you can follow the plan.",
    },
    ReplyRule {
        keywords: &["strategy", "plan", "setup", "setups", "system", "edge", "entry", "exit"],
        reply: "Write the strategy down as explicit rules: entry trigger, invalidation, target, and \
                size. Only trade setups that meet every rule, and journal any deviation.",
    },
    ReplyRule {
        keywords: &["confidence", "confident", "discipline", "disciplined", "consistent", "consistency", "focus"],
        reply: "Discipline comes from small, repeatable routines: a pre-market checklist, a fixed \
                trade limit, and a short review after every session.",
    },
];

const GENERAL_KNOWLEDGE: &[&str] = &["weather", "movie", "recipe", "history", "math", "code"];

const GENERAL_KNOWLEDGE_REPLY: &str = "That question goes beyond trading coaching. Full \
    general-purpose answers need the external model, which is not available right now; I can \
    still help with your metrics, risk, and trading mindset.";

/// Rule-based chat reply with the caller's live metrics appended.
pub fn respond(message: &str, metrics: &Metrics, trader_notes: &str) -> ChatResponse {
    let words: HashSet<String> = tokenize(message).into_iter().collect();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| words.contains(*k));

    let reply = if mentions(GENERAL_KNOWLEDGE) {
        GENERAL_KNOWLEDGE_REPLY.to_string()
    } else {
        REPLY_RULES
            .iter()
            .find(|rule| mentions(rule.keywords))
            .map(|rule| rule.reply.to_string())
            .unwrap_or_else(|| fallback_reply(message))
    };

    let sentiment = analyze_sentiment(trader_notes);
    ChatResponse {
        reply: format!(
            "{reply} Context: win rate {:.1}%, point factor {:.2}, sentiment {}.",
            finite_or_zero(metrics.win_rate),
            finite_or_zero(metrics.point_factor),
            sentiment.label.as_str()
        ),
        source: HEURISTIC_SOURCE.to_string(),
    }
}

fn fallback_reply(message: &str) -> String {
    let echoed: String = message.chars().take(ECHO_LIMIT).collect();
    format!(
        "You asked: \"{echoed}\". Rule-based guidance: keep risk per trade fixed, journal every \
         setup, and work on your weakest metric first."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(message: &str) -> String {
        respond(message, &Metrics::default(), "").reply
    }

    #[test]
    fn loss_question_gets_loss_control_template() {
        let metrics = Metrics {
            win_rate: 42.26,
            point_factor: 0.876,
            ..Metrics::default()
        };
        let response = respond("I keep losing money", &metrics, "panic and fear");
        assert!(response.reply.starts_with("Loss control first:"));
        assert!(response
            .reply
            .ends_with("Context: win rate 42.3%, point factor 0.88, sentiment negative."));
        assert_eq!(response.source, "heuristic");
    }

    #[test]
    fn groups_are_priority_ordered() {
        // "loss" outranks "risk"
        assert!(reply("How much risk after a loss?").starts_with("Loss control first:"));
        assert!(reply("How do I improve my sizing?").starts_with("To improve results"));
        assert!(reply("What position size?").starts_with("On risk and sizing"));
        assert!(reply("I feel tilt today").starts_with("Emotions are data"));
        assert!(reply("Review my strategy").starts_with("Write the strategy down"));
        assert!(reply("How to stay disciplined?").starts_with("Discipline comes from"));
    }

    #[test]
    fn matches_whole_words_only() {
        // "close" contains "lose" but is not a loss keyword.
        assert!(reply("When should I close?").starts_with("You asked:"));
    }

    #[test]
    fn general_knowledge_overrides_trading_match() {
        let text = reply("Can you write code to reduce my losses?");
        assert!(text.starts_with("That question goes beyond trading coaching."));
    }

    #[test]
    fn fallback_echoes_message_as_sent() {
        let text = reply("  when do I close?");
        assert!(text.starts_with("You asked: \"  when do I close?\"."));
    }

    #[test]
    fn fallback_echoes_at_most_120_chars() {
        let long = "x".repeat(300);
        let text = reply(&long);
        let echoed = format!("\"{}\"", "x".repeat(120));
        assert!(text.contains(&echoed));
        assert!(!text.contains(&"x".repeat(121)));
        assert!(text.ends_with("Context: win rate 0.0%, point factor 0.00, sentiment neutral."));
    }
}
