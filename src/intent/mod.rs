// src/intent/mod.rs
// Intent Classifier: routes an incoming turn to search / inquiry / chat,
// plus CJK-ratio language detection. System and user prompt wording is
// grounded verbatim in the reference intention-detection module.

use std::sync::Arc;

use crate::error::LlmError;
use crate::llm::{ChatOptions, LlmProvider, Message, ResponseFormat};
use crate::model::{IntentAnalysis, Intent, LanguageDetection};

pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
}

const SYSTEM_PROMPT: &str = r#"You are an intent classifier for a conversational search assistant. Classify the user's message into exactly one of:

- "search": the user is describing criteria to find people (skills, location, role, availability). Explicit search verbs ("find", "looking for", "寻找") bias toward this intent.
- "inquiry": the user is asking a follow-up question about a specific, previously-referenced person. A pronoun referring to someone already shown ("him", "her", "this person", "这个人", "他") combined with a referenced user in context biases toward this intent.
- "casual": the user wants to do a casual social activity with someone else (e.g. hike, grab coffee, watch a movie, "看电影"). Social activity verbs bias toward this intent.
- "chat": anything else -- greetings, small talk, or requests too vague to act on.

Respond in JSON: {"intent": "search"|"inquiry"|"casual"|"chat", "confidence": 0.0-1.0, "reasoning": "...", "clarification_needed": bool, "uncertainty_reason": "..."}"#;

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn analyze(
        &self,
        user_input: &str,
        referenced_user: Option<&str>,
        current_user: Option<&str>,
    ) -> IntentAnalysis {
        if user_input.trim().is_empty() {
            return IntentAnalysis {
                intent: Intent::Chat,
                confidence: 0.5,
                reasoning: "empty utterance".to_string(),
                clarification_needed: true,
                uncertainty_reason: "no message content was provided".to_string(),
            };
        }

        let mut user_prompt = format!("Message: {}\n\n", user_input);
        if let Some(referenced) = referenced_user {
            user_prompt.push_str(&format!(
                "A user was referenced earlier in this conversation: {}. If this message asks a follow-up question about them, classify as \"inquiry\".\n",
                referenced
            ));
        }
        if let Some(current) = current_user {
            user_prompt.push_str(&format!(
                "The current user's own profile: {}. If the message describes search criteria, classify as \"search\".\n",
                current
            ));
        }
        user_prompt.push_str("If the message is unclear or general, classify as \"chat\".");

        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(user_prompt)];
        let options = ChatOptions {
            temperature: Some(0.1),
            max_tokens: Some(500),
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        };

        match self.llm.json_chat(messages, options).await {
            Ok(value) => Self::parse_result(value),
            Err(e) => Self::fallback(e),
        }
    }

    fn parse_result(value: serde_json::Value) -> IntentAnalysis {
        let intent = match value["intent"].as_str().unwrap_or("chat") {
            "search" => Intent::Search,
            "inquiry" => Intent::Inquiry,
            "casual" => Intent::Casual,
            _ => Intent::Chat,
        };
        let confidence = value["confidence"].as_f64().unwrap_or(0.3) as f32;
        let confidence = confidence.clamp(0.0, 1.0);

        IntentAnalysis {
            intent,
            confidence,
            reasoning: value["reasoning"].as_str().unwrap_or_default().to_string(),
            clarification_needed: value["clarification_needed"].as_bool().unwrap_or(false),
            uncertainty_reason: value["uncertainty_reason"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// On any classifier failure, default to chat with low confidence and
    /// flag that clarification is needed -- never fail the turn outright.
    fn fallback(error: LlmError) -> IntentAnalysis {
        IntentAnalysis {
            intent: Intent::Chat,
            confidence: 0.3,
            reasoning: format!("intent analysis failed: {error}. defaulting to chat intent."),
            clarification_needed: true,
            uncertainty_reason: "LLM analysis unavailable, please try again".to_string(),
        }
    }
}

/// CJK-character-ratio language detector. `total_chars == 0` returns a
/// neutral ("zh", 0.5); otherwise a ratio above 0.2 favors Chinese,
/// confidence capped at 0.9 either way.
pub fn detect_language(text: &str) -> LanguageDetection {
    let non_whitespace_chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if non_whitespace_chars == 0 {
        return LanguageDetection {
            language: "zh".to_string(),
            confidence: 0.5,
        };
    }

    let chinese_chars = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let chinese_ratio = chinese_chars as f32 / non_whitespace_chars as f32;

    if chinese_ratio > 0.2 {
        LanguageDetection {
            language: "zh".to_string(),
            confidence: (0.5 + chinese_ratio).min(0.9),
        }
    } else {
        LanguageDetection {
            language: "en".to_string(),
            confidence: (0.5 + (1.0 - chinese_ratio)).min(0.9),
        }
    }
}
