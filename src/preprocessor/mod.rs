// src/preprocessor/mod.rs
// Query Preprocessor: turns a raw user utterance into a dense-optimized
// search query plus a structured filter set, via two concurrent LLM calls.
// Neither call cancels the other on failure -- a failed filter extraction
// still yields a usable dense query, and vice versa.

use std::sync::Arc;

use crate::llm::{ChatOptions, LlmProvider, Message, ResponseFormat};
use crate::vectorstore::SearchFilter;

const DENSE_QUERY_SYSTEM_PROMPT: &str = r#"Rewrite the user's request into a natural-language search query optimized for dense semantic retrieval of people profiles. Follow these principles:
1. Use natural, descriptive language rather than a keyword list.
2. Emphasize character traits, skills, and personality alongside technical qualifications.
3. Balance technical and personal qualities.
4. Be specific rather than complex.
5. Keep it human and relevant to the original request.

Reply with the rewritten query only, no preamble."#;

const FILTER_SYSTEM_PROMPT: &str = r#"Extract structured search filters from the user's request. Only these fields are filterable: gender, age_range (min, max), current_university, province_id, city_id, project_count_min, institution_count_min. Return an empty JSON object if no filters apply. Reply in JSON."#;

const SPARSE_TAGS_SYSTEM_PROMPT: &str = r#"Extract precise keyword tags from the user's request: skills, roles, tools, companies, and locations. Return them as a single space-separated string of tokens, in the same language as the request, with no other text."#;

const CASUAL_ACTIVITY_SYSTEM_PROMPT: &str = r#"Rewrite the user's request into a short description of the activity they want a partner for (e.g. hiking, grabbing coffee, watching a movie) and, if mentioned, when and where. This is for matching against other people's activity requests, not for finding a person by skills or profile. Follow these principles:
1. Name the concrete activity type first.
2. Carry over any time, place, or preference details mentioned.
3. Use natural, descriptive language rather than a keyword list.
4. Keep it human and relevant to the original request.

Reply with the rewritten description only, no preamble."#;

pub struct QueryPreprocessor {
    llm: Arc<dyn LlmProvider>,
}

/// `dense_query` feeds the dense encoder; `sparse_query` feeds the sparse
/// encoder/term matcher. The two are produced by independent, concurrent
/// LLM calls and either can fall back to the raw utterance on its own.
pub struct PreprocessedQuery {
    pub dense_query: String,
    pub sparse_query: String,
    pub filter: SearchFilter,
}

impl QueryPreprocessor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn preprocess(&self, user_input: &str) -> PreprocessedQuery {
        let (dense_result, sparse_result, filter_result) = tokio::join!(
            self.optimize_dense_query(user_input),
            self.extract_sparse_tags(user_input),
            self.extract_filters(user_input)
        );

        PreprocessedQuery {
            dense_query: dense_result.unwrap_or_else(|_| user_input.to_string()),
            sparse_query: sparse_result.unwrap_or_else(|_| user_input.to_string()),
            filter: filter_result.unwrap_or_default(),
        }
    }

    /// Activity-partner framing for the casual-request pipeline -- distinct
    /// from `optimize_dense_query`'s person-search framing, since a casual
    /// request is matched against other activity requests, not profiles.
    /// Falls back to the raw utterance on LLM failure, like the rest of
    /// this component's outputs.
    pub async fn optimize_casual_query(&self, user_input: &str) -> String {
        let messages = vec![
            Message::system(CASUAL_ACTIVITY_SYSTEM_PROMPT),
            Message::user(user_input),
        ];
        let options = ChatOptions {
            temperature: Some(0.3),
            max_tokens: Some(150),
            ..Default::default()
        };
        match self.llm.chat(messages, options).await {
            Ok(response) => response.content.trim().to_string(),
            Err(_) => user_input.to_string(),
        }
    }

    async fn optimize_dense_query(&self, user_input: &str) -> Result<String, crate::error::LlmError> {
        let messages = vec![
            Message::system(DENSE_QUERY_SYSTEM_PROMPT),
            Message::user(user_input),
        ];
        let options = ChatOptions {
            temperature: Some(0.3),
            ..Default::default()
        };
        let response = self.llm.chat(messages, options).await?;
        Ok(response.content.trim().to_string())
    }

    async fn extract_sparse_tags(&self, user_input: &str) -> Result<String, crate::error::LlmError> {
        let messages = vec![
            Message::system(SPARSE_TAGS_SYSTEM_PROMPT),
            Message::user(user_input),
        ];
        let options = ChatOptions {
            temperature: Some(0.1),
            ..Default::default()
        };
        let response = self.llm.chat(messages, options).await?;
        Ok(response.content.trim().to_string())
    }

    async fn extract_filters(&self, user_input: &str) -> Result<SearchFilter, crate::error::LlmError> {
        let messages = vec![
            Message::system(FILTER_SYSTEM_PROMPT),
            Message::user(user_input),
        ];
        let options = ChatOptions {
            temperature: Some(0.1),
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        };
        let value = self.llm.json_chat(messages, options).await?;

        let mut filter = SearchFilter::default();
        if let Some(obj) = value.as_object() {
            for (key, v) in obj {
                if !v.is_null() {
                    filter.equals.insert(key.clone(), v.clone());
                }
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::ChatResponse;
    use crate::error::LlmError;

    struct StaticProvider {
        dense_reply: String,
        filter_reply: String,
    }

    #[async_trait]
    impl LlmProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn chat(
            &self,
            _messages: Vec<Message>,
            options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            let content = if options.response_format.is_some() {
                self.filter_reply.clone()
            } else {
                self.dense_reply.clone()
            };
            Ok(ChatResponse {
                content,
                model: "static".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }
    }

    #[tokio::test]
    async fn preprocess_combines_both_calls() {
        let provider = StaticProvider {
            dense_reply: "an experienced rust engineer who enjoys hiking".to_string(),
            filter_reply: "{\"city_id\": 110000}".to_string(),
        };
        let preprocessor = QueryPreprocessor::new(Arc::new(provider));
        let result = preprocessor.preprocess("rust devs in beijing").await;
        assert!(result.dense_query.contains("rust"));
        assert_eq!(result.filter.equals.get("city_id").unwrap(), &serde_json::json!(110000));
    }

    #[tokio::test]
    async fn falls_back_to_raw_input_when_dense_call_unparsable_but_filter_ok() {
        struct FailingDenseProvider;
        #[async_trait]
        impl LlmProvider for FailingDenseProvider {
            fn name(&self) -> &'static str {
                "failing"
            }
            async fn chat(
                &self,
                _messages: Vec<Message>,
                options: ChatOptions,
            ) -> Result<ChatResponse, LlmError> {
                if options.response_format.is_some() {
                    Ok(ChatResponse {
                        content: "{}".to_string(),
                        model: "x".to_string(),
                        prompt_tokens: 0,
                        completion_tokens: 0,
                    })
                } else {
                    Err(LlmError::Unavailable("down".to_string()))
                }
            }
        }

        let preprocessor = QueryPreprocessor::new(Arc::new(FailingDenseProvider));
        let result = preprocessor.preprocess("rust devs").await;
        assert_eq!(result.dense_query, "rust devs");
    }

    #[tokio::test]
    async fn casual_query_uses_activity_framing_not_person_search_framing() {
        struct RecordingProvider;
        #[async_trait]
        impl LlmProvider for RecordingProvider {
            fn name(&self) -> &'static str {
                "recording"
            }
            async fn chat(
                &self,
                messages: Vec<Message>,
                _options: ChatOptions,
            ) -> Result<ChatResponse, LlmError> {
                let system = messages
                    .iter()
                    .find(|m| m.role == "system")
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                assert!(system.contains("activity they want a partner for"));
                assert!(!system.contains("dense semantic retrieval"));
                Ok(ChatResponse {
                    content: "watching movies this weekend".to_string(),
                    model: "recording".to_string(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                })
            }
        }

        let preprocessor = QueryPreprocessor::new(Arc::new(RecordingProvider));
        let result = preprocessor
            .optimize_casual_query("anyone want to hang out and see a movie?")
            .await;
        assert_eq!(result, "watching movies this weekend");
    }

    #[tokio::test]
    async fn casual_query_falls_back_to_raw_input_on_llm_failure() {
        struct FailingProvider;
        #[async_trait]
        impl LlmProvider for FailingProvider {
            fn name(&self) -> &'static str {
                "failing"
            }
            async fn chat(
                &self,
                _messages: Vec<Message>,
                _options: ChatOptions,
            ) -> Result<ChatResponse, LlmError> {
                Err(LlmError::Unavailable("down".to_string()))
            }
        }

        let preprocessor = QueryPreprocessor::new(Arc::new(FailingProvider));
        let result = preprocessor.optimize_casual_query("anyone up for coffee?").await;
        assert_eq!(result, "anyone up for coffee?");
    }
}
