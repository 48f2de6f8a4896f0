//! Client for the external text-generation service.
//!
//! Drafting assistance only: one request per call, no retry or backoff.  The
//! endpoint speaks the common chat-completions shape, so any compatible
//! provider can sit behind `AI_API_URL`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::ServerError;

const PARAGRAPH_PROMPT: &str = "You are an expert blog content creator.\n\n\
    Please generate a paragraph that is related to the following blog post title:\n\n\
    Title: {title}\n\nParagraph:";

const SUMMARY_PROMPT: &str = "Summarize the following blog post in a concise paragraph. \
    The summary should capture the main points and provide a quick overview of the \
    content.\n\nBlog Post:\n{content}";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct TextGenerator {
    http: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    model: String,
}

impl TextGenerator {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.ai_api_url.clone(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
        }
    }

    /// Generate a paragraph related to a draft post title.
    pub async fn generate_paragraph(&self, title: &str) -> Result<String, ServerError> {
        self.complete(&PARAGRAPH_PROMPT.replace("{title}", title)).await
    }

    /// Summarize a post body.
    pub async fn summarize(&self, content: &str) -> Result<String, ServerError> {
        self.complete(&SUMMARY_PROMPT.replace("{content}", content)).await
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServerError> {
        let url = self
            .api_url
            .as_deref()
            .ok_or_else(|| ServerError::Upstream("Text generation is not configured".into()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.http.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ServerError::Upstream(format!(
                "Service returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServerError::Upstream(format!("Malformed response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServerError::Upstream("Empty response".into()))?;

        debug!(chars = text.len(), "generated text");
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_generator_fails_upstream() {
        let generator = TextGenerator::new(&ServerConfig::default());
        let err = generator.generate_paragraph("A title").await.unwrap_err();
        assert!(matches!(err, ServerError::Upstream(_)));
    }

    #[test]
    fn prompts_embed_their_inputs() {
        assert!(PARAGRAPH_PROMPT.replace("{title}", "Rust").contains("Title: Rust"));
        assert!(SUMMARY_PROMPT.replace("{content}", "body text").ends_with("body text"));
    }

    #[test]
    fn chat_response_parses_expected_shape() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hello."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Hello.");
    }
}
