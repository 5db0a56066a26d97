//! OpenAI-compatible chat-completions provider.
//!
//! Speaks `/chat/completions` against any OpenAI-compatible endpoint, asking
//! for a strict-JSON quote object. Exclusion lists are embedded into the user
//! prompt as negative constraints; a randomized theme diversifies output
//! between calls (a quality heuristic, not a correctness requirement).

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ProviderError, QuoteProvider};
use crate::config;
use crate::dedup::Exclusions;
use crate::model::{Quote, PLACEHOLDER_AUTHOR};

const THEMES: &[&str] = &[
    "Self-worth and radical self-love",
    "Courage to break patterns",
    "Resilience and overcoming hardship",
    "Leadership and ambition",
    "Solidarity and lifting each other up",
    "Independence and freedom",
    "Inner strength",
    "Joy of living and daring",
];

pub struct ChatCompletionsProvider {
    name: String,
    http: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsProvider {
    pub fn new(name: &str, cfg: &config::Provider, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("tg-quotebot/0.1")
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            name: name.to_string(),
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        }
    }

    /// Build the chat-completions body for one attempt.
    fn build_body(&self, exclusions: &Exclusions, theme: &str, seed: u32) -> Value {
        let authors: Vec<&str> = exclusions.authors.iter().collect();
        let quotes: Vec<&str> = exclusions.quotes.iter().collect();

        let mut user = format!(
            "Task: write one short, original, inspirational quote.\n\
             Theme: {theme}\nSeed: {seed}\n"
        );
        if !authors.is_empty() {
            user.push_str(&format!(
                "Do not attribute the quote to any of these already-used authors: {}.\n",
                authors.join(", ")
            ));
        }
        if !quotes.is_empty() {
            user.push_str(&format!(
                "Do not repeat or closely paraphrase any of these already-used quotes: {}.\n",
                quotes.join(" | ")
            ));
        }
        user.push_str(
            "Requirements: 1) at most two sentences; 2) attribute it to a real notable woman \
             with a coherent role and country; 3) respond with valid JSON only.",
        );

        json!({
            "model": self.model,
            "temperature": 0.9,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "inspiration_quote",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": {
                            "quote": { "type": "string" },
                            "author": { "type": "string" },
                            "role": { "type": "string" },
                            "country": { "type": "string" }
                        },
                        "required": ["quote", "author", "role", "country"],
                        "additionalProperties": false
                    }
                }
            },
            "messages": [
                {
                    "role": "system",
                    "content": "You are a ghostwriter of short, powerful inspirational quotes. \
                                Stay authentic, avoid cliches, and never repeat or rephrase \
                                content you were told was already used."
                },
                { "role": "user", "content": user }
            ]
        })
    }
}

#[async_trait]
impl QuoteProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, exclusions: &Exclusions) -> Result<Quote, ProviderError> {
        let (theme, seed) = {
            let mut rng = rand::thread_rng();
            let theme = THEMES.choose(&mut rng).copied().unwrap_or(THEMES[0]);
            let seed: u32 = rng.gen_range(0..1_000_000);
            (theme, seed)
        };

        let body = self.build_body(exclusions, theme, seed);
        debug!(provider = %self.name, theme, "requesting candidate quote");

        let res = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Failed(format!("transport error: {err}")))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(provider = %self.name, %status, "provider returned error");
            if is_quota_error(status, &text) {
                return Err(ProviderError::Quota(format!(
                    "{} returned {status}: {text}",
                    self.name
                )));
            }
            return Err(ProviderError::Failed(format!(
                "{} returned {status}: {text}",
                self.name
            )));
        }

        let payload: ChatCompletionsResponse = res
            .json()
            .await
            .map_err(|err| ProviderError::Failed(format!("invalid response JSON: {err}")))?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Failed("empty completion".into()))?;

        parse_quote_content(&content)
    }
}

/// Quota/rate exhaustion vs. a generic upstream error.
fn is_quota_error(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("insufficient_quota") || lower.contains("billing") || lower.contains("quota")
}

/// Parse the completion content into a [`Quote`]. Blank authors get the
/// placeholder attribution.
fn parse_quote_content(content: &str) -> Result<Quote, ProviderError> {
    let wire: WireQuote = serde_json::from_str(content.trim())
        .map_err(|err| ProviderError::Failed(format!("unparseable quote payload: {err}")))?;
    if wire.quote.trim().is_empty() {
        return Err(ProviderError::Failed("provider produced empty text".into()));
    }
    let author = wire.author.trim();
    Ok(Quote {
        text: wire.quote.trim().to_string(),
        author_name: if author.is_empty() {
            PLACEHOLDER_AUTHOR.to_string()
        } else {
            author.to_string()
        },
        author_role: wire.role.trim().to_string(),
        author_country: wire.country.trim().to_string(),
    })
}

#[derive(Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireQuote {
    quote: String,
    author: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(
            "primary",
            &config::Provider {
                api_base: "https://api.openai.com/v1/".into(),
                api_key: "sk-test".into(),
                model: "gpt-4o-mini".into(),
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn base_url_is_trimmed() {
        let p = provider();
        assert_eq!(p.api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn body_embeds_exclusions_as_negative_constraints() {
        let p = provider();
        let mut exclusions = Exclusions::default();
        exclusions.note(&Quote {
            text: "Wings beat fear.".into(),
            author_name: "Frida Kahlo".into(),
            author_role: "Painter".into(),
            author_country: "Mexico".into(),
        });

        let body = p.build_body(&exclusions, "Inner strength", 42);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["required"][0],
            "quote"
        );
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Frida Kahlo"));
        assert!(user.contains("Wings beat fear."));
        assert!(user.contains("Inner strength"));
    }

    #[test]
    fn body_omits_constraint_lines_when_lists_empty() {
        let p = provider();
        let body = p.build_body(&Exclusions::default(), "Joy of living and daring", 1);
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(!user.contains("already-used authors"));
        assert!(!user.contains("already-used quotes"));
    }

    #[test]
    fn quota_classification() {
        assert!(is_quota_error(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_quota_error(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":"insufficient_quota"}}"#
        ));
        assert!(is_quota_error(StatusCode::PAYMENT_REQUIRED, "billing hard limit"));
        assert!(!is_quota_error(StatusCode::INTERNAL_SERVER_ERROR, "oops"));
    }

    #[test]
    fn parse_quote_content_happy_path() {
        let q = parse_quote_content(
            r#"{"quote":" Walk tall. ","author":"Gabriela Mistral","role":"Poet","country":"Chile"}"#,
        )
        .unwrap();
        assert_eq!(q.text, "Walk tall.");
        assert_eq!(q.author_name, "Gabriela Mistral");
    }

    #[test]
    fn parse_quote_content_defaults_blank_author() {
        let q = parse_quote_content(
            r#"{"quote":"Walk tall.","author":"  ","role":"","country":""}"#,
        )
        .unwrap();
        assert_eq!(q.author_name, PLACEHOLDER_AUTHOR);
    }

    #[test]
    fn parse_quote_content_rejects_garbage() {
        assert!(parse_quote_content("not json").is_err());
        assert!(parse_quote_content(r#"{"quote":"","author":"x"}"#).is_err());
    }
}
