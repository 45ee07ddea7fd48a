use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};

use cookbook_core::generate::RecipeGenerator;

use crate::config::Config;

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Gemini { key: String, model: String },
    OpenAi { key: String, model: String },
}

impl Provider {
    /// Pick a provider from the environment, then the saved key file.
    /// Gemini wins when both are configured.
    pub fn detect(config: &Config) -> Result<Option<Self>> {
        if let Some(key) = env_value("GEMINI_API_KEY") {
            return Ok(Some(Self::gemini(key)));
        }
        if let Some(key) = config.load_generation_key()? {
            return Ok(Some(Self::gemini(key)));
        }
        Ok(env_value("OPENAI_API_KEY").map(|key| Provider::OpenAi {
            key,
            model: env_value("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        }))
    }

    fn gemini(key: String) -> Self {
        Provider::Gemini {
            key,
            model: env_value("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "gemini",
            Provider::OpenAi { .. } => "openai",
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct GenerationClient {
    client: reqwest::Client,
    provider: Provider,
}

impl GenerationClient {
    pub fn new(provider: Provider) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "cookbook-cli/{} (recipe manager)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, provider })
    }

    /// `None` when no API key is configured anywhere.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        Provider::detect(config)?.map(Self::new).transpose()
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Send one prompt and return the raw text reply.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        match &self.provider {
            Provider::Gemini { key, model } => self.complete_gemini(key, model, prompt).await,
            Provider::OpenAi { key, model } => self.complete_openai(key, model, prompt).await,
        }
    }

    async fn complete_gemini(&self, key: &str, model: &str, prompt: &str) -> Result<String> {
        tracing::debug!(model, "sending gemini request");
        let resp = self
            .client
            .post(format!("{GEMINI_URL}/{model}:generateContent"))
            .query(&[("key", key)])
            .json(&gemini_request_body(prompt))
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read Gemini response")?;
        if !status.is_success() {
            bail!(api_error_message(status, &body));
        }

        let data: Value =
            serde_json::from_str(&body).context("Failed to parse Gemini response")?;
        gemini_reply(&data)
    }

    async fn complete_openai(&self, key: &str, model: &str, prompt: &str) -> Result<String> {
        tracing::debug!(model, "sending openai request");
        let resp = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(key)
            .json(&openai_request_body(model, prompt))
            .send()
            .await
            .context("Failed to reach the OpenAI API")?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read OpenAI response")?;
        if !status.is_success() {
            bail!(api_error_message(status, &body));
        }

        let data: Value =
            serde_json::from_str(&body).context("Failed to parse OpenAI response")?;
        openai_reply(&data)
    }
}

impl RecipeGenerator for GenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(prompt).await
    }
}

pub fn gemini_request_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
        }
    })
}

pub fn openai_request_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": MAX_OUTPUT_TOKENS,
        "temperature": TEMPERATURE,
    })
}

/// First candidate's text from a `generateContent` response.
pub fn gemini_reply(data: &Value) -> Result<String> {
    let text = data
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid response from API"))?;
    Ok(text.trim().to_string())
}

pub fn openai_reply(data: &Value) -> Result<String> {
    let text = data
        .pointer("/choices/0/message/content")
        .or_else(|| data.pointer("/choices/0/text"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid response from API"))?;
    Ok(text.trim().to_string())
}

/// Turn a failed provider response into something a user can act on.
pub fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    };

    let error = &data["error"];
    let message = error["message"].as_str().unwrap_or("Failed to generate recipe");
    let code = error["status"]
        .as_str()
        .or_else(|| error["code"].as_str())
        .unwrap_or_default();

    let bad_key = (code == "INVALID_ARGUMENT" && message.contains("API key"))
        || code == "invalid_api_key"
        || status == reqwest::StatusCode::UNAUTHORIZED;
    if bad_key {
        return "Invalid API key. Please check your API key and try again.".to_string();
    }
    if code == "RESOURCE_EXHAUSTED"
        || code == "insufficient_quota"
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    {
        return "API quota exceeded. Please check your account billing.".to_string();
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_gemini_request_body_shape() {
        let body = gemini_request_body("soup");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "soup");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2000);
    }

    #[test]
    fn test_openai_request_body_shape() {
        let body = openai_request_body("gpt-4o-mini", "soup");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "soup");
    }

    #[test]
    fn test_gemini_reply_extracts_text() {
        let data = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  {\"title\":\"Soup\"}\n" }] } }]
        });
        assert_eq!(gemini_reply(&data).unwrap(), "{\"title\":\"Soup\"}");
    }

    #[test]
    fn test_gemini_reply_missing_candidates() {
        let err = gemini_reply(&json!({ "candidates": [] })).unwrap_err();
        assert_eq!(err.to_string(), "Invalid response from API");
    }

    #[test]
    fn test_openai_reply_variants() {
        let chat = json!({ "choices": [{ "message": { "content": "hello" } }] });
        assert_eq!(openai_reply(&chat).unwrap(), "hello");

        let legacy = json!({ "choices": [{ "text": "hi" }] });
        assert_eq!(openai_reply(&legacy).unwrap(), "hi");

        assert!(openai_reply(&json!({})).is_err());
    }

    #[test]
    fn test_api_error_invalid_key() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            api_error_message(StatusCode::BAD_REQUEST, body),
            "Invalid API key. Please check your API key and try again."
        );
    }

    #[test]
    fn test_api_error_quota() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            api_error_message(StatusCode::TOO_MANY_REQUESTS, body),
            "API quota exceeded. Please check your account billing."
        );
    }

    #[test]
    fn test_api_error_passes_message_through() {
        let body = r#"{"error":{"message":"Model not found","status":"NOT_FOUND"}}"#;
        assert_eq!(
            api_error_message(StatusCode::NOT_FOUND, body),
            "Model not found"
        );
    }

    #[test]
    fn test_api_error_non_json_body() {
        assert_eq!(
            api_error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "HTTP 502: Bad Gateway"
        );
    }

    #[test]
    fn test_provider_names() {
        let gemini = Provider::Gemini {
            key: "k".into(),
            model: DEFAULT_GEMINI_MODEL.into(),
        };
        let openai = Provider::OpenAi {
            key: "k".into(),
            model: DEFAULT_OPENAI_MODEL.into(),
        };
        assert_eq!(gemini.name(), "gemini");
        assert_eq!(openai.name(), "openai");
    }
}
