//! Agent backend speaking the OpenAI-compatible chat completions protocol.
//!
//! Ollama exposes the same protocol under `/v1`, so both providers share this client.

use std::time::Duration;

use async_trait::async_trait;
use gobuddy_core::config::{LlmConfig, LlmProvider};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::llm::{AgentClient, AgentError, AgentOutput, AgentRequest, ResponseFormat};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

pub struct OpenAiAgentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    fast_model: String,
}

impl OpenAiAgentClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| AgentError::Internal(format!("http client: {error}")))?;

        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match config.provider {
                LlmProvider::OpenAi => OPENAI_BASE_URL,
                LlmProvider::Ollama => OLLAMA_BASE_URL,
            }
            .to_owned()
        });

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            fast_model: config.fast_model.clone(),
        })
    }

    fn model_for(&self, request: &AgentRequest) -> &str {
        if request.role.uses_fast_model() {
            &self.fast_model
        } else {
            &self.model
        }
    }

    fn payload(&self, request: &AgentRequest) -> Value {
        let mut system = request.role.instructions().to_owned();
        if let Some(reference) = &request.reference {
            system.push_str("\n\nReference material:\n\n");
            system.push_str(reference);
        }

        let mut payload = json!({
            "model": self.model_for(request),
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": request.prompt},
            ],
        });
        if let Some(user_id) = &request.user_id {
            payload["user"] = json!(user_id);
        }
        if request.format == ResponseFormat::Json {
            payload["response_format"] = json!({"type": "json_object"});
        }
        payload
    }
}

fn classify_status(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("backend returned {status}: {body}");
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => AgentError::Unavailable(detail),
        _ => AgentError::Internal(detail),
    }
}

fn completion_content(response: &Value) -> Result<&str, AgentError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| AgentError::MalformedOutput("completion has no message content".to_owned()))
}

#[async_trait]
impl AgentClient for OpenAiAgentClient {
    #[instrument(skip(self, request), fields(agent = request.role.name(), prompt_len = request.prompt.len()))]
    async fn invoke(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let payload = self.payload(&request);

        let mut call = self.http.post(format!("{}/chat/completions", self.base_url)).json(&payload);
        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key.expose_secret());
        }

        let response =
            call.send().await.map_err(|error| AgentError::Unavailable(error.to_string()))?;
        let status = response.status();
        debug!(event_name = "agent.response", %status, "agent backend responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(event_name = "agent.failed", %status, body = %body, "agent backend call failed");
            return Err(classify_status(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| AgentError::MalformedOutput(error.to_string()))?;
        let content = completion_content(&body)?;

        match request.format {
            ResponseFormat::Text => Ok(AgentOutput::Text(content.to_owned())),
            ResponseFormat::Json => AgentOutput::Text(content.to_owned())
                .into_structured()
                .map(AgentOutput::Structured),
        }
    }
}
