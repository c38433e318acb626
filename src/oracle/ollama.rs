use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use schemars::schema_for;
use serde::Deserialize;
use serde_json::json;

use super::{ClauseOracle, OracleError, OracleInput, prompt};
use crate::config::Config;
use crate::processing::ClauseAnalysis;

/// Oracle backed by an Ollama-compatible `/api/generate` endpoint using structured outputs.
pub struct OllamaClauseOracle {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClauseOracle {
    /// Build a client for `base_url` that asks `model` for schema-constrained JSON.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        request_timeout: Duration,
    ) -> Result<Self, OracleError> {
        let http = Client::builder()
            .user_agent("tc-analyzer/oracle")
            .timeout(request_timeout)
            .build()
            .map_err(|error| {
                OracleError::Unavailable(format!("failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Build the oracle from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, OracleError> {
        Self::new(
            config.ollama_url.clone(),
            config.llm_model_name.clone(),
            config.llm_temperature,
            Duration::from_secs(config.llm_request_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl ClauseOracle for OllamaClauseOracle {
    async fn invoke(&self, input: &OracleInput) -> Result<ClauseAnalysis, OracleError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt::render(input),
            "stream": false,
            "format": schema_for!(ClauseAnalysis),
            "options": {
                "temperature": self.temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                OracleError::Unavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OracleError::Unavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            OracleError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(OracleError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        serde_json::from_str(body.response.trim()).map_err(|error| {
            OracleError::InvalidResponse(format!("answer does not match the clause schema: {error}"))
        })
    }
}
