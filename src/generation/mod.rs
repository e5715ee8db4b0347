//! Generation step
//!
//! The retrieval core hands its answer to a [`Generator`]. The production
//! implementation talks to a local Ollama server; tests substitute their own.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::errors::{KbqaError, Result};

/// Turns a prompt into text
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Human-readable backend name for display
    fn name(&self) -> String;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Non-streaming client for `POST /api/generate`
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Self::new(
            format!("http://{}:{}", config.host, config.port),
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_sec),
        )
    }

    /// Check if the Ollama server is reachable
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .is_ok()
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "generate");

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(KbqaError::Generation(format!(
                "Ollama API error: {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response.trim().to_string())
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

/// Run `generator` behind a spinner when `show_progress` is set
pub async fn generate_with_progress(
    generator: &dyn Generator,
    prompt: &str,
    show_progress: bool,
) -> Result<String> {
    if !show_progress {
        return generator.generate(prompt).await;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Generating with {}...", generator.name()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = generator.generate(prompt).await;
    pb.finish_and_clear();
    result
}
