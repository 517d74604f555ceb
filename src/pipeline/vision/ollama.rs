use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::ollama_types::{GenerateResponse, TagsResponse, VisionGenerateRequest};
use super::VisionError;
use crate::config::{VISION_GENERATE_TIMEOUT, VISION_PROBE_TIMEOUT};

/// Vision model client abstraction (allows mocking).
pub trait VisionClient {
    /// Names of the locally installed models.
    fn list_models(&self) -> Result<Vec<String>, VisionError>;

    /// One non-streaming generation with images. Returns the raw model text.
    fn generate_with_images(&self, request: &VisionGenerateRequest) -> Result<String, VisionError>;
}

/// Ollama HTTP client for local vision inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    probe_timeout: Duration,
    generate_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, VisionError> {
        Self::with_timeouts(base_url, VISION_PROBE_TIMEOUT, VISION_GENERATE_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        probe_timeout: Duration,
        generate_timeout: Duration,
    ) -> Result<Self, VisionError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| VisionError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            probe_timeout,
            generate_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error, timeout: Duration) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout(timeout.as_secs())
        } else if e.is_connect() {
            VisionError::OllamaConnection(self.base_url.clone())
        } else {
            VisionError::HttpClient(e.to_string())
        }
    }
}

impl VisionClient for OllamaClient {
    fn list_models(&self) -> Result<Vec<String>, VisionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .map_err(|e| self.map_send_error(e, self.probe_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn generate_with_images(&self, request: &VisionGenerateRequest) -> Result<String, VisionError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(self.generate_timeout)
            .json(request)
            .send()
            .map_err(|e| self.map_send_error(e, self.generate_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Mock vision client for testing. Returns a configurable response and
/// counts generation calls.
pub struct MockVisionClient {
    response: String,
    available_models: Vec<String>,
    generate_calls: AtomicUsize,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            available_models: vec!["llava:latest".to_string()],
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

impl VisionClient for MockVisionClient {
    fn list_models(&self) -> Result<Vec<String>, VisionError> {
        Ok(self.available_models.clone())
    }

    fn generate_with_images(&self, _request: &VisionGenerateRequest) -> Result<String, VisionError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Vision client whose every call fails as if Ollama were down.
pub struct UnreachableVisionClient;

impl VisionClient for UnreachableVisionClient {
    fn list_models(&self) -> Result<Vec<String>, VisionError> {
        Err(VisionError::OllamaConnection("http://localhost:11434".into()))
    }

    fn generate_with_images(&self, _request: &VisionGenerateRequest) -> Result<String, VisionError> {
        Err(VisionError::OllamaConnection("http://localhost:11434".into()))
    }
}
