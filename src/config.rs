use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "voucher-ocr";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,voucher_ocr=debug,hyper=warn,reqwest=warn"
}

pub const DEFAULT_PORT: u16 = 8085;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_VISION_MODEL: &str = "llava";
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";
pub const DEFAULT_WISPHUB_URL: &str = "https://api.wisphub.app/api";

/// Upload ceiling for a single receipt image.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// Model listing probe. Short so an absent Ollama fails fast.
pub const VISION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// One vision generation call.
pub const VISION_GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
/// One CRM request.
pub const CRM_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable service configuration, read once at startup and shared via `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub ollama_url: String,
    pub vision_model: String,
    pub tesseract_cmd: String,
    pub max_upload_bytes: usize,
    pub wisphub: WispHubSettings,
}

/// WispHub CRM credentials. An empty token means the CRM is not configured.
#[derive(Debug, Clone, PartialEq)]
pub struct WispHubSettings {
    pub base_url: String,
    pub api_token: String,
    pub company_id: String,
}

impl WispHubSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            tesseract_cmd: DEFAULT_TESSERACT_CMD.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            wisphub: WispHubSettings {
                base_url: DEFAULT_WISPHUB_URL.to_string(),
                api_token: String::new(),
                company_id: String::new(),
            },
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset, empty or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT").map(|v| v.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(_)) => {
                tracing::warn!("PORT is not a valid port number, using {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
            None => DEFAULT_PORT,
        };

        let max_upload_bytes = get("MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_upload_bytes);

        Self {
            port,
            ollama_url: get("OLLAMA_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_url),
            vision_model: get("VISION_MODEL").unwrap_or(defaults.vision_model),
            tesseract_cmd: get("TESSERACT_CMD").unwrap_or(defaults.tesseract_cmd),
            max_upload_bytes,
            wisphub: WispHubSettings {
                base_url: get("WISPHUB_API_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.wisphub.base_url),
                api_token: get("WISPHUB_API_TOKEN").unwrap_or_default(),
                company_id: get("WISPHUB_COMPANY_ID").unwrap_or_default(),
            },
        }
    }
}
