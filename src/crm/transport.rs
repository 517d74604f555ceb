use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use super::CrmError;
use crate::config::{WispHubSettings, CRM_REQUEST_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmMethod {
    Get,
    Post,
    Patch,
}

impl CrmMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrmMethod::Get => "GET",
            CrmMethod::Post => "POST",
            CrmMethod::Patch => "PATCH",
        }
    }
}

/// One CRM call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CrmRequest {
    pub method: CrmMethod,
    /// Starts with `/`, e.g. `/clientes/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl CrmRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: CrmMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: CrmMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: CrmMethod::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// CRM HTTP transport abstraction (allows mocking). One call, no retries.
pub trait CrmTransport {
    fn send(&self, request: &CrmRequest) -> Result<Value, CrmError>;
}

// ═══════════════════════════════════════════════════════════
// reqwest transport
// ═══════════════════════════════════════════════════════════

pub struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(settings: &WispHubSettings) -> Result<Self, CrmError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Api-Key {}", settings.api_token))
            .map_err(|e| CrmError::HttpClient(format!("Invalid API token header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::blocking::Client::builder()
            .timeout(CRM_REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| CrmError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl CrmTransport for HttpTransport {
    fn send(&self, request: &CrmRequest) -> Result<Value, CrmError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::info!(method = request.method.as_str(), %url, "WispHub request");

        let builder = match request.method {
            CrmMethod::Get => self.client.get(&url),
            CrmMethod::Post => self.client.post(&url),
            CrmMethod::Patch => self.client.patch(&url),
        };
        let builder = builder.query(&request.query);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                CrmError::Timeout
            } else if e.is_connect() {
                CrmError::Connection(self.base_url.clone())
            } else {
                CrmError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response.text().unwrap_or_default().chars().take(500).collect();
            tracing::error!(status = status.as_u16(), body = %body, "WispHub error response");
            return Err(CrmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| CrmError::ResponseParsing(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Scripted transport
// ═══════════════════════════════════════════════════════════

/// Test transport: answers from a route table and records every request.
/// A route with a query only matches requests carrying those exact pairs.
/// Unmatched requests fail with status 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<ScriptedRoute>,
    requests: Mutex<Vec<CrmRequest>>,
}

struct ScriptedRoute {
    method: CrmMethod,
    path: String,
    query: Option<Vec<(String, String)>>,
    response: Result<Value, u16>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, method: CrmMethod, path: &str, body: Value) -> Self {
        self.routes.push(ScriptedRoute {
            method,
            path: path.to_string(),
            query: None,
            response: Ok(body),
        });
        self
    }

    pub fn respond_query(
        mut self,
        method: CrmMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Value,
    ) -> Self {
        self.routes.push(ScriptedRoute {
            method,
            path: path.to_string(),
            query: Some(
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            response: Ok(body),
        });
        self
    }

    pub fn fail(mut self, method: CrmMethod, path: &str, status: u16) -> Self {
        self.routes.push(ScriptedRoute {
            method,
            path: path.to_string(),
            query: None,
            response: Err(status),
        });
        self
    }

    pub fn requests(&self) -> Vec<CrmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl CrmTransport for ScriptedTransport {
    fn send(&self, request: &CrmRequest) -> Result<Value, CrmError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        let route = self.routes.iter().find(|r| {
            r.method == request.method
                && r.path == request.path
                && r
                    .query
                    .as_ref()
                    .map_or(true, |q| q.iter().all(|pair| request.query.contains(pair)))
        });

        match route.map(|r| &r.response) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(CrmError::Status {
                status: *status,
                body: String::new(),
            }),
            None => Err(CrmError::Status {
                status: 404,
                body: "no scripted route".into(),
            }),
        }
    }
}
