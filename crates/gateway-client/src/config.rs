//! Configuration for the gateway client.

use std::env;
use std::time::Duration;

use consulta_core::{GatewayError, GenerationKind, Section};
use secrecy::{ExposeSecret, SecretString};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to the consultation gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway API, without trailing slash.
    pub base_url: String,
    /// Bearer token sent to the gateway.
    api_token: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Webhook the gateway forwards AI edit instructions to.
    pub ai_edit_webhook_url: Option<String>,
    /// Webhook that starts diagnosis generation.
    pub diagnosis_webhook_url: Option<String>,
    /// Webhook that starts solution generation.
    pub solution_webhook_url: Option<String>,
}

impl GatewayConfig {
    /// Create a configuration for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ai_edit_webhook_url: None,
            diagnosis_webhook_url: None,
            solution_webhook_url: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `CONSULTAS_API_URL` - gateway base URL
    ///
    /// Optional:
    /// - `CONSULTAS_API_TOKEN` - bearer token
    /// - `CONSULTAS_HTTP_TIMEOUT_SECS` - default: 30
    /// - `CONSULTAS_AI_EDIT_WEBHOOK_URL`
    /// - `CONSULTAS_DIAGNOSIS_WEBHOOK_URL`
    /// - `CONSULTAS_SOLUTION_WEBHOOK_URL`
    pub fn from_env() -> Result<Self, GatewayError> {
        let base_url = env::var("CONSULTAS_API_URL")
            .map_err(|_| GatewayError::Configuration("CONSULTAS_API_URL not set".to_string()))?;

        let timeout_secs = match env::var("CONSULTAS_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                GatewayError::Configuration(format!("Invalid CONSULTAS_HTTP_TIMEOUT_SECS: {}", e))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let mut config = Self::new(base_url).with_timeout(Duration::from_secs(timeout_secs));
        config.api_token = non_empty_var("CONSULTAS_API_TOKEN").map(SecretString::from);
        config.ai_edit_webhook_url = non_empty_var("CONSULTAS_AI_EDIT_WEBHOOK_URL");
        config.diagnosis_webhook_url = non_empty_var("CONSULTAS_DIAGNOSIS_WEBHOOK_URL");
        config.solution_webhook_url = non_empty_var("CONSULTAS_SOLUTION_WEBHOOK_URL");

        Ok(config)
    }

    /// Builder method to set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ai_edit_webhook(mut self, url: impl Into<String>) -> Self {
        self.ai_edit_webhook_url = Some(url.into());
        self
    }

    pub fn with_diagnosis_webhook(mut self, url: impl Into<String>) -> Self {
        self.diagnosis_webhook_url = Some(url.into());
        self
    }

    pub fn with_solution_webhook(mut self, url: impl Into<String>) -> Self {
        self.solution_webhook_url = Some(url.into());
        self
    }

    /// Get the bearer token (exposes the secret).
    pub(crate) fn token(&self) -> Option<&str> {
        self.api_token.as_ref().map(|t| t.expose_secret())
    }

    pub fn has_token(&self) -> bool {
        self.api_token.is_some()
    }

    /// Consultation collection endpoint.
    pub fn consultations_url(&self) -> String {
        format!("{}/consultations", self.base_url)
    }

    /// Single consultation endpoint.
    pub fn consultation_url(&self, id: &str) -> String {
        format!("{}/consultations/{}", self.base_url, urlencoding::encode(id))
    }

    /// Read endpoint of a clinical section.
    pub fn section_url(&self, id: &str, section: Section) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            section.resource(),
            urlencoding::encode(id)
        )
    }

    /// Field update endpoint of a clinical section.
    pub fn update_field_url(&self, id: &str, section: Section) -> String {
        format!("{}/update-field", self.section_url(id, section))
    }

    /// Patient record endpoint.
    pub fn patient_url(&self, patient_id: &str) -> String {
        format!("{}/patients/{}", self.base_url, urlencoding::encode(patient_id))
    }

    /// AI edit dispatch endpoint.
    pub fn ai_edit_url(&self) -> String {
        format!("{}/ai/edit", self.base_url)
    }

    /// Webhook for a generation pipeline, if configured.
    pub fn generation_webhook(&self, kind: GenerationKind) -> Option<&str> {
        match kind {
            GenerationKind::Diagnosis => self.diagnosis_webhook_url.as_deref(),
            GenerationKind::Solution => self.solution_webhook_url.as_deref(),
        }
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
