//! AI-assisted field editing.
//!
//! The practitioner picks one field, then sends free-text instructions. Each
//! instruction goes to the AI edit webhook, which rewrites the field
//! server-side. The webhook answers with a short text reply; the rewritten
//! value itself is picked up by re-reading the owning section after
//! [`WorkflowConfig::ai_refresh_delay`].

use std::sync::Arc;

use consulta_core::{
    AiEditRequest, ConsultationGateway, FieldPath, SectionRefresh, SectionRefreshBus,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;

/// Assistant message used when the webhook call fails.
pub const AI_APOLOGY: &str =
    "Sorry, I could not process that instruction right now. Please try again.";

/// Assistant message used when the webhook answers without any text.
pub const AI_DEFAULT_REPLY: &str = "Done. The field will refresh shortly.";

const REPLY_KEYS: [&str; 4] = ["output", "response", "message", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Extract the reply text from an AI webhook response.
///
/// Accepts a bare string, an object carrying one of `output`, `response`,
/// `message` or `text`, or an array whose first element is either.
pub fn parse_ai_reply(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Object(map) => REPLY_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(parse_ai_reply),
        Value::Array(items) => items.first().and_then(parse_ai_reply),
        _ => None,
    }
}

/// AI chat bound to one consultation and at most one selected field.
pub struct AiEditSession<G: ConsultationGateway + ?Sized> {
    gateway: Arc<G>,
    bus: SectionRefreshBus,
    config: WorkflowConfig,
    consultation_id: String,
    selected: Option<FieldPath>,
    transcript: Vec<ChatMessage>,
}

impl<G: ConsultationGateway + ?Sized> AiEditSession<G> {
    pub fn new(
        gateway: Arc<G>,
        bus: SectionRefreshBus,
        config: WorkflowConfig,
        consultation_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            bus,
            config,
            consultation_id: consultation_id.into(),
            selected: None,
            transcript: Vec::new(),
        }
    }

    /// Select the field to edit.
    ///
    /// Selecting a different field discards the current transcript;
    /// reselecting the same field keeps it.
    pub fn select_field(&mut self, raw_path: &str) -> Result<&FieldPath, WorkflowError> {
        let path = FieldPath::parse(raw_path)?;
        if self.selected.as_ref() != Some(&path) {
            debug!(consultation_id = %self.consultation_id, field = %path, "AI field selected");
            self.transcript.clear();
            self.selected = Some(path);
        }
        self.selected.as_ref().ok_or(WorkflowError::NoFieldSelected)
    }

    /// Drop the selection and its transcript.
    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.transcript.clear();
    }

    pub fn selected_field(&self) -> Option<&FieldPath> {
        self.selected.as_ref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Send one instruction for the selected field and return the
    /// assistant's reply.
    ///
    /// A webhook failure is answered with [`AI_APOLOGY`] instead of an
    /// error. On success, a refresh of the owning section is published on
    /// the bus after the configured delay.
    pub async fn send(&mut self, instruction: &str) -> Result<String, WorkflowError> {
        let path = self.selected.clone().ok_or(WorkflowError::NoFieldSelected)?;
        self.transcript.push(ChatMessage::user(instruction));

        let request = AiEditRequest::new(self.consultation_id.clone(), &path, instruction);
        let reply = match self.gateway.dispatch_ai_edit(&request).await {
            Ok(value) => {
                info!(consultation_id = %self.consultation_id, field = %path, "AI edit dispatched");
                self.schedule_refresh(&path);
                parse_ai_reply(&value).unwrap_or_else(|| AI_DEFAULT_REPLY.to_string())
            }
            Err(e) => {
                warn!(consultation_id = %self.consultation_id, field = %path, error = %e, "AI edit failed");
                AI_APOLOGY.to_string()
            }
        };

        self.transcript.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    fn schedule_refresh(&self, path: &FieldPath) {
        let bus = self.bus.clone();
        let delay = self.config.ai_refresh_delay;
        let event = SectionRefresh {
            consultation_id: self.consultation_id.clone(),
            section: path.section(),
        };

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.publish(event);
        });
    }
}
