//! Single-field edits with a per-section cache.

use std::sync::Arc;

use consulta_core::{ConsultationGateway, FieldPath, FieldUpdate, Section, SectionRefreshBus};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::WorkflowError;
use crate::notifier::{NoOpNotifier, Notice, Notifier};

/// Saves clinical fields of one consultation and keeps the affected
/// sections cached.
///
/// A successful write updates the cache from the gateway's response, or
/// re-reads the section when the response carries no document. A failed
/// write leaves the cache as it was.
pub struct FieldEditCoordinator<G: ConsultationGateway + ?Sized> {
    gateway: Arc<G>,
    notifier: Arc<dyn Notifier>,
    consultation_id: String,
    sections: RwLock<IndexMap<Section, Value>>,
}

impl<G: ConsultationGateway + ?Sized + 'static> FieldEditCoordinator<G> {
    pub fn new(gateway: Arc<G>, consultation_id: impl Into<String>) -> Self {
        Self {
            gateway,
            notifier: Arc::new(NoOpNotifier),
            consultation_id: consultation_id.into(),
            sections: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder method to set the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn consultation_id(&self) -> &str {
        &self.consultation_id
    }

    /// Cached document of a section, if loaded and non-empty.
    pub async fn section(&self, section: Section) -> Option<Value> {
        self.sections.read().await.get(&section).cloned()
    }

    /// Read a section from the gateway into the cache.
    pub async fn load_section(&self, section: Section) -> Result<Option<Value>, WorkflowError> {
        let data = self.gateway.get_section(&self.consultation_id, section).await?;

        let mut sections = self.sections.write().await;
        match &data {
            Some(doc) => {
                sections.insert(section, doc.clone());
            }
            None => {
                sections.shift_remove(&section);
            }
        }
        debug!(consultation_id = %self.consultation_id, section = %section, loaded = data.is_some(), "Section loaded");
        Ok(data)
    }

    /// Re-read a section, logging instead of failing.
    pub async fn refresh(&self, section: Section) {
        if let Err(e) = self.load_section(section).await {
            warn!(consultation_id = %self.consultation_id, section = %section, error = %e, "Section refresh failed");
        }
    }

    /// Save one field.
    ///
    /// The path decides which section endpoint receives the write.
    pub async fn save_field(&self, raw_path: &str, value: Value) -> Result<Section, WorkflowError> {
        let path = FieldPath::parse(raw_path)?;
        let section = path.section();
        let update = FieldUpdate::new(&path, value);

        let result = match self.gateway.update_field(&self.consultation_id, &update).await {
            Ok(result) => result,
            Err(e) => {
                error!(consultation_id = %self.consultation_id, field = %path, error = %e, "Field save failed");
                self.notifier
                    .notify(Notice::error(format!("Could not save {}: {}", path, e)))
                    .await;
                return Err(e.into());
            }
        };

        match result.data {
            Some(table_doc) => {
                let mut sections = self.sections.write().await;
                let doc = sections
                    .entry(section)
                    .or_insert_with(|| Value::Object(Map::new()));
                if !doc.is_object() {
                    *doc = Value::Object(Map::new());
                }
                if let Some(map) = doc.as_object_mut() {
                    map.insert(path.table().to_string(), table_doc);
                }
            }
            None => self.refresh(section).await,
        }

        info!(consultation_id = %self.consultation_id, field = %path, section = %section, "Field saved");
        self.notifier
            .notify(Notice::success(format!("Saved {}", path)))
            .await;
        Ok(section)
    }

    /// Re-read sections whenever the bus announces a refresh for this
    /// consultation.
    ///
    /// The task ends when every bus handle is dropped; abort it to stop
    /// earlier.
    pub fn refresh_listener(self: &Arc<Self>, bus: &SectionRefreshBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.consultation_id == coordinator.consultation_id => {
                        coordinator.refresh(event.section).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Refresh listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(consultation_id = %coordinator.consultation_id, "Refresh listener stopped");
        })
    }
}
