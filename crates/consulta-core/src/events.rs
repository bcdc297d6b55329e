//! View-scoped refresh notifications between sections.

use tokio::sync::broadcast;
use tracing::trace;

use crate::section::Section;

const DEFAULT_CAPACITY: usize = 64;

/// A request to re-read one section of one consultation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRefresh {
    pub consultation_id: String,
    pub section: Section,
}

/// Publish/subscribe channel for [`SectionRefresh`] events.
///
/// Each detail view owns its own bus; clones share the same channel.
#[derive(Debug, Clone)]
pub struct SectionRefreshBus {
    sender: broadcast::Sender<SectionRefresh>,
}

impl Default for SectionRefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionRefreshBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: SectionRefresh) -> usize {
        trace!(consultation_id = %event.consultation_id, section = %event.section, "section refresh");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SectionRefresh> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
