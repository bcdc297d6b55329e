//! List/detail coordination.

use std::sync::Arc;

use consulta_core::{Consultation, ConsultationGateway, ConsultationPage, ListQuery};
use tracing::warn;

use crate::config::SyncConfig;
use crate::detail::DetailSync;
use crate::error::SyncError;
use crate::list::ListSync;

/// Owns the list loop and the detail loop of one dashboard session.
///
/// The list only polls while no detail view is open. Closing the detail
/// re-reads the list, since changes made in the detail view are not pushed
/// into it.
pub struct Dashboard<G: ConsultationGateway + ?Sized + 'static> {
    list: ListSync<G>,
    detail: DetailSync<G>,
}

impl<G: ConsultationGateway + ?Sized + 'static> Dashboard<G> {
    pub fn new(gateway: Arc<G>, config: SyncConfig) -> Self {
        Self {
            list: ListSync::new(gateway.clone(), config.clone()),
            detail: DetailSync::new(gateway, config),
        }
    }

    pub fn list(&self) -> &ListSync<G> {
        &self.list
    }

    pub fn detail(&self) -> &DetailSync<G> {
        &self.detail
    }

    pub async fn show_list(&mut self, query: ListQuery) -> Result<ConsultationPage, SyncError> {
        self.list.start(query).await
    }

    /// Open a consultation and pause the list loop.
    ///
    /// The list resumes if the consultation cannot be opened.
    pub async fn open(&mut self, id: &str) -> Result<Consultation, SyncError> {
        self.list.pause();
        match self.detail.open(id).await {
            Ok(consultation) => Ok(consultation),
            Err(e) => {
                self.list.resume();
                Err(e)
            }
        }
    }

    /// Close the detail view and return to the list.
    pub async fn close(&mut self) -> ConsultationPage {
        self.detail.close();
        self.list.resume();
        if let Err(e) = self.list.refresh().await {
            warn!(error = %e, "List refresh after closing detail failed");
        }
        self.list.current()
    }
}
