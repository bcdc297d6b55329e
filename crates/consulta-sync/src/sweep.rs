//! Auto-cancellation of overdue teleconsultations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate};
use consulta_core::{
    Consultation, ConsultationGateway, ConsultationPage, ConsultationPatch, ConsultationStatus,
    GatewayError,
};
use futures::future::join_all;
use tracing::{info, warn};

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Records the gateway acknowledged as cancelled.
    pub cancelled: Vec<Consultation>,
    /// Ids whose cancel failed; they are retried on a later sweep.
    pub failed: Vec<(String, GatewayError)>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.failed.is_empty()
    }

    /// Replace cancelled rows in a cached page. Returns whether any row changed.
    pub fn apply_to(&self, page: &mut ConsultationPage) -> bool {
        let mut changed = false;
        for cancelled in &self.cancelled {
            if let Some(row) = page.consultations.iter_mut().find(|row| row.id == cancelled.id) {
                *row = cancelled.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Rows the sweep would cancel on `today`.
pub fn overdue_rows(rows: &[Consultation], today: NaiveDate) -> impl Iterator<Item = &Consultation> {
    rows.iter()
        .filter(move |row| row.is_overdue_teleconsultation(today))
}

/// Cancels scheduled teleconsultations whose start day has passed.
///
/// Ids already cancelled, or with a cancel in flight, are skipped so a stale
/// list response cannot trigger a second cancel.
pub struct AutoCancelSweep<G: ConsultationGateway + ?Sized> {
    gateway: Arc<G>,
    claimed: Mutex<HashSet<String>>,
}

impl<G: ConsultationGateway + ?Sized> AutoCancelSweep<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    fn claimed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sweep against the local calendar day.
    pub async fn run(&self, rows: &[Consultation]) -> SweepReport {
        self.run_on(rows, Local::now().date_naive()).await
    }

    /// Sweep as if `today` were the current day.
    ///
    /// Cancels run in parallel; one failure does not affect the others.
    pub async fn run_on(&self, rows: &[Consultation], today: NaiveDate) -> SweepReport {
        let targets: Vec<String> = {
            let mut claimed = self.claimed();
            overdue_rows(rows, today)
                .filter(|row| claimed.insert(row.id.clone()))
                .map(|row| row.id.clone())
                .collect()
        };

        let mut report = SweepReport::default();
        if targets.is_empty() {
            return report;
        }

        info!(count = targets.len(), %today, "Cancelling overdue teleconsultations");

        let patch = ConsultationPatch::new().status(ConsultationStatus::Cancelled);
        let results = join_all(targets.into_iter().map(|id| {
            let patch = &patch;
            async move {
                let result = self.gateway.update_consultation(&id, patch).await;
                (id, result)
            }
        }))
        .await;

        let mut claimed = self.claimed();
        for (id, result) in results {
            match result {
                Ok(consultation) => {
                    info!(consultation_id = %id, "Overdue teleconsultation cancelled");
                    report.cancelled.push(consultation);
                }
                Err(e) => {
                    warn!(consultation_id = %id, error = %e, "Failed to cancel overdue teleconsultation");
                    claimed.remove(&id);
                    report.failed.push((id, e));
                }
            }
        }

        report
    }
}
