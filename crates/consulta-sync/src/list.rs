//! List view sync loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use consulta_core::{ConsultationGateway, ConsultationPage, GatewayError, ListQuery};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::sweep::AutoCancelSweep;

/// Cached list page, shared with subscribers.
pub type ListCache = watch::Receiver<ConsultationPage>;

/// Merge a fresh page into the cached one, row by row.
///
/// Rows are compared on id, status, etapa and `updated_at`. The cache is
/// replaced only when a row or the total differs. Returns whether it was.
pub fn merge_page(cached: &mut ConsultationPage, fresh: ConsultationPage) -> bool {
    let changed = cached.total != fresh.total
        || cached.page != fresh.page
        || cached.consultations.len() != fresh.consultations.len()
        || cached
            .consultations
            .iter()
            .zip(&fresh.consultations)
            .any(|(old, new)| old.differs_as_row(new));

    if changed {
        *cached = fresh;
    }
    changed
}

/// The state one list poll needs, shared by the loop and manual refreshes.
struct ListWorker<G: ConsultationGateway + ?Sized> {
    gateway: Arc<G>,
    query: ListQuery,
    cache: Arc<watch::Sender<ConsultationPage>>,
    sweep: Arc<AutoCancelSweep<G>>,
}

impl<G: ConsultationGateway + ?Sized> ListWorker<G> {
    /// Fetch, merge and sweep once. Returns whether the cache changed.
    ///
    /// The sweep runs after every successful fetch, whether or not the list
    /// changed.
    async fn poll_once(&self) -> Result<bool, GatewayError> {
        let fresh = self.gateway.list_consultations(&self.query).await?;
        let rows = fresh.consultations.len();

        let changed = self.cache.send_if_modified(|cached| merge_page(cached, fresh));
        if changed {
            info!(rows, "List changed");
        } else {
            debug!(rows, "List unchanged");
        }

        let snapshot = self.cache.borrow().consultations.clone();
        let report = self.sweep.run(&snapshot).await;
        let swept = !report.cancelled.is_empty()
            && self.cache.send_if_modified(|cached| report.apply_to(cached));

        Ok(changed || swept)
    }
}

/// Errors after which the list loop stops for good.
fn stops_list_polling(error: &GatewayError) -> bool {
    matches!(error, GatewayError::Unauthorized | GatewayError::Forbidden(_))
}

struct RunningLoop {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Keeps the consultation list fresh while the list view is shown.
///
/// The list polls faster while any visible row is recording or processing.
/// Every successful poll runs the overdue teleconsultation sweep. `pause` keeps the
/// loop alive but skips its ticks, for while a detail view is open.
pub struct ListSync<G: ConsultationGateway + ?Sized + 'static> {
    gateway: Arc<G>,
    config: SyncConfig,
    cache: Arc<watch::Sender<ConsultationPage>>,
    sweep: Arc<AutoCancelSweep<G>>,
    paused: Arc<AtomicBool>,
    query: ListQuery,
    running: Option<RunningLoop>,
}

impl<G: ConsultationGateway + ?Sized + 'static> ListSync<G> {
    pub fn new(gateway: Arc<G>, config: SyncConfig) -> Self {
        let (cache, _) = watch::channel(ConsultationPage::default());
        Self {
            sweep: Arc::new(AutoCancelSweep::new(gateway.clone())),
            gateway,
            config,
            cache: Arc::new(cache),
            paused: Arc::new(AtomicBool::new(false)),
            query: ListQuery::default(),
            running: None,
        }
    }

    pub fn subscribe(&self) -> ListCache {
        self.cache.subscribe()
    }

    pub fn current(&self) -> ConsultationPage {
        self.cache.borrow().clone()
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    fn worker(&self) -> ListWorker<G> {
        ListWorker {
            gateway: self.gateway.clone(),
            query: self.query.clone(),
            cache: self.cache.clone(),
            sweep: self.sweep.clone(),
        }
    }

    /// Load `query` once, then keep it fresh in the background.
    ///
    /// Replaces any running loop. No loop is started when the first load
    /// fails.
    pub async fn start(&mut self, query: ListQuery) -> Result<ConsultationPage, SyncError> {
        self.stop();
        self.query = query;
        self.worker().poll_once().await?;

        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_list_loop(
            self.worker(),
            self.config.clone(),
            self.paused.clone(),
            stopped.clone(),
        ));
        info!(page = self.query.page, limit = self.query.limit, "List sync started");

        self.running = Some(RunningLoop { stopped, task });
        Ok(self.current())
    }

    /// Poll once now, outside the schedule.
    pub async fn refresh(&self) -> Result<ConsultationPage, SyncError> {
        self.worker().poll_once().await?;
        Ok(self.current())
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stopped.store(true, Ordering::SeqCst);
            running.task.abort();
        }
    }

    pub fn pause(&self) {
        debug!("List sync paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        debug!("List sync resumed");
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.stopped.load(Ordering::SeqCst))
    }
}

impl<G: ConsultationGateway + ?Sized + 'static> Drop for ListSync<G> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_list_loop<G: ConsultationGateway + ?Sized>(
    worker: ListWorker<G>,
    config: SyncConfig,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
) {
    loop {
        let delay = config.list_interval(&worker.cache.borrow().consultations);
        sleep(delay).await;

        if stopped.load(Ordering::SeqCst) {
            return;
        }
        if paused.load(Ordering::SeqCst) {
            debug!("List sync paused, skipping tick");
            continue;
        }

        match worker.poll_once().await {
            Ok(_) => {}
            Err(e) if stops_list_polling(&e) => {
                warn!(error = %e, "Stopping list sync permanently");
                stopped.store(true, Ordering::SeqCst);
                return;
            }
            Err(e) => {
                warn!(error = %e, "List sync tick failed, retrying next tick");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Local};
    use consulta_core::{Consultation, ConsultationStatus, ConsultationType, Etapa};
    use mock_gateway::MockGateway;
    use std::time::Duration;

    fn row(id: &str, status: ConsultationStatus) -> Consultation {
        Consultation::new(id, status)
    }

    fn page(rows: Vec<Consultation>) -> ConsultationPage {
        ConsultationPage {
            total: Some(rows.len() as u64),
            consultations: rows,
            page: 1,
            limit: 20,
        }
    }

    #[test]
    fn test_merge_page_no_op_when_rows_match() {
        let mut cached = page(vec![row("c-1", ConsultationStatus::Created)]);
        let fresh = page(vec![row("c-1", ConsultationStatus::Created)]);
        assert!(!merge_page(&mut cached, fresh));
    }

    #[test]
    fn test_merge_page_detects_row_changes() {
        let mut cached = page(vec![
            row("c-1", ConsultationStatus::Created),
            row("c-2", ConsultationStatus::ValidAnamnese),
        ]);

        let fresh = page(vec![
            row("c-1", ConsultationStatus::Created),
            row("c-2", ConsultationStatus::ValidAnamnese).with_etapa(Etapa::Diagnostico),
        ]);
        assert!(merge_page(&mut cached, fresh));
        assert_eq!(cached.consultations[1].etapa, Some(Etapa::Diagnostico));

        let fresh = page(vec![row("c-1", ConsultationStatus::Created)]);
        assert!(merge_page(&mut cached, fresh));
        assert_eq!(cached.consultations.len(), 1);
    }

    #[test]
    fn test_merge_page_ignores_fields_outside_row_identity() {
        let mut cached = page(vec![row("c-1", ConsultationStatus::ValidSolucao)]);
        let fresh = page(vec![
            row("c-1", ConsultationStatus::ValidSolucao).with_parties("p-1", "d-1"),
        ]);
        assert!(!merge_page(&mut cached, fresh));
        assert!(cached.consultations[0].patient_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_cadence_follows_rows() {
        let gateway = Arc::new(
            MockGateway::new().with_consultation(row("c-1", ConsultationStatus::Recording)),
        );
        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        sync.start(ListQuery::default()).await.unwrap();
        assert_eq!(gateway.list_count(), 1);

        sleep(Duration::from_millis(5_100)).await;
        assert_eq!(gateway.list_count(), 2);

        gateway.modify_consultation("c-1", |c| c.status = ConsultationStatus::Completed);
        sleep(Duration::from_millis(5_000)).await;
        assert_eq!(gateway.list_count(), 3);

        // Nothing active anymore: 15s cadence.
        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(gateway.list_count(), 3);
        sleep(Duration::from_millis(5_000)).await;
        assert_eq!(gateway.list_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_skips_ticks() {
        let gateway = Arc::new(
            MockGateway::new().with_consultation(row("c-1", ConsultationStatus::Created)),
        );
        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        sync.start(ListQuery::default()).await.unwrap();

        sync.pause();
        sleep(Duration::from_secs(61)).await;
        assert_eq!(gateway.list_count(), 1);
        assert!(sync.is_polling());

        // Paused ticks still keep the 15s schedule; the next one polls.
        sync.resume();
        sleep(Duration::from_secs(15)).await;
        assert_eq!(gateway.list_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_stops_list_polling() {
        let gateway = Arc::new(
            MockGateway::new().with_consultation(row("c-1", ConsultationStatus::Created)),
        );
        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        sync.start(ListQuery::default()).await.unwrap();

        gateway.fail_list(Some(GatewayError::Unauthorized));
        sleep(Duration::from_millis(15_100)).await;
        assert_eq!(gateway.list_count(), 2);
        assert!(!sync.is_polling());

        gateway.fail_list(None);
        sleep(Duration::from_secs(120)).await;
        assert_eq!(gateway.list_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_list_errors_keep_polling() {
        let gateway = Arc::new(
            MockGateway::new().with_consultation(row("c-1", ConsultationStatus::Created)),
        );
        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        sync.start(ListQuery::default()).await.unwrap();

        gateway.fail_list(Some(GatewayError::Status {
            code: 502,
            body: "bad gateway".into(),
        }));
        sleep(Duration::from_millis(30_100)).await;
        assert_eq!(gateway.list_count(), 3);
        assert!(sync.is_polling());
        assert_eq!(sync.current().consultations.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_runs_sweep_and_reflects_cancel() {
        let yesterday = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap();
        let overdue = Consultation::new("late", ConsultationStatus::Agendamento)
            .with_type(ConsultationType::Telemedicina)
            .with_start(format!("{}T10:00:00", yesterday));
        let gateway = Arc::new(MockGateway::new().with_consultation(overdue));

        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        let page = sync.start(ListQuery::default()).await.unwrap();

        assert_eq!(page.consultations[0].status, ConsultationStatus::Cancelled);
        assert_eq!(gateway.patches("late").len(), 1);

        // Later ticks see the cancelled row and do not cancel again.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.patches("late").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cancel_is_retried_on_unchanged_list() {
        let yesterday = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap();
        let overdue = Consultation::new("late", ConsultationStatus::Agendamento)
            .with_type(ConsultationType::Telemedicina)
            .with_start(format!("{}T10:00:00", yesterday));
        let gateway = Arc::new(MockGateway::new().with_consultation(overdue));
        gateway.fail_cancel("late", GatewayError::Network("reset".into()));

        let mut sync = ListSync::new(gateway.clone(), SyncConfig::default());
        let page = sync.start(ListQuery::default()).await.unwrap();
        assert_eq!(page.consultations[0].status, ConsultationStatus::Agendamento);
        assert_eq!(gateway.patches("late").len(), 1);

        // The list itself never changes; the next tick still retries.
        gateway.clear_cancel_failure("late");
        sleep(Duration::from_millis(15_100)).await;

        assert_eq!(gateway.patches("late").len(), 2);
        assert_eq!(
            sync.current().consultations[0].status,
            ConsultationStatus::Cancelled
        );
        assert_eq!(
            gateway.consultation("late").map(|c| c.status),
            Some(ConsultationStatus::Cancelled)
        );

        sleep(Duration::from_secs(120)).await;
        assert_eq!(gateway.patches("late").len(), 2);
    }

    #[tokio::test]
    async fn test_start_failure_starts_no_loop() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_list(Some(GatewayError::Forbidden("no".into())));

        let mut sync = ListSync::new(gateway, SyncConfig::default());
        assert!(sync.start(ListQuery::default()).await.is_err());
        assert!(!sync.is_polling());
    }
}
